use time::OffsetDateTime;

// Ticks (100ns units) between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA_TICKS: i128 = 116_444_736_000_000_000;

pub fn datetime_from_filetime(filetime: u64) -> Option<OffsetDateTime> {
    let nanos = (filetime as i128 - EPOCH_DELTA_TICKS) * 100;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}
