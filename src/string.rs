use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

pub(crate) fn read_utf16_units<R: Read>(
    reader: &mut R,
    units: usize,
) -> io::Result<Vec<u16>> {
    let mut buf = vec![0u16; units];
    reader.read_u16_into::<LittleEndian>(&mut buf)?;
    Ok(buf)
}

pub(crate) fn decode_utf16(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}
