//! In-memory WIM fixtures for the integration tests.

#![allow(dead_code)]

use sha1_smol::Sha1;
use wim::FILE_ATTRIBUTE_DIRECTORY;

pub const CHUNK_SIZE: usize = 0x8000;
pub const NO_SECURITY: u32 = 0xffff_ffff;
pub const ZERO_HASH: [u8; 20] = [0; 20];
pub const TERMINATOR: [u8; 8] = [0; 8];
pub const GUID: [u8; 16] = *b"0123456789abcdef";

pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::from(data).digest().bytes()
}

pub fn pseudo_random(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2468_ace1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Assembles a single-part WIM: header, resources, then the offset table.
pub struct WimBuilder {
    data: Vec<u8>,
    table: Vec<u8>,
    image_count: u32,
    xml: Option<(u64, u64)>,
}

impl WimBuilder {
    pub fn new() -> WimBuilder {
        WimBuilder {
            data: vec![0u8; 208],
            table: Vec::new(),
            image_count: 0,
            xml: None,
        }
    }

    fn add_resource(
        &mut self,
        bytes: &[u8],
        flags: u8,
        original_size: u64,
        hash: [u8; 20],
    ) {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        let packed = (u64::from(flags) << 56) | bytes.len() as u64;
        self.table.extend_from_slice(&packed.to_le_bytes());
        self.table.extend_from_slice(&offset.to_le_bytes());
        self.table.extend_from_slice(&original_size.to_le_bytes());
        self.table.extend_from_slice(&1u16.to_le_bytes()); // part number
        self.table.extend_from_slice(&1u32.to_le_bytes()); // ref count
        self.table.extend_from_slice(&hash);
    }

    /// Stores `data` as an uncompressed resource; returns its hash.
    pub fn add_file_data(&mut self, data: &[u8]) -> [u8; 20] {
        let hash = sha1(data);
        self.add_resource(data, 0, data.len() as u64, hash);
        hash
    }

    /// Stores `data` as a chunked resource made of stored (incompressible)
    /// chunks; returns its hash.
    pub fn add_file_data_chunked(&mut self, data: &[u8]) -> [u8; 20] {
        let hash = sha1(data);
        let num_chunks = (data.len() + CHUNK_SIZE - 1) / CHUNK_SIZE;
        let mut bytes = Vec::new();
        for index in 1..num_chunks {
            bytes
                .extend_from_slice(&((index * CHUNK_SIZE) as u32).to_le_bytes());
        }
        bytes.extend_from_slice(data);
        self.add_resource(&bytes, 0x4, data.len() as u64, hash);
        hash
    }

    /// Stores `metadata` as an image-metadata resource.
    pub fn add_image(&mut self, metadata: &[u8]) {
        self.add_resource(metadata, 0x2, metadata.len() as u64, sha1(metadata));
        self.image_count += 1;
    }

    /// Stores the XML metadata blob (BOM-prefixed UTF-16LE).
    pub fn set_xml(&mut self, xml: &str) {
        let mut bytes = vec![0xffu8, 0xfe];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(&bytes);
        self.xml = Some((offset, bytes.len() as u64));
    }

    pub fn finish(self) -> Vec<u8> {
        self.finish_with_flags(0x2 | 0x40000)
    }

    pub fn finish_with_flags(mut self, flags: u32) -> Vec<u8> {
        let table_offset = self.data.len() as u64;
        let table_size = self.table.len() as u64;
        self.data.extend_from_slice(&self.table);
        let header = &mut self.data[..208];
        header[..8].copy_from_slice(b"MSWIM\0\0\0");
        header[8..12].copy_from_slice(&208u32.to_le_bytes());
        header[12..16].copy_from_slice(&0x10d00u32.to_le_bytes());
        header[16..20].copy_from_slice(&flags.to_le_bytes());
        header[20..24].copy_from_slice(&0x8000u32.to_le_bytes());
        header[24..40].copy_from_slice(&GUID);
        header[40..42].copy_from_slice(&1u16.to_le_bytes());
        header[42..44].copy_from_slice(&1u16.to_le_bytes());
        header[44..48].copy_from_slice(&self.image_count.to_le_bytes());
        write_descriptor(&mut header[48..72], table_offset, table_size);
        if let Some((offset, size)) = self.xml {
            write_descriptor(&mut header[72..96], offset, size);
        }
        self.data
    }
}

fn write_descriptor(slice: &mut [u8], offset: u64, size: u64) {
    slice[..8].copy_from_slice(&size.to_le_bytes()); // flags 0
    slice[8..16].copy_from_slice(&offset.to_le_bytes());
    slice[16..24].copy_from_slice(&size.to_le_bytes());
}

/// Serializes one directory entry followed by its stream entries.
pub fn dir_entry(
    name: &str,
    short_name: &str,
    attributes: u32,
    security_id: u32,
    subdir_offset: u64,
    reparse_hard_link: u64,
    hash: [u8; 20],
    streams: &[(&str, [u8; 20])],
) -> Vec<u8> {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let short_units: Vec<u16> = short_name.encode_utf16().collect();
    let names_length = name_units.len() * 2 + 2 + short_units.len() * 2;
    let length = 102 + names_length;
    let mut bytes = Vec::with_capacity(length);
    bytes.extend_from_slice(&(length as u64).to_le_bytes());
    bytes.extend_from_slice(&attributes.to_le_bytes());
    bytes.extend_from_slice(&security_id.to_le_bytes());
    bytes.extend_from_slice(&subdir_offset.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 16]); // reserved
    // 2020-01-01 00:00:00 UTC as a FILETIME.
    let filetime: u64 = 116_444_736_000_000_000 + 1_577_836_800 * 10_000_000;
    for _ in 0..3 {
        bytes.extend_from_slice(&filetime.to_le_bytes());
    }
    bytes.extend_from_slice(&hash);
    bytes.extend_from_slice(&0u32.to_le_bytes()); // padding
    bytes.extend_from_slice(&reparse_hard_link.to_le_bytes());
    bytes.extend_from_slice(&(streams.len() as u16).to_le_bytes());
    bytes.extend_from_slice(&((short_units.len() * 2) as u16).to_le_bytes());
    bytes.extend_from_slice(&((name_units.len() * 2) as u16).to_le_bytes());
    for unit in &name_units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(&[0u8; 2]); // name separator
    for unit in &short_units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    assert_eq!(bytes.len(), length);
    for (stream_name, stream_hash) in streams {
        bytes.extend_from_slice(&stream_entry(stream_name, *stream_hash));
    }
    bytes
}

pub fn stream_entry(name: &str, hash: [u8; 20]) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let length = 38 + units.len() * 2;
    let mut bytes = Vec::with_capacity(length);
    bytes.extend_from_slice(&(length as u64).to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes()); // reserved
    bytes.extend_from_slice(&hash);
    bytes.extend_from_slice(&((units.len() * 2) as u16).to_le_bytes());
    for unit in &units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    assert_eq!(bytes.len(), length);
    bytes
}

/// Security block with no entries (8 bytes, already aligned).
pub fn empty_security_block() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&8u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes
}

/// Security block holding the given raw descriptors, padded to 8 bytes.
pub fn security_block(descriptors: &[&[u8]]) -> Vec<u8> {
    let total = 8
        + descriptors.len() * 8
        + descriptors.iter().map(|d| d.len()).sum::<usize>();
    let aligned = (total + 7) & !7;
    let mut bytes = Vec::with_capacity(aligned);
    bytes.extend_from_slice(&(total as u32).to_le_bytes());
    bytes.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
    for descriptor in descriptors {
        bytes.extend_from_slice(&(descriptor.len() as u64).to_le_bytes());
    }
    for descriptor in descriptors {
        bytes.extend_from_slice(descriptor);
    }
    bytes.resize(aligned, 0);
    bytes
}

/// Image metadata: a security block, then a root directory whose listing
/// holds the given (already serialized) children.  Further listings may be
/// appended by the caller; the first one starts at
/// `security.len() + 112 + children bytes + 8`.
pub fn root_metadata_with_security(
    security: Vec<u8>,
    children: &[Vec<u8>],
) -> Vec<u8> {
    assert_eq!(security.len() % 8, 0);
    let subdir_offset = security.len() as u64 + 104 + 8;
    let root = dir_entry(
        "",
        "",
        FILE_ATTRIBUTE_DIRECTORY,
        NO_SECURITY,
        subdir_offset,
        0,
        ZERO_HASH,
        &[],
    );
    assert_eq!(root.len(), 104);
    let mut metadata = security;
    metadata.extend_from_slice(&root);
    metadata.extend_from_slice(&TERMINATOR);
    for child in children {
        metadata.extend_from_slice(child);
    }
    metadata.extend_from_slice(&TERMINATOR);
    metadata
}

/// Image metadata with an empty security block and the given root children.
pub fn root_metadata(children: &[Vec<u8>]) -> Vec<u8> {
    root_metadata_with_security(empty_security_block(), children)
}
