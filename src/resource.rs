use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;
use lzxd::{Lzxd, WindowSize};

use crate::consts;
use crate::error::{Error, Result};
use crate::wim::{ReadSeek, WimInner};

/// The SHA-1 hash of a file or stream's content.
///
/// An all-zero hash is the on-disk sentinel for "no content" (an empty file,
/// or a stream with no data).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Sha1Hash(pub [u8; 20]);

impl Sha1Hash {
    /// Returns true if this is the all-zero "no content" sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(formatter, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Location and sizes of one blob within the WIM file.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ResourceDescriptor {
    pub(crate) flags: u8,
    pub(crate) compressed_size: u64,
    pub(crate) offset: u64,
    pub(crate) original_size: u64,
}

impl ResourceDescriptor {
    pub(crate) fn is_compressed(&self) -> bool {
        (self.flags & consts::RES_FLAG_COMPRESSED) != 0
    }

    pub(crate) fn is_metadata(&self) -> bool {
        (self.flags & consts::RES_FLAG_METADATA) != 0
    }
}

pub(crate) fn parse_resource_descriptor<R: Read>(
    reader: &mut R,
) -> io::Result<ResourceDescriptor> {
    // The high byte of the first field holds the resource flags; the low 56
    // bits hold the compressed size.
    let packed = reader.read_u64::<LittleEndian>()?;
    let offset = reader.read_u64::<LittleEndian>()?;
    let original_size = reader.read_u64::<LittleEndian>()?;
    Ok(ResourceDescriptor {
        flags: (packed >> 56) as u8,
        compressed_size: packed & 0x00ff_ffff_ffff_ffff,
        offset,
        original_size,
    })
}

/// One entry of the top-level offset table.
pub(crate) struct StreamDescriptor {
    pub(crate) resource: ResourceDescriptor,
    pub(crate) hash: Sha1Hash,
}

pub(crate) fn parse_stream_descriptor<R: Read>(
    reader: &mut R,
) -> io::Result<StreamDescriptor> {
    let resource = parse_resource_descriptor(reader)?;
    let _part_number = reader.read_u16::<LittleEndian>()?;
    let _ref_count = reader.read_u32::<LittleEndian>()?;
    let mut hash = [0u8; 20];
    reader.read_exact(&mut hash)?;
    Ok(StreamDescriptor { resource, hash: Sha1Hash(hash) })
}

/// A reader over the decompressed contents of one resource.
///
/// Reads are strictly sequential; dropping the reader releases its chunk
/// buffer without closing the underlying WIM source.
pub struct ResourceReader<'a> {
    inner: ResourceReaderInner<'a>,
}

enum ResourceReaderInner<'a> {
    Raw(RawReader<'a>),
    Compressed(CompressedReader<'a>),
}

/// Opens a resource for reading, starting at the given logical offset into
/// its decompressed content.
pub(crate) fn open_resource<'a>(
    wim: &'a WimInner<dyn ReadSeek + 'a>,
    resource: &ResourceDescriptor,
    offset: u64,
) -> Result<ResourceReader<'a>> {
    let inner = if resource.is_compressed() {
        let reader = CompressedReader::new(wim, resource, offset)?;
        ResourceReaderInner::Compressed(reader)
    } else {
        if offset > resource.compressed_size {
            return Err(Error::parse(
                "resource",
                format!(
                    "offset {} beyond resource size {}",
                    offset, resource.compressed_size
                ),
            ));
        }
        ResourceReaderInner::Raw(RawReader {
            wim,
            position: resource.offset + offset,
            end: resource.offset + resource.compressed_size,
        })
    };
    Ok(ResourceReader { inner })
}

/// Reads a resource's entire decompressed contents into memory.
pub(crate) fn read_resource(
    wim: &WimInner<dyn ReadSeek + '_>,
    resource: &ResourceDescriptor,
) -> Result<Vec<u8>> {
    let mut reader = open_resource(wim, resource, 0)?;
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let bytes_read = reader.read_some(&mut buf)?;
        if bytes_read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..bytes_read]);
    }
    Ok(data)
}

impl<'a> ResourceReader<'a> {
    pub(crate) fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            ResourceReaderInner::Raw(reader) => reader.read_some(buf),
            ResourceReaderInner::Compressed(reader) => reader.read_some(buf),
        }
    }
}

impl<'a> Read for ResourceReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_some(buf).map_err(io::Error::from)
    }
}

/// A bounded view of an uncompressed resource.
struct RawReader<'a> {
    wim: &'a WimInner<dyn ReadSeek + 'a>,
    position: u64,
    end: u64,
}

impl<'a> RawReader<'a> {
    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        debug_assert!(self.position <= self.end);
        let remaining = self.end - self.position;
        let max_bytes = remaining.min(buf.len() as u64) as usize;
        if max_bytes == 0 {
            return Ok(0);
        }
        // The source is shared with other read sessions, so re-seek on every
        // read.
        let mut source = self.wim;
        source
            .seek(SeekFrom::Start(self.position))
            .map_err(|err| Error::io("resource", err))?;
        let bytes_read = source
            .read(&mut buf[..max_bytes])
            .map_err(|err| Error::io("resource", err))?;
        self.position += bytes_read as u64;
        Ok(bytes_read)
    }
}

/// A sequential reader over a chunked, LZX-compressed resource.
///
/// The resource starts with a table giving the payload offset of every chunk
/// after the first; the chunks follow.  One decoded chunk is cached at a
/// time.
struct CompressedReader<'a> {
    wim: &'a WimInner<dyn ReadSeek + 'a>,
    original_size: u64,
    payload_start: u64,
    payload_size: u64,
    chunk_offsets: Vec<u64>,
    current_chunk: usize,
    chunk_data: Vec<u8>,
    offset_within_chunk: usize,
}

impl<'a> CompressedReader<'a> {
    fn new(
        wim: &'a WimInner<dyn ReadSeek + 'a>,
        resource: &ResourceDescriptor,
        offset: u64,
    ) -> Result<CompressedReader<'a>> {
        let original_size = resource.original_size;
        if offset > original_size {
            return Err(Error::parse(
                "compressed resource",
                format!(
                    "offset {} beyond resource size {}",
                    offset, original_size
                ),
            ));
        }
        let num_chunks = ((original_size + consts::CHUNK_SIZE - 1)
            / consts::CHUNK_SIZE) as usize;
        let entry_width: u64 =
            if original_size > u32::MAX as u64 { 8 } else { 4 };
        let table_size = num_chunks.saturating_sub(1) as u64 * entry_width;
        if num_chunks > 0 && table_size >= resource.compressed_size {
            return Err(Error::chunk(0, "chunk offset table past end"));
        }
        let payload_size = resource.compressed_size - table_size;

        let mut chunk_offsets = Vec::with_capacity(num_chunks);
        if num_chunks > 0 {
            chunk_offsets.push(0);
            let mut source = wim;
            source
                .seek(SeekFrom::Start(resource.offset))
                .map_err(|err| Error::io("compressed resource", err))?;
            for index in 1..num_chunks {
                let entry = if entry_width == 8 {
                    source.read_u64::<LittleEndian>()
                } else {
                    source.read_u32::<LittleEndian>().map(u64::from)
                }
                .map_err(|err| Error::io("compressed resource", err))?;
                if entry <= chunk_offsets[index - 1] || entry >= payload_size
                {
                    return Err(Error::chunk(
                        index,
                        format!("invalid chunk offset {}", entry),
                    ));
                }
                chunk_offsets.push(entry);
            }
        }

        let mut reader = CompressedReader {
            wim,
            original_size,
            payload_start: resource.offset + table_size,
            payload_size,
            chunk_offsets,
            current_chunk: 0,
            chunk_data: Vec::new(),
            offset_within_chunk: 0,
        };
        if offset == original_size {
            // Nothing to read; park the cursor past the last chunk.
            reader.current_chunk = num_chunks;
        } else {
            reader.current_chunk = (offset / consts::CHUNK_SIZE) as usize;
            reader.load_chunk()?;
            reader.offset_within_chunk =
                (offset % consts::CHUNK_SIZE) as usize;
            debug_assert!(
                reader.offset_within_chunk < reader.chunk_data.len()
            );
        }
        Ok(reader)
    }

    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let num_chunks = self.chunk_offsets.len();
        if buf.is_empty() || self.current_chunk >= num_chunks {
            return Ok(0);
        }
        if self.offset_within_chunk == self.chunk_data.len() {
            self.current_chunk += 1;
            if self.current_chunk >= num_chunks {
                return Ok(0);
            }
            self.load_chunk()?;
            self.offset_within_chunk = 0;
        }
        let max_bytes = buf
            .len()
            .min(self.chunk_data.len() - self.offset_within_chunk);
        buf[..max_bytes].copy_from_slice(
            &self.chunk_data[self.offset_within_chunk..][..max_bytes],
        );
        self.offset_within_chunk += max_bytes;
        Ok(max_bytes)
    }

    fn load_chunk(&mut self) -> Result<()> {
        let index = self.current_chunk;
        let start = self.chunk_offsets[index];
        let end = if index + 1 < self.chunk_offsets.len() {
            self.chunk_offsets[index + 1]
        } else {
            self.payload_size
        };
        let stored_size = (end - start) as usize;
        let expected_size = (self.original_size
            - index as u64 * consts::CHUNK_SIZE)
            .min(consts::CHUNK_SIZE) as usize;

        let mut source = self.wim;
        source
            .seek(SeekFrom::Start(self.payload_start + start))
            .map_err(|err| Error::io("compressed resource", err))?;
        if stored_size >= expected_size {
            // Incompressible chunks are stored verbatim.
            let mut data = vec![0u8; expected_size];
            source
                .read_exact(&mut data)
                .map_err(|err| Error::io("compressed resource", err))?;
            trace!("chunk {}: stored, {} bytes", index, expected_size);
            self.chunk_data = data;
        } else {
            let mut data = vec![0u8; stored_size];
            source
                .read_exact(&mut data)
                .map_err(|err| Error::io("compressed resource", err))?;
            // Every chunk is an independent LZX stream with a 32 KB window.
            let mut lzxd = Lzxd::new(WindowSize::KB32);
            let decoded = lzxd
                .decompress_next(&data, expected_size)
                .map_err(|err| Error::chunk(index, err.to_string()))?;
            if decoded.len() != expected_size {
                return Err(Error::chunk(
                    index,
                    format!(
                        "decompressed to {} bytes, expected {}",
                        decoded.len(),
                        expected_size
                    ),
                ));
            }
            trace!(
                "chunk {}: decompressed {} -> {} bytes",
                index,
                stored_size,
                expected_size
            );
            self.chunk_data = decoded.to_vec();
        }
        Ok(())
    }
}
