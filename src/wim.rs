use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::slice;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::consts;
use crate::error::{Error, Result};
use crate::image::{Image, ImageEntry};
use crate::resource::{
    open_resource, parse_resource_descriptor, parse_stream_descriptor,
    read_resource, ResourceDescriptor, Sha1Hash,
};
use crate::string::{decode_utf16, read_utf16_units};

pub(crate) trait ReadSeek: Read + Seek {}
impl<R: Read + Seek> ReadSeek for R {}

/// A structure for reading a WIM file.
///
/// The underlying reader is shared by every [`Image`], [`File`](crate::File)
/// and [`Stream`](crate::Stream) handle derived from it, so all of them
/// borrow the `Wim`.
pub struct Wim<R: ?Sized> {
    pub(crate) inner: WimInner<R>,
}

pub(crate) struct WimInner<R: ?Sized> {
    pub(crate) header: WimHeader,
    pub(crate) file_data: HashMap<Sha1Hash, ResourceDescriptor>,
    pub(crate) images: Vec<ImageEntry>,
    pub(crate) reader: RefCell<R>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct WimHeader {
    pub(crate) version: u32,
    pub(crate) flags: u32,
    pub(crate) chunk_size: u32,
    pub(crate) guid: [u8; 16],
    pub(crate) part_number: u16,
    pub(crate) total_parts: u16,
    pub(crate) image_count: u32,
    pub(crate) offset_table: ResourceDescriptor,
    pub(crate) xml_data: ResourceDescriptor,
}

impl<R: Read + Seek> Wim<R> {
    /// Opens an existing WIM file, validating its header and decoding the
    /// offset table.
    pub fn new(mut reader: R) -> Result<Wim<R>> {
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|err| Error::io("header", err))?;
        let header = parse_header(&mut reader)?;
        let unsupported = header.flags & !consts::SUPPORTED_HDR_FLAGS;
        if unsupported != 0 {
            return Err(Error::unsupported(format!(
                "unsupported WIM flags {:#x}",
                unsupported
            )));
        }
        if u64::from(header.chunk_size) != consts::CHUNK_SIZE {
            return Err(Error::unsupported(format!(
                "unsupported compression chunk size {}",
                header.chunk_size
            )));
        }
        if header.part_number != 1 || header.total_parts != 1 {
            return Err(Error::unsupported("multi-part WIM not supported"));
        }
        let mut wim = Wim {
            inner: WimInner {
                header,
                file_data: HashMap::new(),
                images: Vec::new(),
                reader: RefCell::new(reader),
            },
        };
        let (file_data, images) = {
            let me: &Wim<dyn ReadSeek> = &wim;
            read_offset_table(&me.inner)?
        };
        debug!(
            "opened WIM v{:x}: {} images, {} file resources, flags {:#x}",
            wim.inner.header.version,
            images.len(),
            file_data.len(),
            wim.inner.header.flags
        );
        wim.inner.file_data = file_data;
        wim.inner.images = images;
        Ok(wim)
    }

    /// Returns an iterator over the images in this WIM.
    pub fn images(&self) -> Images<'_> {
        let me: &Wim<dyn ReadSeek> = self;
        Images { wim: me, iter: me.inner.images.iter() }
    }

    /// Returns this WIM's GUID.
    pub fn guid(&self) -> [u8; 16] {
        self.inner.header.guid
    }

    /// Reads the WIM's XML metadata blob, or an empty string if the WIM
    /// carries none.
    pub fn read_xml(&self) -> Result<String> {
        let me: &Wim<dyn ReadSeek> = self;
        read_xml(&me.inner)
    }
}

impl<'a, R: ?Sized + Read> Read for &'a WimInner<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.borrow_mut().read(buf)
    }
}

impl<'a, R: ?Sized + Seek> Seek for &'a WimInner<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.borrow_mut().seek(pos)
    }
}

fn parse_header<R: Read>(reader: &mut R) -> Result<WimHeader> {
    fn header_err(err: io::Error) -> Error {
        Error::io("header", err)
    }
    let mut tag = [0u8; 8];
    reader.read_exact(&mut tag).map_err(header_err)?;
    if tag != consts::IMAGE_TAG {
        return Err(Error::unsupported("not a WIM file"));
    }
    let _size = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let version = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let flags = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let chunk_size = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let mut guid = [0u8; 16];
    reader.read_exact(&mut guid).map_err(header_err)?;
    let part_number = reader.read_u16::<LittleEndian>().map_err(header_err)?;
    let total_parts = reader.read_u16::<LittleEndian>().map_err(header_err)?;
    let image_count = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let offset_table = parse_resource_descriptor(reader).map_err(header_err)?;
    let xml_data = parse_resource_descriptor(reader).map_err(header_err)?;
    let _boot_metadata =
        parse_resource_descriptor(reader).map_err(header_err)?;
    let _boot_index = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let _padding = reader.read_u32::<LittleEndian>().map_err(header_err)?;
    let _integrity = parse_resource_descriptor(reader).map_err(header_err)?;
    Ok(WimHeader {
        version,
        flags,
        chunk_size,
        guid,
        part_number,
        total_parts,
        image_count,
        offset_table,
        xml_data,
    })
}

fn read_offset_table(
    wim: &WimInner<dyn ReadSeek + '_>,
) -> Result<(HashMap<Sha1Hash, ResourceDescriptor>, Vec<ImageEntry>)> {
    let table = read_resource(wim, &wim.header.offset_table)?;
    let mut file_data = HashMap::new();
    let mut images = Vec::new();
    let mut remaining = &table[..];
    while !remaining.is_empty() {
        if remaining.len() < consts::STREAM_DESCRIPTOR_SIZE {
            return Err(Error::parse(
                "offset table",
                "truncated stream descriptor",
            ));
        }
        let entry = parse_stream_descriptor(&mut remaining)
            .map_err(|err| Error::io("offset table", err))?;
        if entry.resource.flags & !consts::SUPPORTED_RES_FLAGS != 0 {
            return Err(Error::parse(
                "offset table",
                format!(
                    "unsupported resource flag {:#x}",
                    entry.resource.flags
                ),
            ));
        }
        #[cfg(feature = "validate")]
        validate_resource(wim, &entry)?;
        if entry.resource.is_metadata() {
            images.push(ImageEntry::new(entry.resource));
        } else {
            file_data.insert(entry.hash, entry.resource);
        }
    }
    if images.len() != wim.header.image_count as usize {
        return Err(Error::parse("offset table", "mismatched image count"));
    }
    Ok((file_data, images))
}

#[cfg(feature = "validate")]
fn validate_resource(
    wim: &WimInner<dyn ReadSeek + '_>,
    entry: &crate::resource::StreamDescriptor,
) -> Result<()> {
    let mut reader = open_resource(wim, &entry.resource, 0)?;
    let mut sha = sha1_smol::Sha1::new();
    let mut buf = vec![0u8; consts::CHUNK_SIZE as usize];
    loop {
        let bytes_read = reader.read_some(&mut buf)?;
        if bytes_read == 0 {
            break;
        }
        sha.update(&buf[..bytes_read]);
    }
    if Sha1Hash(sha.digest().bytes()) != entry.hash {
        return Err(Error::parse(
            "offset table",
            format!("resource hash mismatch for {}", entry.hash),
        ));
    }
    Ok(())
}

fn read_xml(wim: &WimInner<dyn ReadSeek + '_>) -> Result<String> {
    let resource = wim.header.xml_data;
    if resource.compressed_size == 0 {
        return Ok(String::new());
    }
    let mut reader = open_resource(wim, &resource, 0)?;
    let units =
        read_utf16_units(&mut reader, (resource.original_size / 2) as usize)
            .map_err(|err| Error::io("XML data", err))?;
    // The BOM always indicates little-endian UTF-16.
    if units.first() != Some(&0xfeff) {
        return Err(Error::parse("XML data", "invalid BOM"));
    }
    Ok(decode_utf16(&units[1..]))
}

/// An iterator over the images in a WIM file.
pub struct Images<'a> {
    wim: &'a Wim<dyn ReadSeek + 'a>,
    iter: slice::Iter<'a, ImageEntry>,
}

impl<'a> Iterator for Images<'a> {
    type Item = Image<'a>;

    fn next(&mut self) -> Option<Image<'a>> {
        let entry = self.iter.next()?;
        Some(Image { wim: self.wim, entry })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> ExactSizeIterator for Images<'a> {}
