use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use time::OffsetDateTime;

use crate::consts;
use crate::datetime::datetime_from_filetime;
use crate::error::{Error, Result};
use crate::image::{discard, read_directory, Image, SecurityData};
use crate::resource::{
    open_resource, ResourceDescriptor, ResourceReader, Sha1Hash,
};
use crate::string::{decode_utf16, read_utf16_units};
use crate::wim::{ReadSeek, Wim};

/// Metadata about a file or directory in a WIM image.
pub struct FileHeader<'a> {
    name: String,
    short_name: String,
    attributes: u32,
    security_descriptor: Option<&'a [u8]>,
    creation_time: Option<OffsetDateTime>,
    last_access_time: Option<OffsetDateTime>,
    last_write_time: Option<OffsetDateTime>,
    hash: Sha1Hash,
    size: u64,
    link_id: u64,
    reparse_tag: u32,
    reparse_reserved: u32,
}

impl<'a> FileHeader<'a> {
    /// Returns the file's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the file's DOS 8.3 short name, or an empty string if it has
    /// none.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Returns the file's `FILE_ATTRIBUTE_*` bitmap, unchanged from disk.
    pub fn attributes(&self) -> u32 {
        self.attributes
    }

    /// Returns the file's raw security descriptor, if it has one.
    pub fn security_descriptor(&self) -> Option<&[u8]> {
        self.security_descriptor
    }

    /// Returns the file's creation time, if it is representable.
    pub fn creation_time(&self) -> Option<OffsetDateTime> {
        self.creation_time
    }

    /// Returns the file's last access time, if it is representable.
    pub fn last_access_time(&self) -> Option<OffsetDateTime> {
        self.last_access_time
    }

    /// Returns the file's last write time, if it is representable.
    pub fn last_write_time(&self) -> Option<OffsetDateTime> {
        self.last_write_time
    }

    /// Returns the SHA-1 hash of the file's content (zero for an empty
    /// file).
    pub fn hash(&self) -> &Sha1Hash {
        &self.hash
    }

    /// Returns the size of the file's content in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file's hard-link group id, or 0.  Meaningless for
    /// reparse points.
    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    /// Returns the reparse tag for a reparse point, or 0.
    pub fn reparse_tag(&self) -> u32 {
        self.reparse_tag
    }

    /// Returns the reserved reparse word for a reparse point, or 0.
    pub fn reparse_reserved(&self) -> u32 {
        self.reparse_reserved
    }

    /// Returns whether this file is a directory.  A directory reparse point
    /// reads as a leaf, so this returns false for it.
    pub fn is_dir(&self) -> bool {
        self.attributes
            & (consts::FILE_ATTRIBUTE_DIRECTORY
                | consts::FILE_ATTRIBUTE_REPARSE_POINT)
            == consts::FILE_ATTRIBUTE_DIRECTORY
    }
}

/// A file or directory in a WIM image.
pub struct File<'a> {
    header: FileHeader<'a>,
    streams: Vec<Stream<'a>>,
    resource: ResourceDescriptor,
    img: Image<'a>,
    subdir_offset: u64,
}

impl<'a> File<'a> {
    /// Returns the file's metadata.
    pub fn header(&self) -> &FileHeader<'a> {
        &self.header
    }

    /// Returns whether this file is a directory (see
    /// [`FileHeader::is_dir`]).
    pub fn is_dir(&self) -> bool {
        self.header.is_dir()
    }

    /// Returns the file's named alternate data streams.
    pub fn streams(&self) -> &[Stream<'a>] {
        &self.streams
    }

    /// Opens the file's primary content for reading.
    pub fn open(&self) -> Result<ResourceReader<'a>> {
        open_resource(&self.img.wim.inner, &self.resource, 0)
    }

    /// Reads this directory's entries.  Fails if the file is not a
    /// directory.
    pub fn readdir(&self) -> Result<Vec<File<'a>>> {
        if !self.is_dir() {
            return Err(Error::parse_file(
                "readdir",
                self.header.name.clone(),
                "not a directory",
            ));
        }
        let security = self.img.security()?;
        read_directory(self.img, security, self.subdir_offset)
    }
}

/// Metadata about an alternate data stream.
pub struct StreamHeader {
    name: String,
    hash: Sha1Hash,
    size: u64,
}

impl StreamHeader {
    /// Returns the stream's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the SHA-1 hash of the stream's content (zero if empty).
    pub fn hash(&self) -> &Sha1Hash {
        &self.hash
    }

    /// Returns the size of the stream's content in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A named alternate data stream attached to a file in a WIM image.
pub struct Stream<'a> {
    header: StreamHeader,
    wim: &'a Wim<dyn ReadSeek + 'a>,
    resource: ResourceDescriptor,
}

impl<'a> Stream<'a> {
    /// Returns the stream's metadata.
    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Opens the stream's content for reading.
    pub fn open(&self) -> Result<ResourceReader<'a>> {
        open_resource(&self.wim.inner, &self.resource, 0)
    }
}

/// Decodes the next directory entry, or returns `None` at the zero-length
/// terminator.
pub(crate) fn read_dir_entry<'a, R: Read>(
    img: Image<'a>,
    security: &'a SecurityData,
    reader: &mut R,
) -> Result<Option<File<'a>>> {
    let length = reader
        .read_u64::<LittleEndian>()
        .map_err(|err| Error::io("directory length check", err))?;
    if length == 0 {
        return Ok(None);
    }
    if length < consts::DIR_ENTRY_SIZE {
        return Err(Error::parse("directory entry", "size too short"));
    }
    fn entry_err(err: std::io::Error) -> Error {
        Error::io("directory entry", err)
    }
    let attributes = reader.read_u32::<LittleEndian>().map_err(entry_err)?;
    let security_id = reader.read_u32::<LittleEndian>().map_err(entry_err)?;
    let subdir_offset = reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let _unused1 = reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let _unused2 = reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let creation_time = reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let last_access_time =
        reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let last_write_time =
        reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let mut hash = [0u8; 20];
    reader.read_exact(&mut hash).map_err(entry_err)?;
    let hash = Sha1Hash(hash);
    let _padding = reader.read_u32::<LittleEndian>().map_err(entry_err)?;
    let reparse_hard_link =
        reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let stream_count = reader.read_u16::<LittleEndian>().map_err(entry_err)?;
    let short_name_length =
        u64::from(reader.read_u16::<LittleEndian>().map_err(entry_err)?);
    let file_name_length =
        u64::from(reader.read_u16::<LittleEndian>().map_err(entry_err)?);

    let mut left = length - consts::DIR_ENTRY_SIZE;
    let names_length = file_name_length + 2 + short_name_length;
    if left < names_length {
        return Err(Error::parse("directory entry", "size too short for names"));
    }
    let units = read_utf16_units(reader, (names_length / 2) as usize)
        .map_err(|err| Error::io("file name", err))?;
    left -= units.len() as u64 * 2;

    let name = decode_utf16(&units[..(file_name_length / 2) as usize]);
    // A single UTF-16 null separates the two names.
    let short_name = decode_utf16(&units[(file_name_length / 2 + 1) as usize..]);

    let resource = if hash.is_zero() {
        ResourceDescriptor::default()
    } else {
        match img.wim.inner.file_data.get(&hash) {
            Some(&resource) => resource,
            None => {
                return Err(Error::parse_file(
                    "directory entry",
                    name,
                    format!("could not find file data matching hash {}", hash),
                ));
            }
        }
    };

    let mut header = FileHeader {
        name,
        short_name,
        attributes,
        security_descriptor: None,
        creation_time: datetime_from_filetime(creation_time),
        last_access_time: datetime_from_filetime(last_access_time),
        last_write_time: datetime_from_filetime(last_write_time),
        hash,
        size: resource.original_size,
        link_id: 0,
        reparse_tag: 0,
        reparse_reserved: 0,
    };

    let mut is_dir = false;
    if attributes & consts::FILE_ATTRIBUTE_REPARSE_POINT == 0 {
        header.link_id = reparse_hard_link;
        if attributes & consts::FILE_ATTRIBUTE_DIRECTORY != 0 {
            is_dir = true;
        }
    } else {
        header.reparse_tag = reparse_hard_link as u32;
        header.reparse_reserved = (reparse_hard_link >> 32) as u32;
    }

    if is_dir && subdir_offset == 0 {
        return Err(Error::parse_file(
            "directory entry",
            header.name,
            "no subdirectory data for directory",
        ));
    } else if !is_dir && subdir_offset != 0 {
        return Err(Error::parse_file(
            "directory entry",
            header.name,
            "unexpected subdirectory data for non-directory",
        ));
    }

    if security_id != consts::SECURITY_ID_NONE {
        match security.descriptors.get(security_id as usize) {
            Some(descriptor) => {
                header.security_descriptor = Some(descriptor.as_slice());
            }
            None => {
                return Err(Error::parse_file(
                    "directory entry",
                    header.name,
                    format!(
                        "security descriptor index {} out of range",
                        security_id
                    ),
                ));
            }
        }
    }

    discard(reader, left).map_err(entry_err)?;

    let mut resource = resource;
    let mut streams = Vec::new();
    let mut saw_unnamed = false;
    for _ in 0..stream_count {
        let stream = read_stream_entry(img, reader)?;
        if stream.header.name.is_empty() {
            // The first unnamed stream carries the file's own content; any
            // further unnamed streams are dropped.
            if !saw_unnamed {
                saw_unnamed = true;
                header.hash = stream.header.hash;
                header.size = stream.header.size;
                resource = stream.resource;
            }
        } else {
            streams.push(stream);
        }
    }

    if attributes & consts::FILE_ATTRIBUTE_REPARSE_POINT != 0
        && header.size == 0
    {
        return Err(Error::parse_file(
            "directory entry",
            header.name,
            "reparse point is missing reparse stream",
        ));
    }

    Ok(Some(File { header, streams, resource, img, subdir_offset }))
}

fn read_stream_entry<'a, R: Read>(
    img: Image<'a>,
    reader: &mut R,
) -> Result<Stream<'a>> {
    let length = reader
        .read_u64::<LittleEndian>()
        .map_err(|err| Error::io("stream length check", err))?;
    if length < consts::STREAM_ENTRY_SIZE {
        return Err(Error::parse("stream entry", "size too short"));
    }
    fn entry_err(err: std::io::Error) -> Error {
        Error::io("stream entry", err)
    }
    let _unused = reader.read_u64::<LittleEndian>().map_err(entry_err)?;
    let mut hash = [0u8; 20];
    reader.read_exact(&mut hash).map_err(entry_err)?;
    let hash = Sha1Hash(hash);
    let name_length =
        u64::from(reader.read_u16::<LittleEndian>().map_err(entry_err)?);

    let mut left = length - consts::STREAM_ENTRY_SIZE;
    if left < name_length {
        return Err(Error::parse("stream entry", "size too short for name"));
    }
    let units = read_utf16_units(reader, (name_length / 2) as usize)
        .map_err(|err| Error::io("file name", err))?;
    left -= units.len() as u64 * 2;
    let name = decode_utf16(&units);

    let resource = if hash.is_zero() {
        ResourceDescriptor::default()
    } else {
        match img.wim.inner.file_data.get(&hash) {
            Some(&resource) => resource,
            None => {
                return Err(Error::parse_file(
                    "stream entry",
                    name,
                    format!("could not find file data matching hash {}", hash),
                ));
            }
        }
    };

    discard(reader, left).map_err(entry_err)?;

    Ok(Stream {
        header: StreamHeader { name, hash, size: resource.original_size },
        wim: img.wim,
        resource,
    })
}
