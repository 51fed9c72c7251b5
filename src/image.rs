use std::cell::OnceCell;
use std::io::{self, BufReader, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::consts;
use crate::error::{Error, Result};
use crate::file::{read_dir_entry, File};
use crate::resource::{open_resource, ResourceDescriptor};
use crate::wim::{ReadSeek, Wim};

pub(crate) struct ImageEntry {
    pub(crate) resource: ResourceDescriptor,
    pub(crate) security: OnceCell<SecurityData>,
}

impl ImageEntry {
    pub(crate) fn new(resource: ResourceDescriptor) -> ImageEntry {
        ImageEntry { resource, security: OnceCell::new() }
    }
}

/// The security-descriptor table at the head of an image's metadata,
/// decoded once per image.
pub(crate) struct SecurityData {
    pub(crate) descriptors: Vec<Vec<u8>>,
    pub(crate) root_offset: u64,
}

/// An image (one root file-system tree) within a WIM file.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    pub(crate) wim: &'a Wim<dyn ReadSeek + 'a>,
    pub(crate) entry: &'a ImageEntry,
}

impl<'a> Image<'a> {
    /// Parses the image metadata and returns the root directory.
    pub fn open(&self) -> Result<File<'a>> {
        let security = self.security()?;
        let mut entries =
            read_directory(*self, security, security.root_offset)?;
        if entries.len() != 1 {
            return Err(Error::parse(
                "root directory",
                "expected exactly 1 root directory entry",
            ));
        }
        Ok(entries.remove(0))
    }

    pub(crate) fn security(&self) -> Result<&'a SecurityData> {
        let entry: &'a ImageEntry = self.entry;
        if let Some(security) = entry.security.get() {
            return Ok(security);
        }
        let security = self.read_security_descriptors()?;
        Ok(entry.security.get_or_init(|| security))
    }

    fn read_security_descriptors(&self) -> Result<SecurityData> {
        let mut rsrc = open_resource(&self.wim.inner, &self.entry.resource, 0)?;
        let total_length = rsrc
            .read_u32::<LittleEndian>()
            .map_err(|err| Error::io("security table", err))?;
        let num_entries = rsrc
            .read_u32::<LittleEndian>()
            .map_err(|err| Error::io("security table", err))?;
        // Directory entries begin at the declared length, aligned up to 8.
        let table_size = (u64::from(total_length) + 7) & !7;
        let mut bytes_read = consts::SECURITY_BLOCK_SIZE;
        if bytes_read + u64::from(num_entries) * 8 > table_size {
            return Err(Error::parse(
                "security table sizes",
                "security descriptor table too small",
            ));
        }
        let mut sizes = Vec::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            let size = rsrc
                .read_u64::<LittleEndian>()
                .map_err(|err| Error::io("security table sizes", err))?;
            sizes.push(size);
        }
        bytes_read += u64::from(num_entries) * 8;
        let mut descriptors = Vec::with_capacity(num_entries as usize);
        for size in sizes {
            // Only the low 32 bits of each entry size are meaningful.
            let size = size & 0xffff_ffff;
            if bytes_read + size > table_size {
                return Err(Error::parse(
                    "security descriptor",
                    "security descriptor table too small",
                ));
            }
            let mut descriptor = vec![0u8; size as usize];
            rsrc.read_exact(&mut descriptor)
                .map_err(|err| Error::io("security descriptor", err))?;
            bytes_read += size;
            descriptors.push(descriptor);
        }
        discard(&mut rsrc, table_size - bytes_read)
            .map_err(|err| Error::io("security table", err))?;
        debug!(
            "image security table: {} descriptors in {} bytes",
            descriptors.len(),
            table_size
        );
        Ok(SecurityData { descriptors, root_offset: table_size })
    }
}

pub(crate) fn read_directory<'a>(
    img: Image<'a>,
    security: &'a SecurityData,
    offset: u64,
) -> Result<Vec<File<'a>>> {
    let rsrc = open_resource(&img.wim.inner, &img.entry.resource, offset)?;
    let mut reader = BufReader::new(rsrc);
    let mut entries = Vec::new();
    while let Some(file) = read_dir_entry(img, security, &mut reader)? {
        entries.push(file);
    }
    Ok(entries)
}

pub(crate) fn discard<R: Read>(reader: &mut R, count: u64) -> io::Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if copied != count {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
