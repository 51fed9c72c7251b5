//! A library for reading [Windows Imaging
//! Format](https://en.wikipedia.org/wiki/Windows_Imaging_Format) (WIM)
//! files.
//!
//! WIM files are used to distribute Windows file-system and container
//! images.  A WIM holds one or more *images*, each a full directory tree;
//! file contents are stored once, as possibly LZX-compressed *resources*
//! addressed by the SHA-1 hash of their data.
//!
//! ```no_run
//! use std::fs;
//!
//! let file = fs::File::open("install.wim")?;
//! let wim = wim::Wim::new(file)?;
//! for image in wim.images() {
//!     let root = image.open()?;
//!     for entry in root.readdir()? {
//!         println!("{}", entry.header().name());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

mod consts;
mod datetime;
mod error;
mod file;
mod image;
mod resource;
mod string;
mod wim;

pub use crate::consts::{
    HDR_FLAG_COMPRESSED, HDR_FLAG_COMPRESS_LZX, HDR_FLAG_COMPRESS_XPRESS,
    HDR_FLAG_METADATA_ONLY, HDR_FLAG_READ_ONLY, HDR_FLAG_RESOURCE_ONLY,
    HDR_FLAG_RP_FIX, HDR_FLAG_SPANNED, HDR_FLAG_WRITE_IN_PROGRESS,
};
pub use crate::consts::{
    FILE_ATTRIBUTE_ARCHIVE, FILE_ATTRIBUTE_COMPRESSED, FILE_ATTRIBUTE_DEVICE,
    FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_EA, FILE_ATTRIBUTE_ENCRYPTED,
    FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_INTEGRITY_STREAM,
    FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_NOT_CONTENT_INDEXED,
    FILE_ATTRIBUTE_NO_SCRUB_DATA, FILE_ATTRIBUTE_OFFLINE,
    FILE_ATTRIBUTE_READONLY, FILE_ATTRIBUTE_REPARSE_POINT,
    FILE_ATTRIBUTE_SPARSE_FILE, FILE_ATTRIBUTE_SYSTEM,
    FILE_ATTRIBUTE_TEMPORARY, FILE_ATTRIBUTE_VIRTUAL,
};
pub use crate::error::{Error, Result};
pub use crate::file::{File, FileHeader, Stream, StreamHeader};
pub use crate::image::Image;
pub use crate::resource::{ResourceReader, Sha1Hash};
pub use crate::wim::{Images, Wim};
