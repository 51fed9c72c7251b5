// Image tag at offset 0: "MSWIM\0\0\0".
pub const IMAGE_TAG: [u8; 8] = *b"MSWIM\0\0\0";

// The only chunk size ever produced by the Windows imaging tools.
pub const CHUNK_SIZE: u64 = 0x8000;

pub const STREAM_DESCRIPTOR_SIZE: usize = 50;
pub const SECURITY_BLOCK_SIZE: u64 = 8;
pub const DIR_ENTRY_SIZE: u64 = 102;
pub const STREAM_ENTRY_SIZE: u64 = 38;

/// Header flag: the WIM's resources are compressed.
pub const HDR_FLAG_COMPRESSED: u32 = 0x2;
/// Header flag: the WIM is read-only.
pub const HDR_FLAG_READ_ONLY: u32 = 0x4;
/// Header flag: the WIM is one part of a spanned set (unsupported).
pub const HDR_FLAG_SPANNED: u32 = 0x8;
/// Header flag: the WIM holds file resources only (unsupported).
pub const HDR_FLAG_RESOURCE_ONLY: u32 = 0x10;
/// Header flag: the WIM holds metadata only (unsupported).
pub const HDR_FLAG_METADATA_ONLY: u32 = 0x20;
/// Header flag: a write was in progress when the WIM was captured
/// (unsupported).
pub const HDR_FLAG_WRITE_IN_PROGRESS: u32 = 0x40;
/// Header flag: reparse-point targets were fixed up at capture time.
pub const HDR_FLAG_RP_FIX: u32 = 0x80;
/// Header flag: resources are XPRESS-compressed (unsupported).
pub const HDR_FLAG_COMPRESS_XPRESS: u32 = 0x20000;
/// Header flag: resources are LZX-compressed.
pub const HDR_FLAG_COMPRESS_LZX: u32 = 0x40000;

pub const SUPPORTED_HDR_FLAGS: u32 = HDR_FLAG_RP_FIX
    | HDR_FLAG_READ_ONLY
    | HDR_FLAG_COMPRESSED
    | HDR_FLAG_COMPRESS_LZX;

// Resource flags (high byte of the packed size field).  FREE=0x1 and
// SPANNED=0x8 also exist on disk; anything outside the supported set below
// is rejected.
pub const RES_FLAG_METADATA: u8 = 0x2;
pub const RES_FLAG_COMPRESSED: u8 = 0x4;

pub const SUPPORTED_RES_FLAGS: u8 = RES_FLAG_METADATA | RES_FLAG_COMPRESSED;

// "No security descriptor" sentinel in directory entries.
pub const SECURITY_ID_NONE: u32 = 0xffff_ffff;

/// The "read-only" file attribute.
pub const FILE_ATTRIBUTE_READONLY: u32 = 0x1;
/// The "hidden" file attribute.
pub const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
/// The "system file" file attribute.
pub const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
/// The "directory" file attribute.
pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
/// The "archive" (modified since last backup) file attribute.
pub const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x20;
/// The "device" file attribute.
pub const FILE_ATTRIBUTE_DEVICE: u32 = 0x40;
/// The "normal" file attribute.
pub const FILE_ATTRIBUTE_NORMAL: u32 = 0x80;
/// The "temporary" file attribute.
pub const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x100;
/// The "sparse file" file attribute.
pub const FILE_ATTRIBUTE_SPARSE_FILE: u32 = 0x200;
/// The "reparse point" file attribute.
pub const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
/// The "compressed" file attribute.
pub const FILE_ATTRIBUTE_COMPRESSED: u32 = 0x800;
/// The "offline" file attribute.
pub const FILE_ATTRIBUTE_OFFLINE: u32 = 0x1000;
/// The "not content indexed" file attribute.
pub const FILE_ATTRIBUTE_NOT_CONTENT_INDEXED: u32 = 0x2000;
/// The "encrypted" file attribute.
pub const FILE_ATTRIBUTE_ENCRYPTED: u32 = 0x4000;
/// The "integrity stream" file attribute.
pub const FILE_ATTRIBUTE_INTEGRITY_STREAM: u32 = 0x8000;
/// The "virtual" file attribute.
pub const FILE_ATTRIBUTE_VIRTUAL: u32 = 0x10000;
/// The "no scrub data" file attribute.
pub const FILE_ATTRIBUTE_NO_SCRUB_DATA: u32 = 0x20000;
/// The "extended attributes" file attribute.
pub const FILE_ATTRIBUTE_EA: u32 = 0x40000;
