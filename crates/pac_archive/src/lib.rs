//! This library handles reading from and creating **PAC** asset archive files.
//!
//! # PAC Archive Format Documentation
//!
//! This crate provides utilities to build, write, read and extract data from the **PAC**
//! archive format. A PAC file bundles many opaque data blobs (textures, sounds, configs)
//! into a single file with O(1) lookup by a structured 96-bit identifier, optional per-blob
//! compression, and per-blob content hashing. PAC files are typically identified with the
//! `.pac` extension.
//!
//! ## File Structure
//!
//! A PAC file consists of a fixed header, followed by the blob data, an index section, an
//! optional metadata section, and an optional trash section.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x50504143 ("PPAC")                               |
//! | 0x0004         | Major version          | 2 bytes: Fixed value 4                                     |
//! | 0x0006         | Minor version          | 2 bytes: Fixed value 0                                     |
//! | 0x0008         | Reserved A             | 8 bytes: Zero on write, preserved on read                  |
//! | 0x0010         | Reserved B             | 8 bytes: Zero on write, preserved on read                  |
//! | 0x0018         | Flags                  | 4 bytes: Bit 0 selects 64-bit ("wide") offsets             |
//! | 0x001C         | Index offset           | 4 or 8 bytes: Offset to the index section                  |
//! | ...            | Metadata offset        | 4 or 8 bytes: Offset to the metadata section, 0 if absent  |
//! | ...            | Trash offset           | 4 or 8 bytes: Offset to the trash section, 0 if absent     |
//!
//! The header is 40 bytes in narrow mode and 52 bytes in wide mode. A non-zero section
//! offset always points strictly past the header.
//!
//! ### Identifiers
//!
//! Every blob is addressed by a 96-bit identifier made of a 16-bit type, a 16-bit purpose
//! and a 32-bit unique value. Type and purpose are packed into one 32-bit field
//! (`type << 16 | purpose`); the unique value is carried separately. Identifiers order
//! type-major and render as `pac://0xTTTT/0xPPPP/0xUUUUUUUU` in diagnostics and manifests.
//!
//! ### Index Section
//!
//! The index section starts with a signed 32-bit entry count followed by that many
//! fixed-layout entries and a 4-byte guard constant. Each entry holds:
//!
//! | Field                  | Size     | Description                                        |
//! |------------------------|----------|----------------------------------------------------|
//! | Type/purpose           | 4 bytes  | Combined type and purpose of the identifier        |
//! | Unique                 | 4 bytes  | Unique value of the identifier                     |
//! | Offset                 | 4/8 bytes| Offset to the blob data from the start of the file |
//! | Disk size              | 4 bytes  | Stored size of the blob (after compression)        |
//! | Memory size            | 4 bytes  | Size of the blob once decompressed                 |
//! | Compression id         | 4 bytes  | Codec id in the top byte, 0 = stored raw           |
//! | SHA-256                | 32 bytes | Hash of the uncompressed blob content              |
//!
//! ### Metadata Section
//!
//! Present only when its header offset is non-zero. Starts with a signed 32-bit total byte
//! size and a signed 32-bit block count, followed by the blocks and a 4-byte guard
//! constant. Each block is keyed by an identifier and holds a 16-bit entry count, a 16-bit
//! block byte size, and its entries as `(key length u8, value length u8, key, value)`
//! records of UTF-8 strings. Keys and values are capped at 255 encoded bytes.
//!
//! ### Trash Section
//!
//! A reclaimed-space index reserved for a future incremental-write feature. Present only
//! when its header offset is non-zero; a signed 32-bit count followed by
//! `(offset u32/u64, size u32)` records. The writer never populates it.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.pac`
//! - **Endianness**: Big-endian for all multi-byte integers
//! - **Compression Methods**:
//!   - `0`: None (stored raw)
//!   - `1`: Deflate (one contiguous zlib-framed stream per blob)
//!

pub mod builder;
pub mod compression;
pub mod error;
pub mod read;
pub mod source;
pub mod tpuid;
pub mod types;
pub mod write;

pub use builder::{EntryBuilder, HeaderOptions, PacBuilder};
pub use compression::CompressionMethod;
pub use read::PacArchive;
pub use source::AssetSource;
pub use tpuid::{Tpuid, TpuidRange};
pub use types::PacFile;
pub use write::{PacWriter, PacWriterOptions};
