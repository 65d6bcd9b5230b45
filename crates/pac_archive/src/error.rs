//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::tpuid::Tpuid;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRw(#[from] binrw::Error),

    /// The byte stream does not form a valid PAC archive
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A requested identifier is not present in the archive
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A builder stage was committed with a required field missing
    #[error(transparent)]
    Builder(#[from] BuilderStateError),

    /// A blob carries a compression id no registered codec can decode
    #[error("unsupported compression id {0:#x}")]
    UnsupportedCompression(u32),

    /// An identifier range was constructed backwards
    #[error("range start {start} must not be greater than end {end}")]
    InvalidRange { start: Tpuid, end: Tpuid },

    /// An identifier string could not be parsed
    #[error("invalid identifier {0:?}")]
    InvalidTpuid(String),
}

/// Structural errors raised while parsing a PAC byte stream
///
/// Always fatal to the current read; the reader makes no attempt at partial recovery.
#[derive(Error, Diagnostic, Debug)]
pub enum FormatError {
    /// bad magic
    #[error("bad magic: expected {expected:#010X}, found {found:#010X}")]
    BadMagic { expected: u32, found: u32 },

    /// unsupported version
    #[error("unsupported format version: expected 4.0, found {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// negative entry count
    #[error("negative entry count {found} in {section} section")]
    NegativeCount { section: &'static str, found: i32 },

    /// guard constant mismatch after a section
    #[error("bad {section} section guard: expected {expected:#010X}, found {found:#010X}")]
    BadGuard {
        section: &'static str,
        expected: u32,
        found: u32,
    },

    /// a section offset pointing inside the fixed header
    #[error("{section} section offset {offset:#x} falls inside the {header_len} byte header")]
    BadSectionOffset {
        section: &'static str,
        offset: u64,
        header_len: u64,
    },

    /// no index section
    #[error("archive has no index section")]
    MissingIndex,
}

/// Error type to provide further information when an identifier has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum LookupError {
    /// no index entry
    #[error("no entry for {0}")]
    Entry(Tpuid),

    /// no asset source attached
    #[error("no asset source for {0}")]
    Source(Tpuid),
}

/// Errors raised when a builder stage is committed before its required fields are set
///
/// These signal programmer error at construction time rather than at serialization time.
#[derive(Error, Diagnostic, Debug)]
pub enum BuilderStateError {
    /// header never constructed
    #[error("header not constructed")]
    HeaderNotSet,

    /// entry has no identifier
    #[error("entry is missing an identifier")]
    MissingTpuid,

    /// entry has no asset source
    #[error("entry is missing an asset source")]
    MissingSource,

    /// entry has neither a computed nor an ignored hash
    #[error("entry is missing a hash decision")]
    MissingHashDecision,
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
