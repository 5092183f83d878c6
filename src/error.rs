//! The engine's error type.
//!
//! A flat tagged sum rather than one enum per subsystem: callers that just
//! want to fall back to `.notdef` on any failure can match once, while
//! callers that care (a hinting warning vs. a corrupt container) still get
//! a precise tag plus the module that raised it.

use thiserror::Error;

/// The module that produced an [`Error`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(missing_docs)]
pub enum Module {
    Directory,
    Sfnt,
    TrueType,
    Cff,
    Type1,
    Raster,
    Sdf,
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Module::Directory => "directory",
            Module::Sfnt => "sfnt",
            Module::TrueType => "truetype",
            Module::Cff => "cff",
            Module::Type1 => "type1",
            Module::Raster => "raster",
            Module::Sdf => "sdf",
        };
        f.write_str(s)
    }
}

/// The engine's result alias. Used pervasively instead of spelling out
/// `Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Every way a font-engine operation can fail.
///
/// See the crate-level docs for the propagation policy: bytecode and
/// charstring failures are recovered locally (the caller gets an unhinted
/// or empty outline plus a logged warning); everything else propagates.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("unrecognized container format")]
    UnknownFormat,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("stream read past its bounds")]
    InvalidStream,

    #[error("well-formed container but malformed table data")]
    InvalidFormat,

    #[error("outline data is internally inconsistent")]
    InvalidOutline,

    #[error("malformed or unsupported CFF charstring")]
    InvalidCharstring,

    #[error("malformed TrueType bytecode program")]
    InvalidBytecode,

    #[error("composite glyph nesting exceeded the configured limit")]
    CompositeTooDeep,

    #[error("interpreter stack underflow")]
    StackUnderflow,

    #[error("interpreter stack overflow")]
    StackOverflow,

    #[error("arena exhausted")]
    OutOfMemory,

    #[error("feature not implemented")]
    Unimplemented,

    #[error("rasterizer cell buffer overflowed")]
    RasterOverflow,

    #[error("face has no scalable outlines")]
    NotScalable,

    #[error("required table is missing")]
    MissingTable,

    #[error("table failed sanity checks")]
    CorruptTable,

    // -- legacy per-table tags kept for call sites ported from the
    //    table-specific reader layer; these map onto the kinds above.
    #[error("required table {0} is missing")]
    TableMissing(crate::TableName),

    #[error("{0} table has an unsupported version {1}")]
    UnsupportedTableVersion(crate::TableName, u16),

    #[error("no kerning pair found")]
    NoKerning,

    #[error("no horizontal metrics")]
    NoHorizontalMetrics,

    #[error("glyph index is out of range")]
    NoGlyph,
}

impl Error {
    /// The subsystem that is the natural producer of this error kind.
    ///
    /// Best-effort: call sites that already know their module (e.g. the
    /// charstring interpreter) should prefer logging it directly rather
    /// than reconstructing it here.
    pub fn module(&self) -> Module {
        match self {
            Error::InvalidCharstring => Module::Cff,
            Error::InvalidBytecode => Module::TrueType,
            Error::RasterOverflow => Module::Raster,
            Error::UnknownFormat => Module::Directory,
            _ => Module::Sfnt,
        }
    }
}
