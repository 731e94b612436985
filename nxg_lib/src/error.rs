use thiserror::Error;

/// Errors while parsing or decoding texture and archive data.
///
/// Failures are detected eagerly at the point where they first become
/// visible. A failed parse never returns partially decoded data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("buffer of {actual} bytes is too short for the {expected} byte header")]
    HeaderTooShort { expected: usize, actual: usize },

    #[error("expected magic {expected:?} but found {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("surface dimensions {width}x{height} must both be nonzero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("mipmap count must be at least 1")]
    ZeroMipmaps,

    #[error("image format tag {0} is not supported")]
    UnsupportedImageFormat(u32),

    #[error("mip {mipmap} requires {required} bytes but only {available} remain")]
    TruncatedMipmap {
        mipmap: u32,
        required: u64,
        available: u64,
    },

    #[error("surface data of {actual} bytes does not match the expected size of {expected} bytes")]
    UnexpectedSurfaceSize { expected: u64, actual: usize },

    #[error("archive directory declares {declared} entries but ends after entry {parsed}")]
    TruncatedDirectory { declared: u32, parsed: usize },

    #[error("name for entry {index} is not valid UTF-8")]
    InvalidEntryName { index: usize },

    #[error("entry {index} range {start}..{end} exceeds the archive size of {archive_size} bytes")]
    EntryOutOfBounds {
        index: usize,
        start: u64,
        end: u64,
        archive_size: usize,
    },

    #[error("entries {first} and {second} reference overlapping byte ranges")]
    OverlappingEntries { first: usize, second: usize },

    #[error("index {index} is out of range for {count} items")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("error reading data: {0}")]
    Binrw(#[from] binrw::Error),

    #[error("error reading data: {0}")]
    Io(#[from] std::io::Error),
}
