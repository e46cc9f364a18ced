//! Error types for YM file loading.

/// Errors surfaced while depacking and decoding a YM file.
///
/// All of these come out of [`crate::YmMusic::load_memory`]; once a load has
/// failed the player behaves as if stopped and runtime calls are no-ops.
#[derive(thiserror::Error, Debug)]
pub enum YmError {
    /// The input ends before its headers say it should.
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    /// A recognized but unsupported container or tag (YM4, unknown LZH
    /// method, unknown format tag).
    #[error("unsupported format: {0}")]
    FormatUnsupported(String),

    /// A YM5/YM6 file without the "LeOnArD!" check string.
    #[error("bad signature: missing \"LeOnArD!\" check string")]
    BadSignature,

    /// The LZH Huffman tables are inconsistent or the stream is damaged.
    #[error("corrupt LZH stream: {0}")]
    CorruptStream(&'static str),

    /// A register, voice or block field outside its valid range.
    #[error("out of range: {0}")]
    OutOfRange(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, YmError>;
