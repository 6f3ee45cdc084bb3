//! Error types for detection walks and plugin attempts.

use thiserror::Error;

use crate::pattern::PatternSyntaxError;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenient result alias for detection walks.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Errors that abort a detection walk or catalog construction.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A built-in or user-supplied signature failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternSyntaxError),
    /// The module callback reported an error; the walk stopped.
    #[error("callback failed at offset 0x{offset:x} of '{container}'")]
    CallbackFailed {
        /// Offset of the module inside its container.
        offset: usize,
        /// Path of the container being scanned.
        container: String,
        /// Error returned by the callback.
        #[source]
        source: BoxError,
    },
    /// Reading input or configuration failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Plugin order names an id the catalog does not know.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),
}

/// Convenient result alias for plugin decoders.
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Why a plugin rejected or failed to decode data.
///
/// Never fatal to a walk: the orchestrator logs it and moves on to the next plugin.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Data does not carry the expected signature.
    #[error("signature mismatch")]
    InvalidSignature,
    /// Buffer too small to contain the requested structure.
    #[error("unexpected end of data")]
    UnexpectedEof,
    /// Relative pointer points outside of the data.
    #[error("pointer at offset 0x{offset:04x} points outside data")]
    PointerOutOfRange {
        /// Offset of the pointer field.
        offset: usize,
    },
    /// Null-terminated string was not terminated before the end of data.
    #[error("unterminated string at offset 0x{start:04x}")]
    UnterminatedString {
        /// Start offset of the string.
        start: usize,
    },
    /// Stored checksum disagrees with the data.
    #[error("checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch {
        /// Value found in the data.
        stored: u32,
        /// Value computed over the data.
        computed: u32,
    },
    /// Packed payload could not be decompressed.
    #[error("decompression failed: {0}")]
    Decompression(String),
    /// Decoded size exceeds the configured limit.
    #[error("decoded size {size} exceeds limit {limit}")]
    LimitExceeded {
        /// Size the data would decode to.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// Generic validation error.
    #[error("{msg}")]
    InvalidData {
        /// Human-readable explanation of the validation failure.
        msg: String,
    },
}

impl From<String> for FormatError {
    fn from(s: String) -> Self {
        FormatError::InvalidData { msg: s }
    }
}

impl From<&str> for FormatError {
    fn from(s: &str) -> Self {
        FormatError::InvalidData { msg: s.to_string() }
    }
}
