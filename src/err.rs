use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type EvtResult<T> = std::result::Result<T, EvtError>;
pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;
pub type SerializationResult<T> = std::result::Result<T, SerializationError>;

/// The closed set of failure categories every error in this crate maps onto.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid caller input.
    Argument,
    /// An offset or size falls outside the validated region.
    Bounds,
    /// Magic bytes differ from the fixed constant.
    SignatureMismatch,
    /// Leading/trailing size fields disagree, or disagree with the structure's fixed size.
    SizeMismatch,
    Allocation,
    /// On-disk text could not be transcoded.
    Conversion,
    Io,
}

/// Errors produced while decoding structures out of raw bytes.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error(
        "Offset {offset}: tried to read {need} bytes of {what}, but only {have} bytes are available"
    )]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("Offset {offset}: {what} (size {size}) escapes its region, which ends at {limit}")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        size: u64,
        limit: u64,
    },

    #[error("Invalid {what}, expected `{expected:02X?}`, found `{found:02X?}`")]
    InvalidSignature {
        what: &'static str,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("Mismatch in {what}, expected {expected}, found {found}")]
    SizeMismatch {
        what: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("Failed to allocate {size} bytes for {what}")]
    FailedToAllocate { what: &'static str, size: usize },

    #[error("Offset {offset}: failed to decode UTF-16 string ({what})")]
    InvalidUtf16String { what: &'static str, offset: u64 },

    #[error("Failed to encode `{value}` using codepage {codepage}")]
    FailedToEncodeNarrowString { value: String, codepage: u32 },

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),
}

impl DeserializationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeserializationError::Truncated { .. } | DeserializationError::OutOfBounds { .. } => {
                ErrorKind::Bounds
            }
            DeserializationError::InvalidSignature { .. } => ErrorKind::SignatureMismatch,
            DeserializationError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            DeserializationError::FailedToAllocate { .. } => ErrorKind::Allocation,
            DeserializationError::InvalidUtf16String { .. }
            | DeserializationError::FailedToEncodeNarrowString { .. } => ErrorKind::Conversion,
            DeserializationError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Errors produced while rendering a record into JSON or XML.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Writing to XML failed with: {message}")]
    XmlOutputError { message: String },

    #[error("`serde_json` failed with error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Record data contains invalid UTF-8: {source}")]
    RecordContainsInvalidUtf8 {
        #[from]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to read a record field for output: {source}")]
    FailedToReadRecordField {
        #[from]
        source: DeserializationError,
    },
}

impl SerializationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SerializationError::FailedToReadRecordField { source } => source.kind(),
            _ => ErrorKind::Conversion,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvtError {
    #[error("Failed to open file {}", path.display())]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error("Failed to read the file header")]
    FailedToReadFileHeader {
        #[source]
        source: DeserializationError,
    },

    #[error("Codepage {codepage} is not supported")]
    UnsupportedCodepage { codepage: u32 },

    #[error("The parser has been closed")]
    NotOpen,

    #[error("Record index {index} is out of range, there are {count} records")]
    InvalidRecordIndex { index: usize, count: usize },

    #[error(transparent)]
    DeserializationError(#[from] DeserializationError),

    #[error(transparent)]
    SerializationError(#[from] SerializationError),

    #[error("An I/O error has occurred")]
    Io(#[from] io::Error),
}

impl EvtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvtError::FailedToOpenFile { .. } | EvtError::Io(_) => ErrorKind::Io,
            EvtError::FailedToReadFileHeader { source } => source.kind(),
            EvtError::UnsupportedCodepage { .. }
            | EvtError::NotOpen
            | EvtError::InvalidRecordIndex { .. } => ErrorKind::Argument,
            EvtError::DeserializationError(e) => e.kind(),
            EvtError::SerializationError(e) => e.kind(),
        }
    }
}
