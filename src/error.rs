//! Error types for simlink.

use thiserror::Error;

/// Error type for simlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Buffer allocation failed.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailed { requested: usize },
    /// Invalid magic number in PDU metadata.
    #[error("invalid PDU magic: expected {expected:#x}, got {got:#x}")]
    InvalidMagic { expected: u32, got: u32 },
    /// Unsupported PDU version.
    #[error("invalid PDU version: expected {expected}, got {got}")]
    InvalidVersion { expected: u32, got: u32 },
    /// PDU metadata describes a layout inconsistent with the buffer.
    #[error("corrupt PDU metadata: {reason}")]
    CorruptMetadata { reason: &'static str },
    /// Destination buffer cannot hold the encoded PDU.
    #[error("buffer too small: required {required} bytes, available {available} bytes")]
    BufferTooSmall { required: usize, available: usize },
    /// Field access past the end of a PDU region.
    #[error("field out of bounds: offset {offset} + {len} bytes exceeds region of {region} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        region: usize,
    },
    /// String value does not fit its fixed wire capacity.
    #[error("string of {len} bytes exceeds field capacity {capacity}")]
    StringTooLong { len: usize, capacity: usize },
    /// String field holds bytes that are not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidString,
    /// A numeric field holds a value outside its domain.
    #[error("invalid value {value} for field {field}")]
    InvalidValue { field: &'static str, value: i64 },
    /// Heap payload does not fit the allocated heap region.
    #[error("heap region too small: required {required} bytes, available {available} bytes")]
    HeapTooSmall { required: usize, available: usize },
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transport signaled a response timeout.
    #[error("timed out waiting for response from service {service}")]
    ResponseTimeout { service: String },
    /// A response arrived for a service other than the one awaited.
    #[error("unexpected response for service {got} while waiting for {expected}")]
    UnexpectedService { expected: String, got: String },
    /// Configuration document is missing or malformed.
    #[error("config error: {0}")]
    Config(String),
    /// The engine or client is not in a state that permits the operation.
    #[error("{0}")]
    InvalidState(String),
    /// IO error while reading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parse error while reading configuration.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for simlink operations.
pub type Result<T> = std::result::Result<T, Error>;
