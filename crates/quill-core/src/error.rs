use crate::types::WireType;
use thiserror::Error;

/// A native value could not be turned into bytes for its declared wire type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("wire type {0} is not supported")]
    Unsupported(WireType),
    #[error("value of kind {found} does not fit wire type {expected}")]
    TypeMismatch {
        expected: WireType,
        found: &'static str,
    },
    #[error("ascii value has non-ascii character at byte {position}")]
    NonAscii { position: usize },
    #[error("collection of {0} contains a null element")]
    NullElement(WireType),
    #[error("{0} contains a duplicate element")]
    DuplicateElement(WireType),
    #[error("counter columns accept increments only")]
    CounterAssignment,
    #[error("value is too large to encode ({0} bytes)")]
    TooLarge(usize),
    #[error("placeholder :{0} has no bound value")]
    MissingParameter(String),
    #[error("bound parameter {0} does not appear in the query")]
    UnknownParameter(String),
    #[error("invalid hex blob: {0}")]
    InvalidHex(String),
}

/// Bytes received from the node are malformed for the declared wire type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("wire type {0} is not supported")]
    Unsupported(WireType),
    #[error("{wire_type} expects {expected} bytes, got {found}")]
    InvalidLength {
        wire_type: WireType,
        expected: usize,
        found: usize,
    },
    #[error("{0} value is truncated")]
    Truncated(WireType),
    #[error("{0} value has trailing bytes")]
    TrailingBytes(WireType),
    #[error("text value is not valid utf-8")]
    InvalidUtf8,
    #[error("ascii value has non-ascii byte at {position}")]
    NonAscii { position: usize },
    #[error("boolean byte must be 0 or 1, got {0}")]
    InvalidBoolean(u8),
    #[error("timestamp {0}ms is out of range")]
    TimestampOutOfRange(i64),
    #[error("collection count {0} is negative")]
    NegativeCount(i32),
    #[error("collection of {0} contains a null element")]
    NullElement(WireType),
}

/// Everything `Connection::execute` can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("request timed out: {0}")]
    TransportTimeout(String),
    #[error("transport reset: {0}")]
    TransportReset(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("server error {code:#06x}: {message}")]
    Server { code: i32, message: String },
    #[error("no free stream ids on connection")]
    StreamsExhausted,
}
