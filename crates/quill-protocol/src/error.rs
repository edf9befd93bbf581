use crate::frame::Opcode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported protocol version byte {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("frame body of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("message truncated while reading {0}")]
    Truncated(&'static str),
    #[error("{0} bytes left over after message body")]
    TrailingBytes(usize),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("unknown column type id {0:#06x}")]
    UnknownTypeId(u16),
    #[error("unknown result kind {0}")]
    UnknownResultKind(i32),
    #[error("unknown consistency code {0:#06x}")]
    UnknownConsistency(u16),
    #[error("collection types nested deeper than {0} levels")]
    TypeTooDeep(usize),
    #[error("rows result has {0} rows but no columns")]
    RowsWithoutColumns(usize),
    #[error("rows result carries no column metadata")]
    MissingMetadata,
    #[error("unexpected {0:?} message")]
    UnexpectedOpcode(Opcode),
}
