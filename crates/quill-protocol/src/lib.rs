pub mod backend;
pub mod error;
pub mod frame;
pub mod frontend;
pub mod messages;
mod wire;

pub use error::ProtocolError;
pub use frame::{read_frame, write_frame, Frame, Opcode};
pub use messages::{QueryRequest, Request, Response, ResultBody, Rows};
