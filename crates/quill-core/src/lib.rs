pub mod consistency;
pub mod error;
pub mod types;

pub use consistency::ConsistencyLevel;
pub use error::{ClientError, DecodeError, EncodeError};
pub use types::{ColumnSpec, ColumnValue, Endpoint, ResultSet, Row, WireType};
