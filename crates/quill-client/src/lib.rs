pub mod classify;
pub mod config;
pub mod connection;
mod correlation;
pub mod executor;
pub mod transport;

pub use classify::{classify, ErrorClass, RetryPolicy};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionOptions, ConnectionState};
pub use correlation::MAX_STREAMS;
pub use executor::{Parameters, Query, TypedValue};
pub use transport::{BoxedStream, Connector, TcpConnector};

pub use quill_core::{
    ClientError, ColumnSpec, ColumnValue, ConsistencyLevel, DecodeError, EncodeError, Endpoint,
    ResultSet, Row, WireType,
};

/// Opens a connection over TCP and completes the handshake, selecting
/// `keyspace` when it is not empty.
pub async fn connect(endpoint: Endpoint, keyspace: &str) -> Result<Connection, ClientError> {
    Connection::connect(endpoint, keyspace).await
}
