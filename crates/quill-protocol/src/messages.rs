use bytes::Bytes;
use quill_core::consistency::ConsistencyLevel;
use quill_core::types::ColumnSpec;
use std::collections::HashMap;

pub const CQL_VERSION_KEY: &str = "CQL_VERSION";

/// QUERY body: text, consistency, and values bound by placeholder name.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub consistency: ConsistencyLevel,
    pub values: Vec<(String, Option<Bytes>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Startup { options: HashMap<String, String> },
    Options,
    Query(QueryRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Option<Bytes>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    Void,
    Rows(Rows),
    SetKeyspace(String),
    SchemaChange {
        change: String,
        target: String,
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Error { code: i32, message: String },
    Ready,
    Authenticate { authenticator: String },
    Supported { options: HashMap<String, Vec<String>> },
    Result(ResultBody),
    Event,
}

/// Error codes the node puts in ERROR bodies.
pub mod error_code {
    pub const SERVER_ERROR: i32 = 0x0000;
    pub const PROTOCOL_ERROR: i32 = 0x000A;
    pub const BAD_CREDENTIALS: i32 = 0x0100;
    pub const UNAVAILABLE: i32 = 0x1000;
    pub const OVERLOADED: i32 = 0x1001;
    pub const IS_BOOTSTRAPPING: i32 = 0x1002;
    pub const TRUNCATE_ERROR: i32 = 0x1003;
    pub const WRITE_TIMEOUT: i32 = 0x1100;
    pub const READ_TIMEOUT: i32 = 0x1200;
    pub const READ_FAILURE: i32 = 0x1300;
    pub const FUNCTION_FAILURE: i32 = 0x1400;
    pub const WRITE_FAILURE: i32 = 0x1500;
    pub const SYNTAX_ERROR: i32 = 0x2000;
    pub const UNAUTHORIZED: i32 = 0x2100;
    pub const INVALID: i32 = 0x2200;
    pub const CONFIG_ERROR: i32 = 0x2300;
    pub const ALREADY_EXISTS: i32 = 0x2400;
    pub const UNPREPARED: i32 = 0x2500;
}
