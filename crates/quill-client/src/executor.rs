use crate::classify::classify;
use crate::connection::Connection;
use metrics::counter;
use quill_codec::{decode, encode, to_literal};
use quill_core::consistency::ConsistencyLevel;
use quill_core::error::{ClientError, DecodeError, EncodeError};
use quill_core::types::{ColumnValue, ResultSet, Row, WireType};
use quill_protocol::messages::{QueryRequest, Request, Response, ResultBody, Rows};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// A value together with the column type it is bound as.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub wire_type: WireType,
    pub value: ColumnValue,
}

impl TypedValue {
    pub fn new(wire_type: WireType, value: impl Into<ColumnValue>) -> Self {
        Self {
            wire_type,
            value: value.into(),
        }
    }
}

/// Values for `:name` placeholders, keyed by name without the colon.
pub type Parameters = HashMap<String, TypedValue>;

#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    params: Parameters,
    consistency: ConsistencyLevel,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Parameters::new(),
            consistency: ConsistencyLevel::default(),
        }
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_parameters(mut self, params: Parameters) -> Self {
        self.params.extend(params);
        self
    }

    pub fn bind(
        mut self,
        name: impl Into<String>,
        wire_type: WireType,
        value: impl Into<ColumnValue>,
    ) -> Self {
        self.params
            .insert(name.into(), TypedValue::new(wire_type, value));
        self
    }

    /// Splices `value` into the query text in place of every `:name`
    /// placeholder, rendered as a CQL literal.
    pub fn inline(
        mut self,
        name: &str,
        wire_type: &WireType,
        value: &ColumnValue,
    ) -> Result<Self, EncodeError> {
        let literal = to_literal(wire_type, value)?;
        let uses: Vec<Placeholder<'_>> = placeholders(&self.text)
            .into_iter()
            .filter(|p| p.name == name)
            .collect();
        if uses.is_empty() {
            return Err(EncodeError::UnknownParameter(name.to_string()));
        }
        if *wire_type == WireType::Counter && !uses.iter().all(|p| p.increment) {
            return Err(EncodeError::CounterAssignment);
        }
        let mut text = String::with_capacity(self.text.len() + literal.len());
        let mut last = 0;
        for p in &uses {
            text.push_str(&self.text[last..p.start]);
            text.push_str(&literal);
            last = p.end;
        }
        text.push_str(&self.text[last..]);
        self.text = text;
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn consistency(&self) -> ConsistencyLevel {
        self.consistency
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Checks that placeholders and bound names match both ways and encodes
    /// every value. Nothing here touches the network.
    pub fn to_request(&self) -> Result<QueryRequest, EncodeError> {
        let found = placeholders(&self.text);
        if let Some(missing) = found.iter().find(|p| !self.params.contains_key(p.name)) {
            return Err(EncodeError::MissingParameter(missing.name.to_string()));
        }
        let mut names: Vec<&String> = self.params.keys().collect();
        names.sort();
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let typed = &self.params[name];
            let uses: Vec<&Placeholder<'_>> = found.iter().filter(|p| p.name == name).collect();
            if uses.is_empty() {
                return Err(EncodeError::UnknownParameter(name.clone()));
            }
            if typed.wire_type == WireType::Counter && !uses.iter().all(|p| p.increment) {
                return Err(EncodeError::CounterAssignment);
            }
            values.push((name.clone(), encode(&typed.wire_type, &typed.value)?));
        }
        Ok(QueryRequest {
            query: self.text.clone(),
            consistency: self.consistency,
            values,
        })
    }
}

impl Connection {
    /// Runs `query` with `params` bound by name and returns the decoded rows.
    /// Statements that return no rows yield an empty result set.
    pub async fn execute(
        &self,
        query: &str,
        params: &Parameters,
        consistency: ConsistencyLevel,
    ) -> Result<ResultSet, ClientError> {
        self.run(
            Query::new(query)
                .with_parameters(params.clone())
                .with_consistency(consistency),
        )
        .await
    }

    /// Like `execute`, but gives up waiting after `timeout`. The request may
    /// still complete on the node.
    pub async fn execute_with_timeout(
        &self,
        query: &str,
        params: &Parameters,
        consistency: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<ResultSet, ClientError> {
        tokio::time::timeout(timeout, self.execute(query, params, consistency))
            .await
            .map_err(|_| ClientError::TransportTimeout(format!("no response within {timeout:?}")))?
    }

    pub async fn run(&self, query: Query) -> Result<ResultSet, ClientError> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        let request = query.to_request()?;
        counter!("quill_queries_total").increment(1);
        let result = self.submit(request).await;
        if let Err(err) = &result {
            let class = classify(err);
            counter!("quill_query_errors_total", "class" => class.as_str()).increment(1);
            debug!(query = %query.text(), %class, "query failed: {err}");
        }
        result
    }

    async fn submit(&self, request: QueryRequest) -> Result<ResultSet, ClientError> {
        self.ready().await?;
        let shared = self.shared();
        let frame = shared.round_trip(Request::Query(request)).await?;
        let response = match Response::decode(frame.opcode, frame.body) {
            Ok(response) => response,
            Err(err) => {
                warn!(endpoint = %self.endpoint(), "malformed response: {err}");
                shared.record_protocol_error();
                return Err(ClientError::Protocol(err.to_string()));
            }
        };
        match response {
            Response::Result(body) => {
                shared.record_success();
                Ok(result_set(body)?)
            }
            Response::Error { code, message } => {
                shared.record_success();
                Err(ClientError::Server { code, message })
            }
            other => {
                shared.record_protocol_error();
                Err(ClientError::Protocol(format!(
                    "unexpected {:?} response to QUERY",
                    other.opcode()
                )))
            }
        }
    }
}

pub(crate) fn result_set(body: ResultBody) -> Result<ResultSet, DecodeError> {
    let Rows { columns, rows } = match body {
        ResultBody::Rows(rows) => rows,
        ResultBody::Void | ResultBody::SetKeyspace(_) | ResultBody::SchemaChange { .. } => {
            return Ok(ResultSet::empty())
        }
    };
    let mut decoded = Vec::with_capacity(rows.len());
    for cells in rows {
        let mut row = Row::new();
        for (column, cell) in columns.iter().zip(cells) {
            row.insert(column.name.clone(), decode(&column.wire_type, cell.as_deref())?);
        }
        decoded.push(row);
    }
    Ok(ResultSet {
        columns,
        rows: decoded,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder<'a> {
    pub(crate) name: &'a str,
    /// Byte offset of the colon.
    pub(crate) start: usize,
    pub(crate) end: usize,
    /// Preceded by `+` or `-`, as in `c = c + :delta`.
    pub(crate) increment: bool,
}

/// Finds `:name` placeholders outside quoted strings, quoted identifiers and
/// `--` comments.
pub(crate) fn placeholders(text: &str) -> Vec<Placeholder<'_>> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            quote @ (b'\'' | b'"') => {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != quote {
                    idx += 1;
                }
                // A doubled quote reopens a quoted run right away.
                idx += 1;
            }
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
            }
            b':' if bytes
                .get(idx + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') =>
            {
                let start = idx;
                idx += 1;
                let name_start = idx;
                while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
                    idx += 1;
                }
                found.push(Placeholder {
                    name: &text[name_start..idx],
                    start,
                    end: idx,
                    increment: follows_sign(&bytes[..start]),
                });
            }
            _ => idx += 1,
        }
    }
    found
}

fn follows_sign(before: &[u8]) -> bool {
    matches!(
        before.iter().rev().find(|b| !b.is_ascii_whitespace()),
        Some(b'+') | Some(b'-')
    )
}
