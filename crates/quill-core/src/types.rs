use crate::error::EncodeError;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PORT: u16 = 9042;

/// Column type tag as the node knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WireType {
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Inet,
    Int,
    Text,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    List(Box<WireType>),
    Set(Box<WireType>),
    Map(Box<WireType>, Box<WireType>),
}

impl WireType {
    pub fn list(element: WireType) -> Self {
        WireType::List(Box::new(element))
    }

    pub fn set(element: WireType) -> Self {
        WireType::Set(Box::new(element))
    }

    pub fn map(key: WireType, value: WireType) -> Self {
        WireType::Map(Box::new(key), Box::new(value))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, WireType::List(_) | WireType::Set(_) | WireType::Map(_, _))
    }

    /// Numeric and boolean types are written as bare literals in query text.
    pub fn is_unquoted_literal(&self) -> bool {
        matches!(
            self,
            WireType::Bigint
                | WireType::Boolean
                | WireType::Counter
                | WireType::Double
                | WireType::Float
                | WireType::Int
                | WireType::Varint
        )
    }

    /// Short name used for column naming, e.g. `list` for `list<int>`.
    pub fn short_name(&self) -> &'static str {
        match self {
            WireType::Ascii => "ascii",
            WireType::Bigint => "bigint",
            WireType::Blob => "blob",
            WireType::Boolean => "boolean",
            WireType::Counter => "counter",
            WireType::Decimal => "decimal",
            WireType::Double => "double",
            WireType::Float => "float",
            WireType::Inet => "inet",
            WireType::Int => "int",
            WireType::Text => "text",
            WireType::Timestamp => "timestamp",
            WireType::Uuid => "uuid",
            WireType::Varchar => "varchar",
            WireType::Varint => "varint",
            WireType::Timeuuid => "timeuuid",
            WireType::List(_) => "list",
            WireType::Set(_) => "set",
            WireType::Map(_, _) => "map",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::List(element) => write!(f, "list<{element}>"),
            WireType::Set(element) => write!(f, "set<{element}>"),
            WireType::Map(key, value) => write!(f, "map<{key}, {value}>"),
            other => f.write_str(other.short_name()),
        }
    }
}

impl FromStr for WireType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Some(inner) = generic_args(&s, "list") {
            return Ok(WireType::list(inner.parse()?));
        }
        if let Some(inner) = generic_args(&s, "set") {
            return Ok(WireType::set(inner.parse()?));
        }
        if let Some(inner) = generic_args(&s, "map") {
            let (key, value) = split_top_level_comma(inner)
                .ok_or_else(|| format!("map type needs key and value: {s}"))?;
            return Ok(WireType::map(key.parse()?, value.parse()?));
        }
        let scalar = match s.as_str() {
            "ascii" => WireType::Ascii,
            "bigint" => WireType::Bigint,
            "blob" => WireType::Blob,
            "boolean" => WireType::Boolean,
            "counter" => WireType::Counter,
            "decimal" => WireType::Decimal,
            "double" => WireType::Double,
            "float" => WireType::Float,
            "inet" => WireType::Inet,
            "int" => WireType::Int,
            "text" => WireType::Text,
            "timestamp" => WireType::Timestamp,
            "uuid" => WireType::Uuid,
            "varchar" => WireType::Varchar,
            "varint" => WireType::Varint,
            "timeuuid" => WireType::Timeuuid,
            _ => return Err(format!("unknown wire type: {s}")),
        };
        Ok(scalar)
    }
}

impl TryFrom<String> for WireType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WireType> for String {
    fn from(value: WireType) -> Self {
        value.to_string()
    }
}

fn generic_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('<')?
        .strip_suffix('>')
}

fn split_top_level_comma(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in s.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&s[..idx], &s[idx + 1..])),
            _ => {}
        }
    }
    None
}

/// A native value headed to or coming from one column.
///
/// `Set` and `Map` compare without regard to element order. `Counter` is what
/// a read returns; writes to a counter column carry a `CounterDelta`.
#[derive(Debug, Clone)]
pub enum ColumnValue {
    Null,
    Ascii(String),
    Bigint(i64),
    Blob(Vec<u8>),
    Boolean(bool),
    Counter(i64),
    CounterDelta(i64),
    Double(f64),
    Float(f32),
    Int(i32),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Timeuuid(Uuid),
    Varint(BigInt),
    List(Vec<ColumnValue>),
    Set(Vec<ColumnValue>),
    Map(Vec<(ColumnValue, ColumnValue)>),
}

impl ColumnValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Ascii(_) => "ascii",
            ColumnValue::Bigint(_) => "bigint",
            ColumnValue::Blob(_) => "blob",
            ColumnValue::Boolean(_) => "boolean",
            ColumnValue::Counter(_) => "counter",
            ColumnValue::CounterDelta(_) => "counter delta",
            ColumnValue::Double(_) => "double",
            ColumnValue::Float(_) => "float",
            ColumnValue::Int(_) => "int",
            ColumnValue::Text(_) => "text",
            ColumnValue::Timestamp(_) => "timestamp",
            ColumnValue::Uuid(_) => "uuid",
            ColumnValue::Timeuuid(_) => "timeuuid",
            ColumnValue::Varint(_) => "varint",
            ColumnValue::List(_) => "list",
            ColumnValue::Set(_) => "set",
            ColumnValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Blob columns take raw bytes; hex text has to be decoded before it
    /// reaches the codec.
    pub fn blob_from_hex(hex_str: &str) -> Result<Self, EncodeError> {
        let trimmed = hex_str
            .strip_prefix("0x")
            .or_else(|| hex_str.strip_prefix("0X"))
            .unwrap_or(hex_str);
        hex::decode(trimmed)
            .map(ColumnValue::Blob)
            .map_err(|err| EncodeError::InvalidHex(err.to_string()))
    }
}

impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        use ColumnValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Ascii(a), Ascii(b)) | (Text(a), Text(b)) => a == b,
            (Bigint(a), Bigint(b)) | (Counter(a), Counter(b)) => a == b,
            (CounterDelta(a), CounterDelta(b)) => a == b,
            (Blob(a), Blob(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Uuid(a), Uuid(b)) | (Timeuuid(a), Timeuuid(b)) => a == b,
            (Varint(a), Varint(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Set(a), Set(b)) => same_elements(a, b),
            (Map(a), Map(b)) => same_elements(a, b),
            _ => false,
        }
    }
}

/// Order-insensitive comparison that still counts repeats.
fn same_elements<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    let count = |items: &[T], x: &T| items.iter().filter(|y| *y == x).count();
    a.len() == b.len() && a.iter().all(|x| count(a, x) == count(b, x))
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("null"),
            ColumnValue::Ascii(v) | ColumnValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            ColumnValue::Bigint(v) | ColumnValue::Counter(v) => write!(f, "{v}"),
            ColumnValue::CounterDelta(v) => write!(f, "{v:+}"),
            ColumnValue::Blob(v) => write!(f, "0x{}", hex::encode(v)),
            ColumnValue::Boolean(v) => write!(f, "{v}"),
            ColumnValue::Double(v) => write!(f, "{v}"),
            ColumnValue::Float(v) => write!(f, "{v}"),
            ColumnValue::Int(v) => write!(f, "{v}"),
            ColumnValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            ColumnValue::Uuid(v) | ColumnValue::Timeuuid(v) => write!(f, "{v}"),
            ColumnValue::Varint(v) => write!(f, "{v}"),
            ColumnValue::List(items) => write_seq(f, "[", items, "]"),
            ColumnValue::Set(items) => write_seq(f, "{", items, "}"),
            ColumnValue::Map(entries) => {
                f.write_str("{")?;
                for (idx, (k, v)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[ColumnValue],
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        ColumnValue::Int(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Bigint(value)
    }
}

impl From<f32> for ColumnValue {
    fn from(value: f32) -> Self {
        ColumnValue::Float(value)
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Double(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Boolean(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(value: Vec<u8>) -> Self {
        ColumnValue::Blob(value)
    }
}

impl From<DateTime<Utc>> for ColumnValue {
    fn from(value: DateTime<Utc>) -> Self {
        ColumnValue::Timestamp(value)
    }
}

impl From<Uuid> for ColumnValue {
    fn from(value: Uuid) -> Self {
        ColumnValue::Uuid(value)
    }
}

impl From<BigInt> for ColumnValue {
    fn from(value: BigInt) -> Self {
        ColumnValue::Varint(value)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// Name and type of one result column, taken from the response metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub wire_type: WireType,
}

/// One result row. Null columns are present and hold `ColumnValue::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, ColumnValue>,
}

impl Row {
    pub fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ColumnValue) -> Option<ColumnValue> {
        self.columns.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns.get(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnValue)> {
        self.columns.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, ColumnValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, ColumnValue); N]> for Row {
    fn from(entries: [(K, ColumnValue); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Rows in the order the node returned them. Empty is a valid result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Database node address. Fixed for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in endpoint: {s}"))?;
                Ok(Endpoint::new(host, port))
            }
            Some(_) => Err(format!("missing host in endpoint: {s}")),
            None if !s.is_empty() => Ok(Endpoint::new(s, DEFAULT_PORT)),
            None => Err("empty endpoint".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_types_parse_nested_collections() {
        assert_eq!("int".parse::<WireType>(), Ok(WireType::Int));
        assert_eq!(
            "list<int>".parse::<WireType>(),
            Ok(WireType::list(WireType::Int))
        );
        assert_eq!(
            "map<int, text>".parse::<WireType>(),
            Ok(WireType::map(WireType::Int, WireType::Text))
        );
        assert_eq!(
            "map<text, list<int>>".parse::<WireType>(),
            Ok(WireType::map(WireType::Text, WireType::list(WireType::Int)))
        );
        assert!("tuple<int>".parse::<WireType>().is_err());
        assert!("map<int>".parse::<WireType>().is_err());
    }

    #[test]
    fn wire_type_display_matches_parse() {
        let ty = WireType::map(WireType::Int, WireType::set(WireType::Varchar));
        assert_eq!(ty.to_string(), "map<int, set<varchar>>");
        assert_eq!(ty.to_string().parse::<WireType>(), Ok(ty));
    }

    #[test]
    fn sets_and_maps_compare_unordered() {
        let a = ColumnValue::Set(vec![1.into(), 2.into(), 3.into()]);
        let b = ColumnValue::Set(vec![3.into(), 1.into(), 2.into()]);
        assert_eq!(a, b);

        let m1 = ColumnValue::Map(vec![(1.into(), "whats".into()), (2.into(), "up".into())]);
        let m2 = ColumnValue::Map(vec![(2.into(), "up".into()), (1.into(), "whats".into())]);
        assert_eq!(m1, m2);

        let l1 = ColumnValue::List(vec![1.into(), 2.into()]);
        let l2 = ColumnValue::List(vec![2.into(), 1.into()]);
        assert_ne!(l1, l2);
    }

    #[test]
    fn unordered_comparison_counts_repeats() {
        let a = ColumnValue::Set(vec![1.into(), 1.into(), 2.into()]);
        let b = ColumnValue::Set(vec![1.into(), 2.into(), 2.into()]);
        assert_ne!(a, b);
        assert_eq!(a, ColumnValue::Set(vec![2.into(), 1.into(), 1.into()]));

        let m1 = ColumnValue::Map(vec![(1.into(), "a".into()), (1.into(), "a".into())]);
        let m2 = ColumnValue::Map(vec![(1.into(), "a".into()), (2.into(), "b".into())]);
        assert_ne!(m1, m2);
        assert_ne!(m2, m1);
    }

    #[test]
    fn values_of_different_kinds_never_compare_equal() {
        assert_ne!(ColumnValue::Int(1), ColumnValue::Bigint(1));
        assert_ne!(ColumnValue::Ascii("a".into()), ColumnValue::Text("a".into()));
        assert_ne!(ColumnValue::Counter(1), ColumnValue::CounterDelta(1));
    }

    #[test]
    fn blob_from_hex_decodes_bytes() {
        assert_eq!(
            ColumnValue::blob_from_hex("6d796b657931"),
            Ok(ColumnValue::Blob(b"mykey1".to_vec()))
        );
        assert_eq!(
            ColumnValue::blob_from_hex("0x00ff"),
            Ok(ColumnValue::Blob(vec![0x00, 0xff]))
        );
        assert!(matches!(
            ColumnValue::blob_from_hex("zz"),
            Err(EncodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn endpoint_parses_host_and_port() {
        assert_eq!(
            "127.0.0.1:9042".parse::<Endpoint>(),
            Ok(Endpoint::new("127.0.0.1", 9042))
        );
        assert_eq!("db".parse::<Endpoint>(), Ok(Endpoint::new("db", DEFAULT_PORT)));
        assert!("db:port".parse::<Endpoint>().is_err());
        assert!(":9042".parse::<Endpoint>().is_err());
    }

    #[test]
    fn row_builds_from_pairs() {
        let row = Row::from([("int_type", ColumnValue::Int(5))]);
        assert_eq!(row.get("int_type"), Some(&ColumnValue::Int(5)));
        assert_eq!(row.len(), 1);
    }
}
