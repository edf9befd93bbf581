//! Round trips every column type through a real node. Needs
//! `CASSANDRA_ENDPOINT=host:port`; run with `cargo test -- --ignored`.

use chrono::Utc;
use num_bigint::BigInt;
use quill_client::{
    ClientError, ColumnValue, Connection, ConsistencyLevel, EncodeError, Endpoint, Parameters,
    Query, Row, TypedValue, WireType,
};
use quill_codec::truncate_to_millis;
use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

const KEYSPACE: &str = "test_marshalling";

struct Case {
    wire_type: WireType,
    insert: ColumnValue,
    expected: ColumnValue,
    supported: bool,
}

fn cases() -> Vec<Case> {
    let now = Utc::now();
    let uuid1 = Uuid::now_v1(&[1, 2, 3, 4, 5, 6]);
    let text = ColumnValue::Text("(づ｡◕‿‿◕｡)づ".into());
    let case = |wire_type: &str, insert: ColumnValue, expected: ColumnValue| Case {
        wire_type: wire_type.parse().expect("wire type"),
        insert,
        expected,
        supported: true,
    };
    vec![
        case(
            "ascii",
            ColumnValue::Ascii("abcdefg".into()),
            ColumnValue::Ascii("abcdefg".into()),
        ),
        case(
            "bigint",
            ColumnValue::Bigint(9223372036854775805),
            ColumnValue::Bigint(9223372036854775805),
        ),
        case(
            "blob",
            ColumnValue::blob_from_hex("6d796b657931").expect("hex"),
            ColumnValue::Blob(b"mykey1".to_vec()),
        ),
        case("boolean", ColumnValue::Boolean(true), ColumnValue::Boolean(true)),
        case("counter", ColumnValue::CounterDelta(1), ColumnValue::Counter(1)),
        Case {
            supported: false,
            ..case("decimal", ColumnValue::Double(1.513623), ColumnValue::Double(1.513623))
        },
        case(
            "double",
            ColumnValue::Double(1.513623614),
            ColumnValue::Double(1.513623614),
        ),
        case(
            "float",
            ColumnValue::Float(136.36460918),
            ColumnValue::Float(136.36460918),
        ),
        Case {
            supported: false,
            ..case(
                "inet",
                ColumnValue::Text("152.12.14.1".into()),
                ColumnValue::Text("152.12.14.1".into()),
            )
        },
        case("int", ColumnValue::Int(5), ColumnValue::Int(5)),
        case(
            "list<int>",
            ints(&[1, 1, 2, 2, 3, 3, 4, 4], ColumnValue::List),
            ints(&[1, 1, 2, 2, 3, 3, 4, 4], ColumnValue::List),
        ),
        case(
            "map<int, text>",
            whats_up(),
            whats_up(),
        ),
        case(
            "set<int>",
            ints(&[1, 2, 3, 4], ColumnValue::Set),
            ints(&[4, 3, 2, 1], ColumnValue::Set),
        ),
        case("text", text.clone(), text.clone()),
        case(
            "timestamp",
            ColumnValue::Timestamp(now),
            ColumnValue::Timestamp(truncate_to_millis(now)),
        ),
        case("uuid", ColumnValue::Uuid(uuid1), ColumnValue::Uuid(uuid1)),
        case("timeuuid", ColumnValue::Timeuuid(uuid1), ColumnValue::Timeuuid(uuid1)),
        case("varchar", text.clone(), text),
        case(
            "varint",
            ColumnValue::Varint(BigInt::from(15984362469i64)),
            ColumnValue::Varint(BigInt::from(15984362469i64)),
        ),
    ]
}

fn ints(values: &[i32], wrap: fn(Vec<ColumnValue>) -> ColumnValue) -> ColumnValue {
    wrap(values.iter().copied().map(ColumnValue::Int).collect())
}

fn whats_up() -> ColumnValue {
    ColumnValue::Map(vec![
        (ColumnValue::Int(1), ColumnValue::Text("whats".into())),
        (ColumnValue::Int(2), ColumnValue::Text("up".into())),
    ])
}

fn endpoint() -> Option<Endpoint> {
    let raw = std::env::var("CASSANDRA_ENDPOINT").ok()?;
    Some(raw.parse().expect("CASSANDRA_ENDPOINT must be host:port"))
}

static NEXT_KEY: AtomicI64 = AtomicI64::new(0);

/// Distinct primary key per call, in milliseconds since the epoch.
fn primary_key() -> i64 {
    Utc::now().timestamp_millis() + NEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

/// Test connection that is closed on drop, so a failed assertion still tears
/// it down.
struct Fixture {
    connection: Connection,
}

impl Deref for Fixture {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.connection.close();
    }
}

async fn set_up(endpoint: &Endpoint) -> Fixture {
    let admin = quill_client::connect(endpoint.clone(), "")
        .await
        .expect("connect without keyspace");
    let ddl = [
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {KEYSPACE} WITH replication = \
             {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
        ),
        format!("CREATE TABLE IF NOT EXISTS {KEYSPACE}.test ({})", test_columns()),
        format!(
            "CREATE TABLE IF NOT EXISTS {KEYSPACE}.test_counter \
             (test_key timestamp PRIMARY KEY, counter_type counter)"
        ),
    ];
    for statement in &ddl {
        admin
            .execute(statement, &Parameters::new(), ConsistencyLevel::All)
            .await
            .expect("schema");
    }
    admin.close();

    let connection = quill_client::connect(endpoint.clone(), KEYSPACE)
        .await
        .expect("connect");
    connection.pause();
    Fixture { connection }
}

fn test_columns() -> String {
    let mut columns = vec!["test_key timestamp PRIMARY KEY".to_string()];
    for case in cases() {
        if case.wire_type != WireType::Counter {
            columns.push(format!("{}_type {}", case.wire_type.short_name(), case.wire_type));
        }
    }
    columns.join(", ")
}

async fn insert(
    connection: &Connection,
    table: &str,
    column: &str,
    wire_type: &WireType,
    value: &ColumnValue,
    key: i64,
) -> Result<(), ClientError> {
    let key_value = TypedValue::new(WireType::Timestamp, timestamp(key));
    let query = if *wire_type == WireType::Counter {
        Query::new(format!(
            "UPDATE {table} SET {column} = {column} + :val WHERE test_key = :key"
        ))
        .bind("val", wire_type.clone(), value.clone())
    } else if matches!(wire_type, WireType::Set(_)) {
        // Sets go in as literals.
        Query::new(format!("INSERT INTO {table} (test_key, {column}) VALUES (:key, :val)"))
            .inline("val", wire_type, value)?
    } else {
        Query::new(format!("INSERT INTO {table} (test_key, {column}) VALUES (:key, :val)"))
            .bind("val", wire_type.clone(), value.clone())
    };
    let query = query
        .bind("key", key_value.wire_type, key_value.value)
        .with_consistency(ConsistencyLevel::All);
    connection.run(query).await.map(|_| ())
}

async fn select(connection: &Connection, table: &str, column: &str, key: i64) -> Vec<Row> {
    let query = Query::new(format!("SELECT {column} FROM {table} WHERE test_key = :key"))
        .bind("key", WireType::Timestamp, timestamp(key))
        .with_consistency(ConsistencyLevel::All);
    connection.run(query).await.expect("select").into_rows()
}

fn timestamp(key: i64) -> ColumnValue {
    use chrono::TimeZone;
    ColumnValue::Timestamp(Utc.timestamp_millis_opt(key).single().expect("key in range"))
}

#[tokio::test]
#[ignore]
async fn every_type_round_trips() {
    let Some(endpoint) = endpoint() else {
        eprintln!("CASSANDRA_ENDPOINT not set; skipping");
        return;
    };
    let connection = set_up(&endpoint).await;
    for case in cases() {
        connection.resume();
        let column = format!("{}_type", case.wire_type.short_name());
        let table = if case.wire_type == WireType::Counter {
            "test_counter"
        } else {
            "test"
        };
        let key = primary_key();
        let outcome = insert(&connection, table, &column, &case.wire_type, &case.insert, key).await;
        if !case.supported {
            assert_eq!(
                outcome,
                Err(ClientError::Encode(EncodeError::Unsupported(case.wire_type.clone()))),
                "{}",
                case.wire_type
            );
            connection.pause();
            continue;
        }
        outcome.unwrap_or_else(|err| panic!("insert {}: {err}", case.wire_type));
        let rows = select(&connection, table, &column, key).await;
        assert_eq!(rows, vec![Row::from([(column.as_str(), case.expected)])], "{}", case.wire_type);
        connection.pause();
    }
}

#[tokio::test]
#[ignore]
async fn null_round_trips() {
    let Some(endpoint) = endpoint() else {
        eprintln!("CASSANDRA_ENDPOINT not set; skipping");
        return;
    };
    let connection = set_up(&endpoint).await;
    connection.resume();
    let key = primary_key();
    insert(&connection, "test", "ascii_type", &WireType::Ascii, &ColumnValue::Null, key)
        .await
        .expect("insert");
    let rows = select(&connection, "test", "ascii_type", key).await;
    assert_eq!(rows, vec![Row::from([("ascii_type", ColumnValue::Null)])]);
    connection.pause();
}
