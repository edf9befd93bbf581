use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use num_bigint::BigInt;
use quill_client::{
    classify, ClientConfig, ColumnValue, Connection, ConsistencyLevel, Parameters,
    ResultSet, RetryPolicy, TypedValue, WireType,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Run one CQL statement against a node and print the rows", long_about = None)]
struct Args {
    /// TOML client config. Flags below override its values.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    keyspace: Option<String>,
    /// ANY, ONE, TWO, THREE, QUORUM, ALL, LOCAL_QUORUM, EACH_QUORUM,
    /// SERIAL, LOCAL_SERIAL or LOCAL_ONE.
    #[arg(long)]
    consistency: Option<ConsistencyLevel>,
    /// Bound parameter as name:type=value, e.g. `key:int=42`. Repeatable.
    #[arg(long = "param", value_name = "NAME:TYPE=VALUE")]
    params: Vec<String>,
    /// Statement text with `:name` placeholders.
    query: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_config(&args)?;
    let consistency = args.consistency.unwrap_or(config.default_consistency);
    let mut params = Parameters::new();
    for raw in &args.params {
        let (name, typed) = parse_param(raw).with_context(|| format!("bad --param {raw}"))?;
        params.insert(name, typed);
    }

    let policy = config.retry_policy();
    let result = run_with_retry(&config, &policy, &args.query, &params, consistency).await?;
    print_rows(&result);
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_path(path)?,
        None => ClientConfig::from_toml("[endpoint]\nhost = \"127.0.0.1\"\n")?,
    };
    if let Some(host) = &args.host {
        config.endpoint.host = host.clone();
    }
    if let Some(port) = args.port {
        config.endpoint.port = port;
    }
    if let Some(keyspace) = &args.keyspace {
        config.keyspace = keyspace.clone();
    }
    Ok(config)
}

async fn run_with_retry(
    config: &ClientConfig,
    policy: &RetryPolicy,
    query: &str,
    params: &Parameters,
    consistency: ConsistencyLevel,
) -> anyhow::Result<ResultSet> {
    let mut connection = Connection::from_config(config);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = match config.request_timeout() {
            Some(timeout) => {
                connection
                    .execute_with_timeout(query, params, consistency, timeout)
                    .await
            }
            None => connection.execute(query, params, consistency).await,
        };
        let err = match outcome {
            Ok(rows) => {
                connection.close();
                return Ok(rows);
            }
            Err(err) => err,
        };
        let Some(delay) = policy.next_backoff(&err, attempts) else {
            connection.close();
            return Err(anyhow::anyhow!(
                "{} failed ({}): {err}",
                config.endpoint,
                classify(&err)
            ));
        };
        warn!(attempt = attempts, ?delay, "retrying after {err}");
        tokio::time::sleep(delay).await;
        if connection.is_closed() {
            info!("reconnecting to {}", config.endpoint);
            connection = Connection::from_config(config);
        }
    }
}

fn parse_param(raw: &str) -> anyhow::Result<(String, TypedValue)> {
    let (head, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected name:type=value"))?;
    let (name, type_name) = head
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected name:type before '='"))?;
    let wire_type: WireType = type_name.parse().map_err(|err: String| anyhow::anyhow!(err))?;
    let value = parse_value(&wire_type, value)?;
    Ok((name.trim().to_string(), TypedValue { wire_type, value }))
}

fn parse_value(wire_type: &WireType, raw: &str) -> anyhow::Result<ColumnValue> {
    if raw == "null" {
        return Ok(ColumnValue::Null);
    }
    let value = match wire_type {
        WireType::Ascii => ColumnValue::Ascii(raw.to_string()),
        WireType::Text | WireType::Varchar => ColumnValue::Text(raw.to_string()),
        WireType::Int => ColumnValue::Int(raw.parse()?),
        WireType::Bigint => ColumnValue::Bigint(raw.parse()?),
        WireType::Counter => ColumnValue::CounterDelta(raw.parse()?),
        WireType::Varint => ColumnValue::Varint(raw.parse::<BigInt>()?),
        WireType::Float => ColumnValue::Float(raw.parse()?),
        WireType::Double => ColumnValue::Double(raw.parse()?),
        WireType::Boolean => ColumnValue::Boolean(raw.parse()?),
        WireType::Blob => ColumnValue::blob_from_hex(raw)?,
        WireType::Timestamp => ColumnValue::Timestamp(parse_timestamp(raw)?),
        WireType::Uuid => ColumnValue::Uuid(Uuid::parse_str(raw)?),
        WireType::Timeuuid => ColumnValue::Timeuuid(Uuid::parse_str(raw)?),
        other => {
            return Err(anyhow::anyhow!(
                "{other} parameters are not supported on the command line"
            ))
        }
    };
    Ok(value)
}

/// Milliseconds since the epoch, or RFC 3339.
fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| anyhow::anyhow!("timestamp {millis} out of range"));
    }
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn print_rows(result: &ResultSet) {
    if result.is_empty() {
        println!("(no rows)");
        return;
    }
    for row in result.iter() {
        let cells: Vec<String> = row
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("{}", cells.join(", "));
    }
    println!("({} rows)", result.len());
}
