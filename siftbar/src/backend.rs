//! RediSearch-backed [`QueryService`].
//!
//! The core never depends on this module; it is the crate's reference
//! collaborator for hosts whose entities are indexed as JSON documents.
//! Expressions compile to RediSearch query syntax: text equality hits TAG
//! fields, substring matches hit TEXT fields with `*...*` wildcards, and
//! numeric comparisons use range syntax. Date predicates compile against a
//! `<path>_ts` numeric mirror field holding epoch seconds, covering the
//! whole day on either bound.
//!
//! TAG and TEXT values are escaped differently because RediSearch treats
//! `-` as NOT in TAG queries but as a tokenizer in TEXT fields.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use redis::{Value as RedisValue, aio::ConnectionManager, cmd, from_redis_value};
use serde_json::Value as JsonValue;

use crate::errors::QueryError;
use crate::expr::{Clause, CompareOp, FilterExpression, Predicate, Value};
use crate::service::{QueryService, Row, SearchOptions};

const DEFAULT_ROWS: u64 = 25;
const DATE_MIRROR_SUFFIX: &str = "_ts";

/// Query service executing FT.SEARCH over a connection manager, with one
/// index bound per entity kind.
#[derive(Clone)]
pub struct RediSearchService {
    conn: ConnectionManager,
    indexes: HashMap<String, String>,
}

impl RediSearchService {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            indexes: HashMap::new(),
        }
    }

    /// Connect from a Redis URL.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    /// Bind an entity kind to its search index.
    pub fn with_index(mut self, entity: impl Into<String>, index: impl Into<String>) -> Self {
        self.indexes.insert(entity.into(), index.into());
        self
    }
}

#[async_trait]
impl QueryService for RediSearchService {
    async fn search(
        &self,
        entity: &str,
        filter: &FilterExpression,
        projection: &[&str],
        options: SearchOptions,
    ) -> Result<Vec<Row>, QueryError> {
        let index = self.indexes.get(entity).ok_or_else(|| QueryError::UnknownEntity {
            entity: entity.to_string(),
        })?;

        let mut command = cmd("FT.SEARCH");
        command.arg(index.as_str());
        command.arg(compile_query(filter));
        if let Some((field, order)) = &options.order {
            command.arg("SORTBY").arg(field.as_str()).arg(order.as_str());
        }
        command.arg("LIMIT").arg(0u64).arg(options.limit.unwrap_or(DEFAULT_ROWS));
        command.arg("RETURN").arg(1).arg("$");
        command.arg("DIALECT").arg(3);

        let mut conn = self.conn.clone();
        let raw: RedisValue = command.query_async(&mut conn).await?;
        parse_rows(&raw, projection)
    }
}

/// Compile an expression to a RediSearch query string. The empty expression
/// compiles to `*`: no restriction, never zero results.
pub fn compile_query(filter: &FilterExpression) -> String {
    if filter.is_empty() {
        return "*".to_string();
    }
    let clauses: Vec<String> = filter.clauses().iter().map(clause_query).collect();
    clauses.join(" ")
}

fn clause_query(clause: &Clause) -> String {
    match clause {
        Clause::One(predicate) => predicate_query(predicate),
        Clause::Any(predicates) => {
            let parts: Vec<String> = predicates.iter().map(predicate_query).collect();
            format!("({})", parts.join("|"))
        }
    }
}

fn predicate_query(predicate: &Predicate) -> String {
    let field = &predicate.path;
    match (predicate.op, &predicate.value) {
        (CompareOp::Eq, Value::Text(v)) => format!("(@{}:{{{}}})", field, escape_tag(v)),
        (CompareOp::Eq, Value::Bool(v)) => format!("(@{}:{{{}}})", field, v),
        (CompareOp::Eq, Value::Int(v)) => numeric_range(field, Bound::Inclusive(*v as f64), Bound::Inclusive(*v as f64)),
        (CompareOp::Eq, Value::Number(v)) => numeric_range(field, Bound::Inclusive(*v), Bound::Inclusive(*v)),
        (CompareOp::Eq, Value::Date(d)) => {
            numeric_range(&mirror(field), Bound::Inclusive(day_start(*d)), Bound::Exclusive(next_day_start(*d)))
        }
        (CompareOp::Ne, _) => {
            let inner = predicate_query(&Predicate::new(field.clone(), CompareOp::Eq, predicate.value.clone()));
            format!("(-{})", inner)
        }
        (CompareOp::Gt, Value::Date(d)) => numeric_range(&mirror(field), Bound::Inclusive(next_day_start(*d)), Bound::Open),
        (CompareOp::Ge, Value::Date(d)) => numeric_range(&mirror(field), Bound::Inclusive(day_start(*d)), Bound::Open),
        (CompareOp::Lt, Value::Date(d)) => numeric_range(&mirror(field), Bound::Open, Bound::Exclusive(day_start(*d))),
        (CompareOp::Le, Value::Date(d)) => numeric_range(&mirror(field), Bound::Open, Bound::Exclusive(next_day_start(*d))),
        (CompareOp::Gt, value) => numeric_range(field, Bound::Exclusive(numeric(value)), Bound::Open),
        (CompareOp::Ge, value) => numeric_range(field, Bound::Inclusive(numeric(value)), Bound::Open),
        (CompareOp::Lt, value) => numeric_range(field, Bound::Open, Bound::Exclusive(numeric(value))),
        (CompareOp::Le, value) => numeric_range(field, Bound::Open, Bound::Inclusive(numeric(value))),
        (CompareOp::ContainsCi, value) => {
            let needle = match value {
                Value::Text(v) => v.clone(),
                other => other.to_string(),
            };
            format!("(@{}:*{}*)", field, escape_text(&needle))
        }
        (CompareOp::In, Value::IntList(ids)) => {
            if ids.is_empty() {
                // An empty membership set matches nothing.
                return numeric_range(field, Bound::Inclusive(-1.0), Bound::Inclusive(-1.0));
            }
            let parts: Vec<String> = ids
                .iter()
                .map(|id| numeric_range(field, Bound::Inclusive(*id as f64), Bound::Inclusive(*id as f64)))
                .collect();
            format!("({})", parts.join("|"))
        }
        (CompareOp::In, value) => {
            predicate_query(&Predicate::new(field.clone(), CompareOp::Eq, value.clone()))
        }
        (CompareOp::Eq, Value::IntList(_)) => {
            unreachable!("list values are only ever paired with CompareOp::In")
        }
    }
}

enum Bound {
    Open,
    Inclusive(f64),
    Exclusive(f64),
}

fn numeric_range(field: &str, min: Bound, max: Bound) -> String {
    let min_s = match min {
        Bound::Open => "-inf".to_string(),
        Bound::Inclusive(v) => format_numeric(v),
        Bound::Exclusive(v) => format!("({}", format_numeric(v)),
    };
    let max_s = match max {
        Bound::Open => "+inf".to_string(),
        Bound::Inclusive(v) => format_numeric(v),
        Bound::Exclusive(v) => format!("({}", format_numeric(v)),
    };
    format!("(@{}:[{} {}])", field, min_s, max_s)
}

fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Number(v) => *v,
        Value::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        Value::Text(v) => v.parse::<f64>().unwrap_or(f64::NAN),
        Value::Date(_) | Value::IntList(_) => f64::NAN,
    }
}

fn mirror(field: &str) -> String {
    format!("{}{}", field, DATE_MIRROR_SUFFIX)
}

fn day_start(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

fn next_day_start(date: NaiveDate) -> f64 {
    match date.succ_opt() {
        Some(next) => day_start(next),
        None => f64::INFINITY,
    }
}

/// Escape a value for TAG queries. `-` is the NOT operator and `.` the JSON
/// path separator, so both must be escaped alongside the TAG delimiters.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '$' | '{' | '}' | '\\' | '|' | '.' | '-' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escape a value for TEXT infix queries; the caller supplies wildcards.
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '(' | ')' | '|' | '\'' | '"' | '[' | ']' | '{' | '}' | ':' | '@' | '?' | '~' | '&' | '!' | '.'
            | '*' | '%' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn parse_rows(raw: &RedisValue, projection: &[&str]) -> Result<Vec<Row>, QueryError> {
    let values: Vec<RedisValue> = from_redis_value(raw).map_err(|err| QueryError::Decode {
        message: format!("unexpected search reply: {}", err),
    })?;

    // Reply shape: [total, key1, doc1, key2, doc2, ...]
    let mut rows = Vec::new();
    let mut idx = 1;
    while idx + 1 < values.len() {
        let payload = document_payload(&values[idx + 1])?;
        rows.push(decode_row(&payload, projection)?);
        idx += 2;
    }
    Ok(rows)
}

fn document_payload(value: &RedisValue) -> Result<String, QueryError> {
    match value {
        RedisValue::Array(items) => {
            for chunk in items.chunks(2) {
                if chunk.len() != 2 {
                    continue;
                }
                let alias: String = from_redis_value(&chunk[0]).map_err(|err| QueryError::Decode {
                    message: format!("invalid field alias in search hit: {}", err),
                })?;
                if alias == "$" {
                    return scalar_string(&chunk[1]);
                }
            }
            Err(QueryError::Decode {
                message: "search hit missing JSON payload".to_string(),
            })
        }
        other => scalar_string(other),
    }
}

fn scalar_string(value: &RedisValue) -> Result<String, QueryError> {
    match value {
        RedisValue::BulkString(bytes) => String::from_utf8(bytes.clone()).map_err(|err| QueryError::Decode {
            message: format!("invalid UTF-8 in search hit: {}", err),
        }),
        RedisValue::SimpleString(status) => Ok(status.clone()),
        RedisValue::VerbatimString { text, .. } => Ok(text.clone()),
        other => from_redis_value::<String>(other).map_err(|err| QueryError::Decode {
            message: format!("unexpected search value type: {}", err),
        }),
    }
}

fn decode_row(payload: &str, projection: &[&str]) -> Result<Row, QueryError> {
    let mut value: JsonValue = serde_json::from_str(payload).map_err(|err| QueryError::Decode {
        message: format!("search hit is not valid JSON: {}", err),
    })?;

    // DIALECT 3 wraps each document in a one-element array.
    if let JsonValue::Array(items) = value {
        value = items.into_iter().next().unwrap_or(JsonValue::Null);
    }
    let JsonValue::Object(mut map) = value else {
        return Err(QueryError::Decode {
            message: "search hit is not a JSON object".to_string(),
        });
    };
    if !projection.is_empty() {
        map.retain(|key, _| projection.contains(&key.as_str()));
    }
    Ok(map)
}
