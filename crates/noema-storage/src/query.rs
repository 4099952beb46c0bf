use noema_core::errors::StorageError;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::{Map, Number, Value};

/// Executes a parameterized SQL statement, binding named parameters
/// (`:name`) from the `bind_vars` JSON object, and returns each row as a
/// JSON object keyed by column name. This is the concrete form the
/// "AQL-like query language with bind variables" boundary (§6) takes for
/// an embedded SQLite backend: callers build query text themselves rather
/// than a higher-level traversal language parsing it.
pub fn run_named_query(conn: &Connection, text: &str, bind_vars: &Value) -> Result<Vec<Value>, StorageError> {
    let mut stmt = conn.prepare(text).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let bindings: Vec<(String, SqlValue)> = match bind_vars {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (format!(":{k}"), json_to_sql(v)))
            .collect(),
        Value::Null => Vec::new(),
        _ => {
            return Err(StorageError::SchemaMismatch(
                "bind_vars must be a JSON object".to_string(),
            ))
        }
    };
    let params: Vec<(&str, &dyn rusqlite::ToSql)> = bindings
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn rusqlite::ToSql))
        .collect();

    let mut rows = stmt
        .query(params.as_slice())
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })? {
        let mut obj = Map::new();
        for (idx, name) in column_names.iter().enumerate() {
            let value_ref = row.get_ref(idx).map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?;
            obj.insert(name.clone(), sql_ref_to_json(value_ref));
        }
        out.push(Value::Object(obj));
    }
    Ok(out)
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(_) => Value::Null,
    }
}
