//! Metadata containment
//!
//! A filter matches when every key of the filter is present in the document
//! with an equal value. Extra keys in the document are ignored. The same
//! comparison is registered as the SQL function `metadata_contains(doc, filter)`
//! so filtering, counting and pagination stay in one statement.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde_json::Value;

use super::models::Metadata;

/// Structural subset check of `filter` against `doc`
pub fn contains(doc: &Metadata, filter: &Metadata) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

fn contains_json(doc: &Value, filter: &Value) -> bool {
    match (doc, filter) {
        (Value::Object(doc), Value::Object(filter)) => contains(doc, filter),
        _ => false,
    }
}

/// Register `metadata_contains` on a connection.
///
/// A NULL document never matches. A filter that is not a JSON object is an
/// error rather than a silent miss.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "metadata_contains",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let doc: Option<Value> = ctx.get(0)?;
            let filter: Value = ctx.get(1)?;
            if !filter.is_object() {
                return Err(rusqlite::Error::UserFunctionError(
                    "metadata filter must be a JSON object".into(),
                ));
            }
            Ok(doc.map(|doc| contains_json(&doc, &filter)).unwrap_or(false))
        },
    )
}
