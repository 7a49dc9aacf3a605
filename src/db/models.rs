//! Entity models and page types

use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form entity metadata. Filtering treats it as a flat key/value map.
pub type Metadata = serde_json::Map<String, Value>;

/// An addressable endpoint, identified by its secret key on the data path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A communication topic that things connect to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Query parameters for paged retrieval
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Exact, case-sensitive name match
    #[serde(default)]
    pub name: Option<String>,
    /// Every pair must be present and equal in the entity's metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

fn default_limit() -> u64 { 10 }

impl Default for PageQuery {
    fn default() -> Self {
        Self { offset: 0, limit: default_limit(), name: None, metadata: None }
    }
}

impl PageQuery {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit, ..Default::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub(crate) fn metadata_filter(&self) -> Option<&Metadata> {
        self.metadata.as_ref().filter(|m| !m.is_empty())
    }
}

/// One window of a filtered, id-ordered result set
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Matches before offset/limit were applied
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(query: &PageQuery) -> Self {
        Self { total: 0, offset: query.offset, limit: query.limit, items: vec![] }
    }
}

/// A table-backed, owner-scoped entity.
///
/// Column order in `COLUMNS` is the order `from_row` reads them in.
pub trait Entity: Sized {
    /// Used in error messages and events
    const KIND: &'static str;
    const TABLE: &'static str;
    /// Column in `connections` that references this entity
    const CONNECTION_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn metadata_from_value(value: Option<Value>) -> Option<Metadata> {
    match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub(crate) fn metadata_to_value(metadata: &Option<Metadata>) -> Option<Value> {
    metadata.as_ref().map(|m| Value::Object(m.clone()))
}

impl Entity for Thing {
    const KIND: &'static str = "thing";
    const TABLE: &'static str = "things";
    const CONNECTION_COLUMN: &'static str = "thing_id";
    const COLUMNS: &'static [&'static str] = &["id", "owner", "key", "name", "metadata"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            key: row.get(2)?,
            name: row.get(3)?,
            metadata: metadata_from_value(row.get(4)?),
        })
    }
}

impl Entity for Channel {
    const KIND: &'static str = "channel";
    const TABLE: &'static str = "channels";
    const CONNECTION_COLUMN: &'static str = "channel_id";
    const COLUMNS: &'static [&'static str] = &["id", "owner", "name", "metadata"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            name: row.get(2)?,
            metadata: metadata_from_value(row.get(3)?),
        })
    }
}
