//! Elohim Things - thing and channel registry for Elohim nodes
//!
//! Owns two kinds of ownership-scoped entities and the relation between them:
//!
//! - **Things**: addressable endpoints, each holding a unique secret key
//! - **Channels**: topics that things publish and subscribe on
//! - **Connections**: which things may use which channels
//!
//! ## Architecture
//!
//! | Component | Where |
//! |-----------|-------|
//! | Entity store | `db::things`, `db::channels`, `db::entity` |
//! | Connection manager | `db::connections` |
//! | Access verifier | `db::access` |
//! | Query engine | `db::entity` (paging, name and metadata filters) |
//!
//! The `services` layer on top validates input, draws transaction
//! boundaries and emits events. It is what an API front end should call.
//!
//! ## Ownership
//!
//! Callers present an already-authenticated owner. Reads and writes of an
//! entity the caller does not own fail exactly like reads and writes of an
//! entity that does not exist.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/elohim-things/
//! ├── things.db      # SQLite database (WAL)
//! └── config.toml    # Configuration
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod validation;

// Re-exports
pub use config::Config;
pub use db::{Channel, Metadata, OwnerContext, Page, PageQuery, Thing, ThingsDb};
pub use error::{ErrorKind, ThingsError};
pub use services::Services;
