//! # sekai-master - Master data restoration and synchronization
//!
//! Game servers ship their static master data in compressed layouts: records
//! as positional arrays described by a schema, and some tables stored column
//! by column with enumerated values. This crate turns those back into
//! ordinary JSON records and keeps a versioned copy on disk.
//!
//! ## Components
//!
//! - [`SchemaRegistry`] and [`SchemaNode`]: positional layouts per table,
//!   loaded once from the bundled `structures.json`
//! - [`MasterDataDecoder`]: restores positional and columnar tables and
//!   merges append-only tables by identity
//! - [`VersionStore`] and [`DatasetStore`]: the persisted version record and
//!   one file per table
//! - [`MasterSyncPipeline`]: per-region update check driving download,
//!   decode, persistence and asset notification
//! - [`AssetNotifier`], [`GitPublisher`], [`AppHashUpdater`]: collaborators
//!   invoked around a sync
//!
//! ## Example
//!
//! ```rust
//! use sekai_master::{MasterDataDecoder, SchemaRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = SchemaRegistry::from_json(
//!     r#"{"cards": ["id", "seq", {"list": "children", "fields": ["a", "b"]}]}"#,
//! )
//! .unwrap();
//! let decoder = MasterDataDecoder::new(Arc::new(schema));
//!
//! let raw = json!({"cards": [[1, 2, [[3, 4]]]]});
//! let tables = decoder.restore_dataset(raw.as_object().unwrap().clone()).unwrap();
//! assert_eq!(tables["cards"], json!([{"id": 1, "seq": 2, "children": [{"a": 3, "b": 4}]}]));
//! ```

pub mod apphash;
pub mod decode;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod publish;
pub mod schema;
pub mod store;
pub mod version;

pub use apphash::{AppHashSource, AppHashUpdater, AppInfo};
pub use decode::{MasterDataDecoder, merge_by_identity, restore_compact_table, restore_record};
pub use error::{DecodeError, MasterError, Result};
pub use notify::{AssetNotifier, AssetUpdaterTarget, DEFAULT_CONFLICT_DELAY};
pub use pipeline::{MasterSource, MasterSyncPipeline};
pub use publish::{DatasetPublisher, GitIdentity, GitPublisher, PublishOutcome, authenticated_url};
pub use schema::{SchemaNode, SchemaRegistry};
pub use store::DatasetStore;
pub use version::{CURRENT_VERSION_FILE, VersionRecord, VersionStore, compare_version};
