//! Client-side record store.
//!
//! Remote, server-owned resources are presented as locally cached, editable
//! records. Lookups are answered from the cache when possible, fetched
//! batches are merged into the cache by identity, and local edits can be
//! rolled back or saved to the server.

pub mod cache;
pub mod config;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use fields::{Fields, Params, RecordId};
pub use gateway::{Envelope, HttpGateway, PersistMethod, RemoteGateway};
pub use model::Model;
pub use record::Record;
pub use store::Store;
