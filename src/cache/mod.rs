//! Record caching for remote resources.
//!
//! This module keeps fetched records in memory and decides when a lookup can
//! be answered locally:
//! - One ordered, identity-deduplicated sequence of records per model
//! - Fetched batches are upserted by identity, unrelated entries survive
//! - Cache-first and always-remote lookups, single record or filtered list
//! - Overlapping identical requests share one network call

mod key;
mod layer;
mod result;
mod storage;

pub use key::RequestKey;
pub use layer::{CacheLayer, FetchPolicy};
pub use result::{CacheResult, CacheSource};
pub use storage::{MergeOutcome, RecordCache};
