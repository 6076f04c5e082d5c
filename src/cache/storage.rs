//! In-memory record cache and the merge that folds fetched batches into it.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::warn;

use crate::fields::{Params, RecordId};
use crate::record::Record;

/// Outcome of merging one fetched batch.
#[derive(Debug)]
pub struct MergeOutcome {
  /// The batch as cached, in payload order
  pub batch: Vec<Record>,
  /// Previously cached records dropped in favor of a fresh copy
  pub replaced: usize,
  /// Previously cached records kept because the batch did not mention them
  pub retained: usize,
}

/// Per-model ordered sequences of records, at most one per identity.
///
/// A sequence is only ever replaced as a whole, under one write lock, so
/// readers never see a half-merged state.
#[derive(Debug, Default)]
pub struct RecordCache {
  records: RwLock<HashMap<String, Vec<Record>>>,
}

impl RecordCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Record>>> {
    self.records.read().unwrap_or_else(|e| e.into_inner())
  }

  /// Cached record of `model` with identity `id`.
  pub fn find_by_id(&self, model: &str, id: &RecordId) -> Option<Record> {
    self
      .read()
      .get(model)?
      .iter()
      .find(|record| record.id() == Some(id))
      .cloned()
  }

  /// Cached records of `model` whose data equals every parameter.
  pub fn find_matching(&self, model: &str, params: &Params) -> Vec<Record> {
    self
      .read()
      .get(model)
      .map(|records| {
        records
          .iter()
          .filter(|record| record.data().matches(params))
          .cloned()
          .collect()
      })
      .unwrap_or_default()
  }

  /// Current sequence for `model`; empty when nothing is cached.
  pub fn records(&self, model: &str) -> Vec<Record> {
    self.read().get(model).cloned().unwrap_or_default()
  }

  pub fn contains_model(&self, model: &str) -> bool {
    self.read().contains_key(model)
  }

  pub fn len(&self, model: &str) -> usize {
    self.read().get(model).map_or(0, Vec::len)
  }

  /// Upsert `batch` by identity.
  ///
  /// The new sequence is the batch followed by every cached record whose
  /// identity the batch does not carry. Cached copies of re-fetched
  /// identities are dropped whole, never field-merged. A repeated identity
  /// inside the batch keeps its first occurrence.
  pub fn merge(&self, model: &str, batch: Vec<Record>) -> MergeOutcome {
    let mut seen: HashSet<RecordId> = HashSet::new();
    let batch: Vec<Record> = batch
      .into_iter()
      .filter(|record| match record.id() {
        Some(id) if !seen.insert(id.clone()) => {
          warn!(model, %id, "duplicate identity in fetched batch, keeping first");
          false
        }
        _ => true,
      })
      .collect();

    let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
    let previous = records.remove(model).unwrap_or_default();

    let mut merged = batch.clone();
    let mut replaced = 0;
    for record in previous {
      match record.id() {
        Some(id) if seen.contains(id) => replaced += 1,
        _ => merged.push(record),
      }
    }
    let retained = merged.len() - batch.len();
    records.insert(model.to_string(), merged);

    MergeOutcome {
      batch,
      replaced,
      retained,
    }
  }

  /// Drop every cached sequence.
  pub fn clear(&self) {
    self
      .records
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .clear();
  }
}
