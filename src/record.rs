//! Records: shared, editable working copies of server resources.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError};
use crate::fields::{Fields, RecordId, ID_FIELD};
use crate::gateway::{Envelope, PersistMethod, RemoteGateway};
use crate::model::Model;

#[derive(Debug, Clone, PartialEq)]
struct RecordState {
  /// Working copy, possibly edited
  data: Fields,
  /// Last state known to the server; `None` until the record is synced
  init_data: Option<Fields>,
  synced_at: Option<DateTime<Utc>>,
}

/// One resource instance.
///
/// `Record` is a handle: clones share the same working copy, so an edit made
/// through a record returned by a query is visible through the cache.
/// The identity is fixed when the record is built and every later attempt to
/// write `id` fails with [`StoreError::ImmutableField`].
#[derive(Clone)]
pub struct Record {
  model: Arc<Model>,
  id: Option<RecordId>,
  state: Arc<RwLock<RecordState>>,
  gateway: Arc<dyn RemoteGateway>,
}

impl Record {
  /// New, never-persisted record: defaults overlaid with `attrs`.
  pub(crate) fn create(model: &Arc<Model>, attrs: &Fields, gateway: Arc<dyn RemoteGateway>) -> Self {
    Self::build(model, model.shape(attrs), None, gateway)
  }

  /// Record mirroring a server payload. The working copy is shaped by the
  /// model defaults; the baseline is the payload exactly as received.
  pub(crate) fn from_payload(
    model: &Arc<Model>,
    payload: &Fields,
    gateway: Arc<dyn RemoteGateway>,
  ) -> Self {
    Self::build(model, model.shape(payload), Some(payload.clone()), gateway)
  }

  fn build(
    model: &Arc<Model>,
    data: Fields,
    init_data: Option<Fields>,
    gateway: Arc<dyn RemoteGateway>,
  ) -> Self {
    let synced_at = init_data.as_ref().map(|_| Utc::now());
    Self {
      model: Arc::clone(model),
      id: data.id(),
      state: Arc::new(RwLock::new(RecordState {
        data,
        init_data,
        synced_at,
      })),
      gateway,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, RecordState> {
    self.state.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, RecordState> {
    self.state.write().unwrap_or_else(|e| e.into_inner())
  }

  pub fn model(&self) -> &str {
    self.model.name()
  }

  pub fn id(&self) -> Option<&RecordId> {
    self.id.as_ref()
  }

  /// Snapshot of the working copy.
  pub fn data(&self) -> Fields {
    self.read().data.clone()
  }

  /// Snapshot of the server baseline, if the record has one.
  pub fn init_data(&self) -> Option<Fields> {
    self.read().init_data.clone()
  }

  pub fn get(&self, field: &str) -> Option<Value> {
    self.read().data.get(field).cloned()
  }

  pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
    self.read().data.get_as(field)
  }

  /// Deserialize the working copy into a caller type.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
    self.read().data.decode()
  }

  /// Assign a field. The identity field is refused.
  pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
    guard_identity(field)?;
    self.write().data.insert(field, value);
    Ok(())
  }

  /// Remove a field. The identity field is refused.
  pub fn unset(&self, field: &str) -> Result<Option<Value>> {
    guard_identity(field)?;
    Ok(self.write().data.remove(field))
  }

  /// No server baseline exists: a save will create the record.
  pub fn is_new(&self) -> bool {
    self.read().init_data.is_none()
  }

  /// The working copy has diverged from the server baseline.
  ///
  /// Fields the model defaults filled in do not count as edits. Records
  /// without a baseline are never dirty.
  pub fn is_dirty(&self) -> bool {
    let state = self.read();
    match &state.init_data {
      Some(baseline) => state.data != *baseline && state.data != self.model.shape(baseline),
      None => false,
    }
  }

  /// When the baseline was last taken from or confirmed by the server.
  pub fn synced_at(&self) -> Option<DateTime<Utc>> {
    self.read().synced_at
  }

  /// Discard unsaved edits by restoring the baseline exactly, without
  /// filling in model defaults.
  ///
  /// Returns `false` and leaves the data alone when there is no baseline.
  pub fn rollback(&self) -> bool {
    let mut state = self.write();
    match state.init_data.clone() {
      Some(baseline) => {
        state.data = baseline;
        true
      }
      None => {
        warn!(model = self.model.name(), "rollback on a record with no server baseline");
        false
      }
    }
  }

  /// Write the working copy to the server: update when a baseline exists,
  /// create otherwise. On success the data sent becomes the new baseline.
  pub async fn save(&self) -> Result<Envelope> {
    let (method, body) = {
      let state = self.read();
      let method = if state.init_data.is_some() {
        PersistMethod::Update
      } else {
        PersistMethod::Create
      };
      (method, state.data.clone())
    };

    let envelope = self.send(method, &body).await?;

    let mut state = self.write();
    state.init_data = Some(body);
    state.synced_at = Some(Utc::now());
    Ok(envelope)
  }

  /// Delete the record on the server. Cache membership is not touched; on
  /// success the baseline is dropped so a later save creates it again.
  pub async fn destroy_record(&self) -> Result<Envelope> {
    let body = self.data();
    let envelope = self.send(PersistMethod::Delete, &body).await?;

    let mut state = self.write();
    state.init_data = None;
    state.synced_at = None;
    Ok(envelope)
  }

  async fn send(&self, method: PersistMethod, body: &Fields) -> Result<Envelope> {
    debug!(model = self.model.name(), id = ?self.id, %method, "persisting record");
    self
      .gateway
      .persist(self.model.name(), method, body)
      .await
      .inspect_err(|e| {
        error!(model = self.model.name(), id = ?self.id, %method, error = %e, "persist failed");
      })
  }

  /// Both handles point at the same record.
  pub fn ptr_eq(&self, other: &Record) -> bool {
    Arc::ptr_eq(&self.state, &other.state)
  }
}

fn guard_identity(field: &str) -> Result<()> {
  if field == ID_FIELD {
    Err(StoreError::ImmutableField {
      field: field.to_string(),
    })
  } else {
    Ok(())
  }
}

impl std::fmt::Debug for Record {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.read();
    f.debug_struct("Record")
      .field("model", &self.model.name())
      .field("id", &self.id)
      .field("data", &state.data)
      .field("init_data", &state.init_data)
      .finish_non_exhaustive()
  }
}
