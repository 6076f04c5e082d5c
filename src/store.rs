//! Store facade: models, record creation and the four lookup modes.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheLayer, FetchPolicy};
use crate::error::Result;
use crate::fields::{Fields, Params, RecordId};
use crate::gateway::RemoteGateway;
use crate::model::{Model, ModelRegistry};
use crate::record::Record;

/// Client-side store of remote records.
///
/// Owns the model registry and the record cache. Cloning a store yields
/// another handle onto the same models and cache.
#[derive(Clone)]
pub struct Store {
  models: Arc<ModelRegistry>,
  layer: Arc<CacheLayer>,
}

impl Store {
  pub fn new(gateway: impl RemoteGateway + 'static) -> Self {
    Self::with_gateway(Arc::new(gateway))
  }

  pub fn with_gateway(gateway: Arc<dyn RemoteGateway>) -> Self {
    Self {
      models: Arc::new(ModelRegistry::new()),
      layer: Arc::new(CacheLayer::new(gateway)),
    }
  }

  /// Register the default field set of `model`. Fails if it already exists.
  pub fn define_model(&self, model: &str, defaults: Fields) -> Result<Arc<Model>> {
    self.models.define(model, defaults)
  }

  pub fn model(&self, model: &str) -> Option<Arc<Model>> {
    self.models.get(model)
  }

  /// Build a new, unsaved record from the model defaults and `attrs`.
  ///
  /// The record is not cached; it only enters the cache through a later
  /// fetch that returns it.
  pub fn create_record(&self, model: &str, attrs: Fields) -> Result<Record> {
    let model = self.models.require(model)?;
    Ok(Record::create(&model, &attrs, self.layer.gateway()))
  }

  /// Records matching every parameter, from the cache when any match,
  /// otherwise fetched and merged.
  pub async fn find(&self, model: &str, params: Params) -> Result<Vec<Record>> {
    let model = self.models.require(model)?;
    let result = self
      .layer
      .fetch_list(&model, &params, FetchPolicy::CacheFirst)
      .await?;
    debug!(model = model.name(), source = ?result.source, "find");
    Ok(result.data)
  }

  /// The record with identity `id`, from the cache when present, otherwise
  /// the first record the server returns for it.
  pub async fn find_record(&self, model: &str, id: impl Into<RecordId>) -> Result<Option<Record>> {
    let model = self.models.require(model)?;
    let id = id.into();
    let result = self
      .layer
      .fetch_one(&model, &id, FetchPolicy::CacheFirst)
      .await?;
    debug!(model = model.name(), %id, source = ?result.source, "find_record");
    Ok(result.data)
  }

  /// Always fetch the records matching `params` and merge them.
  pub async fn query(&self, model: &str, params: Params) -> Result<Vec<Record>> {
    let model = self.models.require(model)?;
    let result = self
      .layer
      .fetch_list(&model, &params, FetchPolicy::RemoteOnly)
      .await?;
    Ok(result.data)
  }

  /// Always fetch the record with identity `id` and merge it.
  pub async fn query_record(&self, model: &str, id: impl Into<RecordId>) -> Result<Option<Record>> {
    let model = self.models.require(model)?;
    let result = self
      .layer
      .fetch_one(&model, &id.into(), FetchPolicy::RemoteOnly)
      .await?;
    Ok(result.data)
  }

  /// Drop every cached record of every model.
  pub fn unload_all(&self) {
    self.layer.cache().clear();
    info!("record cache cleared");
  }

  /// Cached records of `model` in cache order.
  pub fn cached(&self, model: &str) -> Vec<Record> {
    self.layer.cache().records(model)
  }

  /// Whether anything has been cached for `model` since the last unload.
  pub fn is_cached(&self, model: &str) -> bool {
    self.layer.cache().contains_model(model)
  }
}
