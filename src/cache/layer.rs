//! Cache layer that orchestrates cache lookups with remote fetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

use super::key::RequestKey;
use super::result::CacheResult;
use super::storage::RecordCache;
use crate::error::{Result, StoreError};
use crate::fields::{Params, RecordId};
use crate::gateway::RemoteGateway;
use crate::model::Model;
use crate::record::Record;

type SharedFetch = Shared<BoxFuture<'static, Result<Vec<Record>>>>;

/// Whether a lookup may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
  /// Serve cached records when any match, otherwise fetch
  CacheFirst,
  /// Always fetch
  RemoteOnly,
}

/// Sits between the store facade and the gateway.
///
/// Remote results are merged into the [`RecordCache`] before they are
/// handed out. Identical requests that overlap in time share one gateway
/// call and one merge.
pub struct CacheLayer {
  cache: Arc<RecordCache>,
  gateway: Arc<dyn RemoteGateway>,
  in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl CacheLayer {
  pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
    Self {
      cache: Arc::new(RecordCache::new()),
      gateway,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn cache(&self) -> &RecordCache {
    &self.cache
  }

  pub fn gateway(&self) -> Arc<dyn RemoteGateway> {
    Arc::clone(&self.gateway)
  }

  /// Fetch the records of `model` matching `params`.
  ///
  /// With [`FetchPolicy::CacheFirst`] any cached match is returned as is.
  /// Otherwise the gateway is asked and the fresh batch is returned.
  pub async fn fetch_list(
    &self,
    model: &Arc<Model>,
    params: &Params,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Vec<Record>>> {
    if policy == FetchPolicy::CacheFirst {
      let cached = self.cache.find_matching(model.name(), params);
      if !cached.is_empty() {
        debug!(
          model = model.name(),
          count = cached.len(),
          "cache hit for list"
        );
        return Ok(CacheResult::from_cache(cached));
      }
    }

    self.fetch_remote(model, params).await
  }

  /// Fetch a single record by identity: the first record of the fetched
  /// batch, or `None` when the server returned nothing.
  pub async fn fetch_one(
    &self,
    model: &Arc<Model>,
    id: &RecordId,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Option<Record>>> {
    if policy == FetchPolicy::CacheFirst {
      if let Some(record) = self.cache.find_by_id(model.name(), id) {
        debug!(model = model.name(), %id, "cache hit for record");
        return Ok(CacheResult::from_cache(Some(record)));
      }
    }

    let result = self.fetch_remote(model, &id.to_params()).await?;
    Ok(result.map(|batch| batch.into_iter().next()))
  }

  fn in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
    self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
  }

  async fn fetch_remote(
    &self,
    model: &Arc<Model>,
    params: &Params,
  ) -> Result<CacheResult<Vec<Record>>> {
    let key = RequestKey::new(model.name(), params);
    let hash = key.cache_hash();

    let (fetch, joined) = {
      let mut in_flight = self.in_flight();
      match in_flight.get(&hash) {
        Some(fetch) => (fetch.clone(), true),
        None => {
          debug!(request = %key.description(), "cache miss, fetching");
          let fetch = self.start_fetch(model, params, hash.clone());
          in_flight.insert(hash, fetch.clone());
          (fetch, false)
        }
      }
    };

    let batch = fetch.await?;
    Ok(if joined {
      CacheResult::joined(batch)
    } else {
      CacheResult::from_network(batch)
    })
  }

  /// Issue the gateway call and run fetch + merge on its own task.
  ///
  /// The task finishes and clears its in-flight entry even when every caller
  /// waiting on it has been dropped.
  fn start_fetch(&self, model: &Arc<Model>, params: &Params, hash: String) -> SharedFetch {
    let request = self.gateway.fetch_all(model.name(), params);
    let model = Arc::clone(model);
    let cache = Arc::clone(&self.cache);
    let gateway = Arc::clone(&self.gateway);
    let in_flight = Arc::clone(&self.in_flight);

    let task = tokio::spawn(async move {
      let result = match request.await {
        Ok(payloads) => {
          let batch = payloads
            .iter()
            .map(|payload| Record::from_payload(&model, payload, Arc::clone(&gateway)))
            .collect();
          let outcome = cache.merge(model.name(), batch);
          debug!(
            model = model.name(),
            fetched = outcome.batch.len(),
            replaced = outcome.replaced,
            retained = outcome.retained,
            "merged fetched batch"
          );
          Ok(outcome.batch)
        }
        Err(e) => {
          error!(model = model.name(), error = %e, "fetch failed");
          Err(e)
        }
      };

      in_flight
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&hash);
      result
    });

    async move {
      task
        .await
        .unwrap_or_else(|e| Err(StoreError::Transport(format!("fetch task failed: {}", e))))
    }
    .boxed()
    .shared()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::fields::Fields;
  use crate::gateway::testing::{Call, ScriptedGateway};
  use crate::model::ModelRegistry;
  use serde_json::json;
  use std::time::Duration;

  fn setup() -> (CacheLayer, ScriptedGateway, Arc<Model>) {
    let gateway = ScriptedGateway::new();
    let layer = CacheLayer::new(Arc::new(gateway.clone()));
    let model = ModelRegistry::new()
      .define("event", Fields::new().with("name", ""))
      .unwrap();
    (layer, gateway, model)
  }

  fn list(items: serde_json::Value) -> serde_json::Value {
    json!({"code": 0, "msg": "success", "data": items})
  }

  #[tokio::test]
  async fn test_cache_first_hits_without_request() {
    let (layer, gateway, model) = setup();
    gateway.respond(list(json!([{"id": "1", "name": "shopee"}])));

    let first = layer
      .fetch_one(&model, &RecordId::from("1"), FetchPolicy::CacheFirst)
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(gateway.call_count(), 1);

    let second = layer
      .fetch_one(&model, &RecordId::from("1"), FetchPolicy::CacheFirst)
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(gateway.call_count(), 1);
    assert!(second.data.unwrap().ptr_eq(&first.data.unwrap()));

    let by_params = layer
      .fetch_list(
        &model,
        &Fields::new().with("name", "shopee"),
        FetchPolicy::CacheFirst,
      )
      .await
      .unwrap();
    assert_eq!(by_params.source, CacheSource::Cache);
    assert_eq!(by_params.data.len(), 1);
    assert_eq!(gateway.call_count(), 1);
  }

  #[tokio::test]
  async fn test_remote_only_always_requests() {
    let (layer, gateway, model) = setup();
    gateway
      .respond(list(json!([{"id": "1"}])))
      .respond(list(json!([{"id": "1", "name": "again"}])));

    for _ in 0..2 {
      layer
        .fetch_one(&model, &RecordId::from("1"), FetchPolicy::RemoteOnly)
        .await
        .unwrap();
    }

    assert_eq!(gateway.call_count(), 2);
    assert_eq!(
      gateway.calls()[1],
      Call::FetchAll {
        model: "event".into(),
        params: RecordId::from("1").to_params(),
      }
    );
    let cached = layer.cache().records("event");
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].get("name"), Some(json!("again")));
  }

  #[tokio::test]
  async fn test_empty_batch_yields_none() {
    let (layer, gateway, model) = setup();
    gateway.respond(list(json!([])));

    let result = layer
      .fetch_one(&model, &RecordId::from("404"), FetchPolicy::CacheFirst)
      .await
      .unwrap();

    assert!(result.data.is_none());
    assert!(layer.cache().records("event").is_empty());
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_cache_untouched() {
    let (layer, gateway, model) = setup();
    gateway
      .respond(list(json!([{"id": "1"}])))
      .respond(json!({"code": 1, "msg": "server busy"}))
      .fail(StoreError::Transport("connection refused".into()));
    layer
      .fetch_list(&model, &Params::new(), FetchPolicy::RemoteOnly)
      .await
      .unwrap();

    let err = layer
      .fetch_list(&model, &Params::new(), FetchPolicy::RemoteOnly)
      .await
      .unwrap_err();
    assert_eq!(
      err,
      StoreError::Remote {
        code: 1,
        msg: "server busy".into()
      }
    );

    let err = layer
      .fetch_list(&model, &Params::new(), FetchPolicy::RemoteOnly)
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));

    assert_eq!(layer.cache().len("event"), 1);
  }

  #[tokio::test]
  async fn test_overlapping_requests_share_one_call() {
    let (layer, gateway, model) = setup();
    gateway
      .delay(Duration::from_millis(20))
      .respond(list(json!([{"id": "7", "name": "once"}])));
    let params = Fields::new().with("name", "once");

    let (a, b) = tokio::join!(
      layer.fetch_list(&model, &params, FetchPolicy::RemoteOnly),
      layer.fetch_list(&model, &params, FetchPolicy::RemoteOnly),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(gateway.call_count(), 1);
    assert_eq!(a.source, CacheSource::Network);
    assert_eq!(b.source, CacheSource::Joined);
    assert!(a.data[0].ptr_eq(&b.data[0]));
    assert_eq!(layer.cache().len("event"), 1);
  }

  #[tokio::test]
  async fn test_finished_request_is_not_reused() {
    let (layer, gateway, model) = setup();
    gateway
      .respond(list(json!([{"id": "1"}])))
      .respond(list(json!([{"id": "1"}])));

    layer
      .fetch_list(&model, &Params::new(), FetchPolicy::RemoteOnly)
      .await
      .unwrap();
    let second = layer
      .fetch_list(&model, &Params::new(), FetchPolicy::RemoteOnly)
      .await
      .unwrap();

    assert_eq!(second.source, CacheSource::Network);
    assert_eq!(gateway.call_count(), 2);
  }

  #[tokio::test]
  async fn test_abandoned_request_still_completes() {
    let (layer, gateway, model) = setup();
    gateway
      .delay(Duration::from_millis(50))
      .respond(list(json!([{"id": "1", "name": "old"}])))
      .respond(list(json!([{"id": "1", "name": "new"}])));
    let params = RecordId::from("1").to_params();

    let abandoned = tokio::time::timeout(
      Duration::from_millis(5),
      layer.fetch_list(&model, &params, FetchPolicy::RemoteOnly),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(layer.in_flight().is_empty());
    assert_eq!(
      layer.cache().records("event")[0].get("name"),
      Some(json!("old"))
    );

    let fresh = layer
      .fetch_list(&model, &params, FetchPolicy::RemoteOnly)
      .await
      .unwrap();

    assert_eq!(fresh.source, CacheSource::Network);
    assert_eq!(gateway.call_count(), 2);
    assert_eq!(fresh.data[0].get("name"), Some(json!("new")));
  }
}
