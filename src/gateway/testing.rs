//! Scripted in-memory gateway for tests.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Envelope, PersistMethod, RemoteGateway};
use crate::error::{Result, StoreError};
use crate::fields::{Fields, Params};

/// A request the gateway received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  FetchAll {
    model: String,
    params: Params,
  },
  Persist {
    model: String,
    method: PersistMethod,
    body: Fields,
  },
}

#[derive(Default)]
struct Script {
  calls: Vec<Call>,
  responses: VecDeque<Result<Value>>,
  delay: Option<Duration>,
}

/// Replays queued response bodies in order and records every call.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
  script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a raw JSON response body.
  pub fn respond(&self, body: Value) -> &Self {
    self.lock().responses.push_back(Ok(body));
    self
  }

  /// Queue a failure that happens before any body is read.
  pub fn fail(&self, err: StoreError) -> &Self {
    self.lock().responses.push_back(Err(err));
    self
  }

  /// Hold every response back for `delay`.
  pub fn delay(&self, delay: Duration) -> &Self {
    self.lock().delay = Some(delay);
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.lock().calls.clone()
  }

  pub fn call_count(&self) -> usize {
    self.lock().calls.len()
  }

  pub fn reset_calls(&self) {
    self.lock().calls.clear();
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
    self.script.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn next(&self, call: Call) -> (Result<Value>, Option<Duration>) {
    let mut script = self.lock();
    script.calls.push(call);
    let response = script
      .responses
      .pop_front()
      .unwrap_or_else(|| Err(StoreError::Transport("no scripted response".into())));
    (response, script.delay)
  }
}

async fn settle(body: Result<Value>, delay: Option<Duration>) -> Result<Envelope> {
  if let Some(delay) = delay {
    tokio::time::sleep(delay).await;
  }
  let envelope: Envelope = serde_json::from_value(body?)?;
  envelope.into_checked()
}

impl RemoteGateway for ScriptedGateway {
  fn fetch_all(&self, model: &str, params: &Params) -> BoxFuture<'static, Result<Vec<Fields>>> {
    let (body, delay) = self.next(Call::FetchAll {
      model: model.to_string(),
      params: params.clone(),
    });
    async move { settle(body, delay).await?.into_payloads() }.boxed()
  }

  fn persist(
    &self,
    model: &str,
    method: PersistMethod,
    body: &Fields,
  ) -> BoxFuture<'static, Result<Envelope>> {
    let (response, delay) = self.next(Call::Persist {
      model: model.to_string(),
      method,
      body: body.clone(),
    });
    settle(response, delay).boxed()
  }
}
