//! Boundary to the server that owns the records.
//!
//! The store never talks HTTP itself; it hands filter parameters and record
//! bodies to a [`RemoteGateway`] and gets back raw payloads or decoded
//! response envelopes.

mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpGateway;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, StoreError};
use crate::fields::{Fields, Params};

/// How a record is written back to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMethod {
  /// Record unknown to the server (POST)
  Create,
  /// Record previously synced with the server (PUT)
  Update,
  /// Remove the record (DELETE)
  Delete,
}

impl PersistMethod {
  pub fn http_method(self) -> reqwest::Method {
    match self {
      PersistMethod::Create => reqwest::Method::POST,
      PersistMethod::Update => reqwest::Method::PUT,
      PersistMethod::Delete => reqwest::Method::DELETE,
    }
  }
}

impl fmt::Display for PersistMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      PersistMethod::Create => "create",
      PersistMethod::Update => "update",
      PersistMethod::Delete => "delete",
    })
  }
}

/// Response envelope `{code, msg, data}` used by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  pub code: i64,
  #[serde(default)]
  pub msg: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
}

impl Envelope {
  pub fn is_ok(&self) -> bool {
    self.code == 0
  }

  /// Turn a non-zero `code` into [`StoreError::Remote`].
  pub fn into_checked(self) -> Result<Self> {
    if self.is_ok() {
      Ok(self)
    } else {
      Err(StoreError::Remote {
        code: self.code,
        msg: self.msg,
      })
    }
  }

  /// Extract the list payload. A missing or null `data` is an empty batch.
  pub fn into_payloads(self) -> Result<Vec<Fields>> {
    match self.data {
      None | Some(Value::Null) => Ok(Vec::new()),
      Some(Value::Array(items)) => items.into_iter().map(Fields::try_from).collect(),
      Some(other) => Err(StoreError::Decode(format!(
        "expected a list of records, got {}",
        other
      ))),
    }
  }
}

/// Remote side of the store.
///
/// Returned futures own everything they need, so they can be shared between
/// concurrent callers and outlive the borrow of the gateway.
pub trait RemoteGateway: Send + Sync {
  /// Fetch every record of `model` matching `params`.
  fn fetch_all(&self, model: &str, params: &Params) -> BoxFuture<'static, Result<Vec<Fields>>>;

  /// Write `body` to the record endpoint of `model`.
  fn persist(
    &self,
    model: &str,
    method: PersistMethod,
    body: &Fields,
  ) -> BoxFuture<'static, Result<Envelope>>;
}
