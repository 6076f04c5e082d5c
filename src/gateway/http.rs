//! HTTP implementation of the gateway contract.

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Envelope, PersistMethod, RemoteGateway};
use crate::config::RemoteConfig;
use crate::error::{Result, StoreError};
use crate::fields::{Fields, Params};

/// Gateway speaking the `{code, msg, data}` JSON envelope protocol.
#[derive(Clone)]
pub struct HttpGateway {
  client: reqwest::Client,
  base_url: String,
  list_path: String,
  record_path: String,
  token: Option<String>,
}

impl HttpGateway {
  pub fn new(config: &RemoteConfig) -> Result<Self> {
    Url::parse(&config.base_url)
      .map_err(|e| StoreError::Transport(format!("invalid base url {}: {}", config.base_url, e)))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      list_path: config.list_path.clone(),
      record_path: config.record_path.clone(),
      token: None,
    })
  }

  /// Send `Authorization: Bearer <token>` with every request.
  pub fn with_token(mut self, token: Option<String>) -> Self {
    self.token = token;
    self
  }

  fn endpoint(&self, path: &str, model: &str) -> Result<Url> {
    let path = path.replace("{model}", model);
    let raw = format!("{}{}", self.base_url, path);
    Url::parse(&raw).map_err(|e| StoreError::Transport(format!("invalid endpoint {}: {}", raw, e)))
  }

  /// List endpoint with every parameter appended to the query string.
  pub fn list_url(&self, model: &str, params: &Params) -> Result<Url> {
    let mut url = self.endpoint(&self.list_path, model)?;
    if !params.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in params.iter() {
        pairs.append_pair(name, &query_value(value));
      }
    }
    Ok(url)
  }

  pub fn record_url(&self, model: &str) -> Result<Url> {
    self.endpoint(&self.record_path, model)
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }
}

/// Render a parameter the way it appears in a query string: strings bare,
/// everything else as JSON text.
fn query_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Read the response body as an envelope.
async fn read_envelope(response: reqwest::Response) -> Result<Envelope> {
  let status = response.status();
  let bytes = response.bytes().await?;
  decode_envelope(status, &bytes)
}

/// Classify a response by status and body.
///
/// A non-success status is a transport failure unless the body is an
/// envelope carrying its own non-zero code, which is kept so the server's
/// message reaches the caller. A success status with a body that is not an
/// envelope is a decode failure.
fn decode_envelope(status: StatusCode, bytes: &[u8]) -> Result<Envelope> {
  match serde_json::from_slice::<Envelope>(bytes) {
    Ok(envelope) if status.is_success() || !envelope.is_ok() => Ok(envelope),
    Ok(envelope) if envelope.msg.is_empty() => {
      Err(StoreError::Transport(format!("HTTP {}", status)))
    }
    Ok(envelope) => Err(StoreError::Transport(format!(
      "HTTP {}: {}",
      status, envelope.msg
    ))),
    Err(_) if !status.is_success() => Err(StoreError::Transport(format!("HTTP {}", status))),
    Err(e) => Err(StoreError::Decode(e.to_string())),
  }
}

impl RemoteGateway for HttpGateway {
  fn fetch_all(&self, model: &str, params: &Params) -> BoxFuture<'static, Result<Vec<Fields>>> {
    let url = self.list_url(model, params);
    let request = url.map(|url| {
      debug!(%url, "GET");
      self.authorize(self.client.get(url))
    });

    async move {
      let response = request?.send().await?;
      read_envelope(response).await?.into_checked()?.into_payloads()
    }
    .boxed()
  }

  fn persist(
    &self,
    model: &str,
    method: PersistMethod,
    body: &Fields,
  ) -> BoxFuture<'static, Result<Envelope>> {
    let request = self.record_url(model).and_then(|url| {
      let payload = serde_json::to_vec(body)?;
      debug!(%url, %method, "persist");
      Ok(
        self
          .authorize(self.client.request(method.http_method(), url))
          .header(CONTENT_TYPE, "application/json")
          .body(payload),
      )
    });

    async move {
      let response = request?.send().await?;
      read_envelope(response).await?.into_checked()
    }
    .boxed()
  }
}
