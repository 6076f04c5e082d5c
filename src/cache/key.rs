//! Stable keys for remote requests.

use sha2::{Digest, Sha256};

use crate::fields::Params;

/// Identifies one remote list request: a model plus its filter parameters.
#[derive(Clone, Debug)]
pub struct RequestKey<'a> {
  pub model: &'a str,
  pub params: &'a Params,
}

impl<'a> RequestKey<'a> {
  pub fn new(model: &'a str, params: &'a Params) -> Self {
    Self { model, params }
  }

  /// Fixed-length hash; equal for equal model and parameters regardless of
  /// the order parameters were inserted in.
  pub fn cache_hash(&self) -> String {
    let params = serde_json::to_string(self.params).unwrap_or_default();
    let input = format!("{}:{}", self.model, params);

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    if self.params.is_empty() {
      format!("all {}", self.model)
    } else {
      let filters: Vec<String> = self
        .params
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
      format!("{} where {}", self.model, filters.join(", "))
    }
  }
}
