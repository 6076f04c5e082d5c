//! Field maps, record identities and query parameters.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, StoreError};

/// Name of the write-once identity field.
pub const ID_FIELD: &str = "id";

/// Mapping from field name to JSON value.
///
/// This is the shape of model defaults, record data and raw server payloads.
/// Keys iterate in sorted order, which keeps serialized bodies and request
/// keys stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

/// Filter parameters for list queries, compared field-by-field.
pub type Params = Fields;

impl Fields {
  pub fn new() -> Self {
    Self(Map::new())
  }

  /// Builder-style insert.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.0.insert(name.into(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.0.get(name)
  }

  /// Deserialize one field into a caller type.
  pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
    self
      .0
      .get(name)
      .map(|v| serde_json::from_value(v.clone()).map_err(StoreError::from))
      .transpose()
  }

  /// Deserialize the whole map into a caller type.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.0.insert(name.into(), value.into())
  }

  pub fn remove(&mut self, name: &str) -> Option<Value> {
    self.0.remove(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  /// Copy of `defaults` with every field of `self` laid over it.
  pub fn overlay(&self, defaults: &Fields) -> Fields {
    let mut merged = defaults.clone();
    for (name, value) in &self.0 {
      merged.0.insert(name.clone(), value.clone());
    }
    merged
  }

  /// True when every parameter is present here with an equal value.
  /// The identity field compares as a [`RecordId`], so `1` matches `"1"`.
  pub fn matches(&self, params: &Params) -> bool {
    params.iter().all(|(name, value)| match self.0.get(name) {
      Some(own) if name == ID_FIELD => {
        match (RecordId::from_value(own), RecordId::from_value(value)) {
          (Some(own_id), Some(param_id)) => own_id == param_id,
          _ => own == value,
        }
      }
      own => own == Some(value),
    })
  }

  /// Identity carried by the `id` field, if any.
  pub fn id(&self) -> Option<RecordId> {
    self.0.get(ID_FIELD).and_then(RecordId::from_value)
  }
}

impl TryFrom<Value> for Fields {
  type Error = StoreError;

  fn try_from(value: Value) -> Result<Self> {
    match value {
      Value::Object(map) => Ok(Self(map)),
      other => Err(StoreError::Decode(format!(
        "expected a JSON object, got {}",
        other
      ))),
    }
  }
}

impl From<Map<String, Value>> for Fields {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// Identity of a record within its model.
///
/// Servers may send ids as strings or numbers; both normalize to the same
/// textual identity so `"1"` and `1` address one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::String(s) => Some(Self(s.clone())),
      Value::Number(n) => Some(Self(n.to_string())),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Parameters selecting exactly this identity.
  pub fn to_params(&self) -> Params {
    Params::new().with(ID_FIELD, self.0.clone())
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RecordId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

impl From<String> for RecordId {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl From<u64> for RecordId {
  fn from(n: u64) -> Self {
    Self(n.to_string())
  }
}
