//! Model templates: the fixed default field shape of each resource type.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::fields::Fields;

/// Immutable default field set for one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
  name: String,
  defaults: Fields,
}

impl Model {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn defaults(&self) -> &Fields {
    &self.defaults
  }

  /// Shape caller- or server-supplied fields: missing fields come from the
  /// defaults, supplied fields win.
  pub fn shape(&self, fields: &Fields) -> Fields {
    fields.overlay(&self.defaults)
  }
}

/// Registry of defined models. Definitions can be added but never replaced
/// or removed.
#[derive(Debug, Default)]
pub struct ModelRegistry {
  models: RwLock<HashMap<String, Arc<Model>>>,
}

impl ModelRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register the defaults for `name`.
  pub fn define(&self, name: &str, defaults: Fields) -> Result<Arc<Model>> {
    let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());

    if models.contains_key(name) {
      return Err(StoreError::AlreadyDefined {
        model: name.to_string(),
      });
    }

    let model = Arc::new(Model {
      name: name.to_string(),
      defaults,
    });
    models.insert(name.to_string(), Arc::clone(&model));
    info!(model = name, fields = model.defaults.len(), "model defined");

    Ok(model)
  }

  pub fn get(&self, name: &str) -> Option<Arc<Model>> {
    self
      .models
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .get(name)
      .cloned()
  }

  /// Like [`get`](Self::get) but failing for undefined models.
  pub fn require(&self, name: &str) -> Result<Arc<Model>> {
    self.get(name).ok_or_else(|| StoreError::UnknownModel {
      model: name.to_string(),
    })
  }

  pub fn contains(&self, name: &str) -> bool {
    self
      .models
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .contains_key(name)
  }
}
