//! Error type shared by every store operation.

use thiserror::Error;

/// Failures surfaced by the store, its records and the remote gateway.
///
/// The type is `Clone` so one failed in-flight request can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  /// A model with this name is already registered.
  #[error("model '{model}' has been defined and can not be edited")]
  AlreadyDefined { model: String },

  /// No model with this name has been registered.
  #[error("model '{model}' is not defined")]
  UnknownModel { model: String },

  /// Attempted write to a field that is fixed once the record exists.
  #[error("field '{field}' is immutable")]
  ImmutableField { field: String },

  /// The server answered with a non-zero envelope code.
  #[error("remote error (code {code}): {msg}")]
  Remote { code: i64, msg: String },

  /// The request never produced a usable response.
  #[error("transport error: {0}")]
  Transport(String),

  /// The response body could not be decoded.
  #[error("decode error: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for StoreError {
  fn from(err: reqwest::Error) -> Self {
    StoreError::Transport(err.to_string())
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(err: serde_json::Error) -> Self {
    StoreError::Decode(err.to_string())
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_carries_message() {
    let err = StoreError::Remote {
      code: 7,
      msg: "record missing".into(),
    };
    assert_eq!(err.to_string(), "remote error (code 7): record missing");
  }

  #[test]
  fn test_json_error_is_decode() {
    let err: StoreError = serde_json::from_str::<serde_json::Value>("<html>")
      .unwrap_err()
      .into();
    assert!(matches!(err, StoreError::Decode(_)));
  }
}
