use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fields::Fields;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub log: LogConfig,
  /// Models to define at startup: name -> default fields
  #[serde(default)]
  pub models: BTreeMap<String, Fields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Server root, e.g. "http://www.ifeng.com"
  pub base_url: String,
  /// Path of the list endpoint; `{model}` is replaced with the model name
  #[serde(default = "default_list_path")]
  pub list_path: String,
  /// Path of the single-record endpoint; `{model}` is replaced with the model name
  #[serde(default = "default_record_path")]
  pub record_path: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_list_path() -> String {
  "/recordList".to_string()
}

fn default_record_path() -> String {
  "/record".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

impl RemoteConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      list_path: default_list_path(),
      record_path: default_record_path(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive; RUST_LOG takes precedence
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

impl Config {
  /// Configuration for a server root with every other setting defaulted.
  pub fn for_url(base_url: impl Into<String>) -> Self {
    Self {
      remote: RemoteConfig::new(base_url),
      log: LogConfig::default(),
      models: BTreeMap::new(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./recstore.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/recstore/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    match Self::locate(explicit_path)? {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/recstore/config.yaml \
         or pass --url."
      )),
    }
  }

  /// Find the config file to use, if any.
  pub fn locate(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit_path {
      return if p.exists() {
        Ok(Some(p.to_path_buf()))
      } else {
        Err(eyre!("Config file not found: {}", p.display()))
      };
    }
    Ok(Self::find_config_file())
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("recstore.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("recstore").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  pub fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Optional bearer token for the remote API, from RECSTORE_API_TOKEN.
  pub fn api_token() -> Option<String> {
    std::env::var("RECSTORE_API_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("remote:\n  base_url: http://localhost:8080\n").unwrap();

    assert_eq!(config.remote.base_url, "http://localhost:8080");
    assert_eq!(config.remote.list_path, "/recordList");
    assert_eq!(config.remote.record_path, "/record");
    assert_eq!(config.remote.timeout_secs, 30);
    assert_eq!(config.log.level, "info");
    assert!(config.log.file.is_none());
    assert!(config.models.is_empty());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
remote:
  base_url: https://api.example.com
  list_path: /{model}/list
  record_path: /{model}
  timeout_secs: 5
log:
  level: debug
  file: /tmp/recstore.log
models:
  event:
    name: ""
    creator: {}
    create_time: 0
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.remote.list_path, "/{model}/list");
    assert_eq!(config.remote.timeout_secs, 5);
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.log.file, Some(PathBuf::from("/tmp/recstore.log")));

    let event = &config.models["event"];
    assert_eq!(event.len(), 3);
    assert_eq!(event.get("create_time"), Some(&serde_json::json!(0)));
  }

  #[test]
  fn test_missing_base_url_fails() {
    assert!(Config::from_yaml("log:\n  level: warn\n").is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "remote:\n  base_url: http://127.0.0.1:9000").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.remote.base_url, "http://127.0.0.1:9000");
  }

  #[test]
  fn test_explicit_path_must_exist() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
