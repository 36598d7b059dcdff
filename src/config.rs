use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DenormalizeOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
  /// Default expansion depth for denormalized output
  #[serde(default)]
  pub denormalize: DenormalizeOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL endpoint paths are joined under (e.g. "https://office.move.mil/ghc/v1")
  pub base_url: Option<String>,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Filter directive, e.g. "info" or "movecache=debug"
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Log to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./movecache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/movecache/config.yaml
  ///
  /// With no file found the defaults apply; commands that need the API
  /// fail later on the missing `api.base_url`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("movecache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("movecache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the API bearer token from the environment.
  ///
  /// Reads MOVECACHE_API_TOKEN; requests are sent without a token when unset.
  pub fn get_api_token() -> Option<String> {
    std::env::var("MOVECACHE_API_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_document_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert!(config.api.base_url.is_none());
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert_eq!(config.denormalize.max_depth, None);
  }

  #[test]
  fn test_full_document() {
    let config = Config::from_yaml(
      r#"
api:
  base_url: https://office.example.mil/ghc/v1
  timeout_secs: 5
logging:
  level: movecache=debug
  file: /tmp/movecache.log
denormalize:
  max_depth: 3
"#,
    )
    .unwrap();

    assert_eq!(
      config.api.base_url.as_deref(),
      Some("https://office.example.mil/ghc/v1")
    );
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.logging.level, "movecache=debug");
    assert_eq!(
      config.logging.file.as_deref(),
      Some(Path::new("/tmp/movecache.log"))
    );
    assert_eq!(config.denormalize.max_depth, Some(3));
  }

  #[test]
  fn test_invalid_document() {
    assert!(Config::from_yaml("api: 42").is_err());
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/movecache.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
