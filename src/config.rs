use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com/";

/// Environment variable that overrides `catalog.base_url`.
pub const BASE_URL_ENV: &str = "PRODCAT_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub catalog: CatalogConfig,
  pub cache: CacheConfig,
  pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  /// Checked by [`parse_base_url`] whenever a config is loaded
  pub base_url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout_secs: 15,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long an entry nobody subscribes to is kept before eviction
  pub keep_unused_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      keep_unused_secs: 60,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
  /// Products per page in the product list
  pub page_size: u32,
}

impl Default for UiConfig {
  fn default() -> Self {
    Self { page_size: 10 }
  }
}

/// Parse and check a catalog base URL.
pub fn parse_base_url(raw: &str) -> Result<Url> {
  let url = Url::parse(raw.trim()).map_err(|e| eyre!("Invalid base URL {:?}: {}", raw, e))?;
  if !matches!(url.scheme(), "http" | "https") {
    return Err(eyre!("Base URL must be http or https, got {:?}", raw));
  }
  Ok(url)
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub base_url: Option<String>,
  pub page_size: Option<u32>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./prodcat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/prodcat/config.yaml
  ///
  /// Without a file every setting has its default.
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
    let local = PathBuf::from("prodcat.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("prodcat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    parse_base_url(&self.catalog.base_url)?;
    if self.ui.page_size == 0 {
      return Err(eyre!("ui.page_size must be at least 1"));
    }
    Ok(())
  }

  /// Apply `PRODCAT_BASE_URL`, then command-line overrides.
  pub fn with_overrides(self, env_base_url: Option<String>, overrides: &Overrides) -> Result<Self> {
    let mut config = self;
    if let Some(raw) = env_base_url.filter(|raw| !raw.trim().is_empty()) {
      config.catalog.base_url = raw;
    }
    if let Some(raw) = &overrides.base_url {
      config.catalog.base_url = raw.clone();
    }
    if let Some(page_size) = overrides.page_size {
      config.ui.page_size = page_size;
    }
    config.validate()?;
    Ok(config)
  }

  pub fn base_url(&self) -> Result<Url> {
    parse_base_url(&self.catalog.base_url)
  }

  /// The catalog host, for display.
  pub fn host(&self) -> String {
    self
      .base_url()
      .ok()
      .and_then(|url| url.host_str().map(String::from))
      .unwrap_or_else(|| "catalog".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.catalog.base_url, DEFAULT_BASE_URL);
    assert!(config.base_url().is_ok());
    assert_eq!(config.catalog.timeout_secs, 15);
    assert_eq!(config.cache.keep_unused_secs, 60);
    assert_eq!(config.ui.page_size, 10);
    assert_eq!(config.host(), "dummyjson.com");
  }

  #[test]
  fn test_load_partial_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
      file,
      "catalog:\n  base_url: http://localhost:8080/api/\ncache:\n  keep_unused_secs: 5"
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.catalog.base_url, "http://localhost:8080/api/");
    assert_eq!(config.catalog.timeout_secs, 15);
    assert_eq!(config.cache.keep_unused_secs, 5);
    assert_eq!(config.ui.page_size, 10);
  }

  #[test]
  fn test_empty_file_is_defaults() {
    let file = NamedTempFile::new().unwrap();
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.ui.page_size, 10);
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_invalid_values_are_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "catalog:\n  base_url: not a url").unwrap();
    assert!(Config::load(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "ui:\n  page_size: 0").unwrap();
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
  }

  #[test]
  fn test_overrides_take_precedence() {
    let overrides = Overrides {
      base_url: Some("https://catalog.internal/".into()),
      page_size: Some(25),
    };
    let config = Config::default()
      .with_overrides(Some("https://from-env.example/".into()), &overrides)
      .unwrap();
    assert_eq!(config.catalog.base_url, "https://catalog.internal/");
    assert_eq!(config.ui.page_size, 25);

    let config = Config::default()
      .with_overrides(Some("https://from-env.example/".into()), &Overrides::default())
      .unwrap();
    assert_eq!(config.host(), "from-env.example");
  }

  #[test]
  fn test_override_validation() {
    let bad_scheme = Overrides {
      base_url: Some("ftp://files.example/".into()),
      page_size: None,
    };
    assert!(Config::default().with_overrides(None, &bad_scheme).is_err());

    let zero_page = Overrides {
      base_url: None,
      page_size: Some(0),
    };
    assert!(Config::default().with_overrides(None, &zero_page).is_err());
  }
}
