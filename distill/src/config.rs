//! Configuration management
//!
//! Default config location: ~/.distill/config.toml

use crate::aggregator::AggregatorConfig;
use crate::search::{PageParams, DEFAULT_PAGE_SIZE};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Maximum collections searched concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_searches: usize,
    /// Per-collection timeout in milliseconds
    #[serde(default = "default_collection_timeout")]
    pub collection_timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_collection_timeout() -> u64 {
    5000
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> usize {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: default_max_concurrent(),
            collection_timeout_ms: default_collection_timeout(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl SearchConfig {
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            max_concurrent_searches: self.max_concurrent_searches,
            collection_timeout_ms: self.collection_timeout_ms,
        }
    }

    /// Page params for a request, falling back to defaults and capped at `max_page_size`
    pub fn page(&self, page: Option<usize>, page_size: Option<usize>) -> PageParams {
        PageParams::new(
            page.unwrap_or(1),
            page_size.unwrap_or(self.default_page_size),
        )
        .clamped(self.max_page_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Directory of collection definition files
    #[serde(default = "default_collections_dir")]
    pub collections_dir: PathBuf,
}

fn default_collections_dir() -> PathBuf {
    default_base_dir().join("collections")
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            collections_dir: default_collections_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info,distill=debug".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinksConfig {
    /// Base URL used when rendering collection and page links
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".distill")
}

impl Config {
    /// Default config file (~/.distill/config.toml)
    pub fn default_path() -> PathBuf {
        default_base_dir().join("config.toml")
    }

    /// Load config from a file that must exist
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .map_err(|e| anyhow!("Cannot read {}: {}", config_path.display(), e))?;
        let mut config: Config = toml::from_str(&content)?;
        config.expand_paths()?;
        Ok(config)
    }

    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            let mut config = Config::default();
            // Try to save default config
            let _ = config.save(config_path);
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.registry.collections_dir = expand_tilde(&self.registry.collections_dir)?;
        Ok(())
    }
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.max_concurrent_searches, 10);
        assert_eq!(config.search.collection_timeout_ms, 5000);
        assert_eq!(config.search.default_page_size, 50);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.registry.collections_dir.ends_with(".distill/collections"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[search]
collection_timeout_ms = 250

[registry]
collections_dir = "/srv/collections"
"#,
        )
        .unwrap();
        assert_eq!(config.search.collection_timeout_ms, 250);
        assert_eq!(config.search.max_page_size, 1000);
        assert_eq!(config.registry.collections_dir, PathBuf::from("/srv/collections"));
        assert_eq!(config.links.base_url, "http://localhost:8000/api/v1");
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested/config.toml");

        let mut config = Config::default();
        config.search.max_concurrent_searches = 3;
        config.logging.format = "json".to_string();
        config.registry.collections_dir = temp.path().join("collections");
        config.save(&path).unwrap();

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded.search.max_concurrent_searches, 3);
        assert_eq!(loaded.logging.format, "json");
        assert_eq!(loaded.registry.collections_dir, temp.path().join("collections"));
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.default_page_size, 50);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = tempdir().unwrap();
        assert!(Config::load(&temp.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_page_params_from_config() {
        let search = SearchConfig::default();
        assert_eq!(search.page(None, None), PageParams::new(1, 50));
        assert_eq!(search.page(Some(3), Some(5000)), PageParams::new(3, 1000));
    }

    #[test]
    fn test_aggregator_config() {
        let mut search = SearchConfig::default();
        search.collection_timeout_ms = 42;
        assert_eq!(search.aggregator().collection_timeout_ms, 42);
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde(Path::new("~/x")).unwrap(), home.join("x"));
        assert_eq!(expand_tilde(Path::new("/abs")).unwrap(), PathBuf::from("/abs"));
    }
}
