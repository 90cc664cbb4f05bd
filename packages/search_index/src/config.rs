//! Loading [`SearchIndexConfig`] from TOML and the environment.
//!
//! Precedence, lowest first: built-in defaults, `chi_pb.toml` (or an
//! explicit `--config` file), environment variables, CLI flags. The last
//! step belongs to the binary.

use std::path::{Path, PathBuf};

use chi_pb_search_index_models::SearchIndexConfig;

use crate::paths;

/// Config file looked up in the working directory and project root.
pub const CONFIG_FILE_NAME: &str = "chi_pb.toml";

/// Environment variable overriding [`SearchIndexConfig::index_source`].
pub const INDEX_URL_ENV: &str = "CHI_PB_INDEX_URL";

/// Loads the config from `path`, or from the first `chi_pb.toml` found,
/// then applies environment overrides.
///
/// With no explicit path and no config file, the defaults are used.
///
/// # Errors
///
/// Returns an error if an explicit path does not exist, or if a config
/// file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<SearchIndexConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            read_config(path)?
        }
        None => match default_config_file() {
            Some(found) => read_config(&found)?,
            None => {
                log::debug!("No {CONFIG_FILE_NAME} found, using defaults");
                SearchIndexConfig::default()
            }
        },
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Parses config TOML. `location` is only used in error messages.
///
/// # Errors
///
/// Returns an error if the text is not a valid config.
pub fn parse_config(text: &str, location: &str) -> Result<SearchIndexConfig, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: location.to_string(),
        source: e,
    })
}

/// Applies `CHI_PB_INDEX_URL` on top of `config`. `lookup` reads a
/// variable; empty values are ignored.
#[must_use]
pub fn apply_env_overrides(
    mut config: SearchIndexConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> SearchIndexConfig {
    if let Some(url) = lookup(INDEX_URL_ENV).filter(|v| !v.trim().is_empty()) {
        log::debug!("{INDEX_URL_ENV} overrides index source: {url}");
        config.index_source = Some(url);
    }
    config
}

/// The service-lines CSV to build from.
#[must_use]
pub fn input_csv(config: &SearchIndexConfig) -> PathBuf {
    config
        .input_csv
        .as_ref()
        .map_or_else(paths::service_lines_csv_path, PathBuf::from)
}

/// Where the index artifact is written.
#[must_use]
pub fn output_path(config: &SearchIndexConfig) -> PathBuf {
    config
        .output_path
        .as_ref()
        .map_or_else(paths::combined_index_path, PathBuf::from)
}

/// Where the inventory lookup artifact is written.
#[must_use]
pub fn inventory_output_path(config: &SearchIndexConfig) -> PathBuf {
    config
        .inventory_output
        .as_ref()
        .map_or_else(paths::inventory_lookup_path, PathBuf::from)
}

/// Where the lookup side loads the index from: the configured source,
/// else the build output.
#[must_use]
pub fn index_source(config: &SearchIndexConfig) -> String {
    config
        .index_source
        .clone()
        .unwrap_or_else(|| output_path(config).display().to_string())
}

fn read_config(path: &Path) -> Result<SearchIndexConfig, ConfigError> {
    log::info!("Loading config from {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_config(&text, &path.display().to_string())
}

fn default_config_file() -> Option<PathBuf> {
    [
        PathBuf::from(CONFIG_FILE_NAME),
        paths::project_root().join(CONFIG_FILE_NAME),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Explicit config path does not exist.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// I/O error reading the file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("Invalid config in {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chi_pb_search_index_models::DEFAULT_INDEX_VERSION;

    #[test]
    fn parses_full_config() {
        let config = parse_config(
            r#"
            input_csv = "snapshots/service-lines.csv"
            output_path = "out/index.json"
            compress = false
            index_source = "https://example.com/index.json.zst"
            inventory_output = "out/inventory-lookup.json"
            version = "3.0.0"
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(input_csv(&config), PathBuf::from("snapshots/service-lines.csv"));
        assert_eq!(output_path(&config), PathBuf::from("out/index.json"));
        assert!(!config.compress);
        assert_eq!(index_source(&config), "https://example.com/index.json.zst");
        assert_eq!(
            inventory_output_path(&config),
            PathBuf::from("out/inventory-lookup.json")
        );
        assert_eq!(config.version, "3.0.0");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("", "inline").unwrap();
        assert!(config.compress);
        assert_eq!(config.version, DEFAULT_INDEX_VERSION);
        assert_eq!(output_path(&config), paths::combined_index_path());
        assert_eq!(inventory_output_path(&config), paths::inventory_lookup_path());
        assert_eq!(
            index_source(&config),
            paths::combined_index_path().display().to_string()
        );
    }

    #[test]
    fn rejects_wrong_types() {
        let result = parse_config("compress = \"yes\"", "inline");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn env_overrides_index_source() {
        let config = apply_env_overrides(SearchIndexConfig::default(), |key| {
            (key == INDEX_URL_ENV).then(|| "https://cdn.example.com/index.json".to_string())
        });
        assert_eq!(
            config.index_source.as_deref(),
            Some("https://cdn.example.com/index.json")
        );
    }

    #[test]
    fn blank_env_value_is_ignored() {
        let config = apply_env_overrides(SearchIndexConfig::default(), |_| Some("  ".to_string()));
        assert!(config.index_source.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/chi_pb.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = std::env::temp_dir().join("chi_pb_config_load_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "version = \"test\"\ncompress = false\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.version, "test");
        assert!(!config.compress);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
