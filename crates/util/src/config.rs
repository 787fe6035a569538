//! Loading properties from the application configuration file.
//!
//! The file lives at `~/.config/funcmesh/application.yaml` on most platforms
//! and may be relocated with `FUNCMESH_CONFIG_PATH`. Files ending in `.json`
//! are parsed as JSON; everything else is parsed as YAML. A missing file is
//! not an error and yields empty properties.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use dirs_next::{config_dir, home_dir};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::Properties;

/// Environment variable allowing callers to override the configuration file path.
pub const CONFIG_PATH_ENV: &str = "FUNCMESH_CONFIG_PATH";

/// Default filename inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "application.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Get the configuration file path, honoring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("funcmesh")
        .join(CONFIG_FILE_NAME)
}

/// Load and flatten properties from `path`.
pub fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "configuration file not found; using empty properties");
            return Ok(Properties::new());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let properties = parse_properties(path, &content)?;
    debug!(path = %path.display(), property_count = properties.len(), "configuration loaded");
    Ok(properties)
}

fn parse_properties(path: &Path, content: &str) -> Result<Properties, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Properties::new());
    }
    let is_json = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

    let document: Value = if is_json {
        serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    Ok(Properties::from_value(&document))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}
