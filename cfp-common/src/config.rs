//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CFP_ROOT_FOLDER";

/// Database file created inside the root folder
pub const DATABASE_FILE: &str = "cfp.db";

/// Service configuration read from the `[papers]` table of `config.toml`
///
/// Every field has a compiled default so a missing or partial TOML file still
/// yields a usable configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body (JSON, ZIP or multipart)
    pub max_body_bytes: usize,
    /// Largest accepted single document
    pub max_document_bytes: u64,
    /// Submission classes accepted in `submission_class` / `sclass`
    pub submission_classes: Vec<String>,
    /// Topics created on startup when missing
    pub topics: Vec<String>,
    /// Whether submitted papers need an abstract
    pub require_abstract: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            max_body_bytes: 64 * 1024 * 1024,
            max_document_bytes: 50_000_000,
            submission_classes: Vec::new(),
            topics: Vec::new(),
            require_abstract: true,
        }
    }
}

impl ServiceConfig {
    /// True when `sclass` is the default class or a configured one
    pub fn has_submission_class(&self, sclass: &str) -> bool {
        sclass.is_empty() || self.submission_classes.iter().any(|c| c.eq_ignore_ascii_case(sclass))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Root {
            #[serde(default)]
            papers: Option<ServiceConfig>,
        }
        let root: Root =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        Ok(root.papers.unwrap_or_default())
    }

    /// Load configuration from the platform config file
    ///
    /// A missing file is not an error: defaults are returned. An unreadable or
    /// malformed file logs a warning and also falls back to defaults.
    pub fn load() -> Self {
        match config_file_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => {
                info!("No config file found, using compiled defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| Self::from_toml_str(&text));
        match parsed {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key); `config_file` replaces the
///    platform config path when given
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    let config_path = match config_file {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path(),
    };
    if let Ok(config_path) = config_path {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    if !root_folder.is_dir() {
        return Err(Error::Config(format!(
            "Root folder is not a directory: {}",
            root_folder.display()
        )));
    }
    Ok(root_folder.join(DATABASE_FILE))
}

/// Get configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cfp").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/cfp/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("cfp"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cfp"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("cfp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cfp"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("cfp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cfp"))
    }
}
