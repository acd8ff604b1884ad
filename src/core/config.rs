use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{InstallerError, InstallerResult};
use crate::core::processors::resolve_java_binary;
use crate::core::version::VERSION_MANIFEST_URL;

/// Optional settings file (`--settings <FILE>`). Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    pub java_path: Option<PathBuf>,
    pub offline: bool,
    pub disable_mirror: bool,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub version_manifest_url: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            java_path: None,
            offline: false,
            disable_mirror: false,
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
        }
    }
}

impl InstallerSettings {
    /// Read settings from `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> InstallerResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| InstallerError::io(path, e))?;
        let settings: Self = serde_json::from_str(&raw)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }
}

/// Command-line values that override the settings file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub offline: bool,
    pub no_mirror: bool,
    pub bundle: Option<PathBuf>,
    pub java: Option<PathBuf>,
}

/// Immutable configuration for one run, passed explicitly to every workflow.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Installer archive holding the profile and embedded artifacts.
    pub bundle: PathBuf,
    pub offline: bool,
    pub use_mirror: bool,
    pub java: PathBuf,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub version_manifest_url: String,
    /// Checked between libraries and between processors.
    pub cancel: Arc<AtomicBool>,
}

impl InstallerConfig {
    pub fn resolve(settings: InstallerSettings, overrides: ConfigOverrides) -> InstallerResult<Self> {
        let bundle = match overrides.bundle {
            Some(bundle) => bundle,
            None => std::env::current_exe().map_err(|e| InstallerError::io("current_exe", e))?,
        };
        let java_override = overrides.java.or(settings.java_path);
        let java = resolve_java_binary(java_override.as_deref());

        let config = Self {
            bundle,
            offline: overrides.offline || settings.offline,
            use_mirror: !(overrides.no_mirror || settings.disable_mirror),
            java,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            read_timeout: Duration::from_secs(settings.read_timeout_secs),
            version_manifest_url: settings.version_manifest_url,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        info!(
            "Installer bundle {:?}, offline={}, mirror={}, java={:?}",
            config.bundle, config.offline, config.use_mirror, config.java
        );
        Ok(config)
    }
}

/// Where the vanilla launcher keeps its game directory on this platform.
pub fn default_client_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir()
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
    } else {
        dirs::home_dir()
    };
    let base = base.unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "macos") {
        base.join("minecraft")
    } else {
        base.join(".minecraft")
    }
}

/// Server installs and extraction default to the working directory.
pub fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
