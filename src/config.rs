/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load and validate ModWatch configuration from TOML,
    providing defaults for every field.

  Security / Safety Notes:
    Reads operator-owned files only; URLs are validated to
    use http(s) before any request is made.

  Dependencies:
    toml + serde for parsing, dirs for default locations.

  Operational Scope:
    Consumed by the CLI to build the cycle context, registry
    client and loader checkers.

  Revision History:
    2025-03-03 COD  Authored configuration loader.
    2025-03-20 COD  Added reconcile strategy and checker timeout.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults, explicit validation
    - Missing default file is not an error; missing named file is
============================================================*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::channel::UpdateChannel;
use crate::error::{ModwatchError, Result};
use crate::http::Platform;
use crate::reconcile::ReconcileStrategy;

const APP_DIR: &str = "modwatch";

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModwatchConfig {
    pub general: GeneralConfig,
    pub registry: RegistryConfig,
    pub loader: LoaderConfig,
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Master switch; when false no cycle is run.
    pub update_checker: bool,
    pub channel: UpdateChannel,
    pub strategy: ReconcileStrategy,
    pub manifest_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// Seconds to wait on each custom checker before abandoning it.
    pub checker_timeout: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            update_checker: true,
            channel: UpdateChannel::Release,
            strategy: ReconcileStrategy::ReleaseDate,
            manifest_path: None,
            log_dir: None,
            checker_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub api_url: String,
    pub site_url: String,
    pub connect_timeout: u64,
    pub timeout: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.modrinth.com".into(),
            site_url: "https://modrinth.com".into(),
            connect_timeout: 10,
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub fabric_meta_url: String,
    pub quilt_meta_url: String,
    pub timeout: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fabric_meta_url: "https://meta.fabricmc.net/v2/versions/loader".into(),
            quilt_meta_url: "https://meta.quiltmc.org/v3/versions/loader".into(),
            timeout: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub client_name: String,
    pub client_version: String,
    pub game_version: String,
    pub loaders: Vec<String>,
    pub development: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            client_name: "Synavera/ModWatch".into(),
            client_version: env!("CARGO_PKG_VERSION").into(),
            game_version: "1.20.4".into(),
            loaders: vec!["fabric".into()],
            development: false,
        }
    }
}

impl ModwatchConfig {
    /// Load from `path`, or from the default location when `None`.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(explicit) => Self::load_from_path(explicit)?,
            None => match default_config_path() {
                Some(default) if default.exists() => Self::load_from_path(&default)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ModwatchError::Config(format!("Failed to read config {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| ModwatchError::Config(format!("{} ({})", err, path.display())))
    }

    /// Parse a TOML document without touching the filesystem.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| ModwatchError::Config(format!("Invalid TOML: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.platform.loaders.is_empty() {
            return Err(ModwatchError::Config("platform.loaders must not be empty".into()));
        }
        if self.platform.game_version.trim().is_empty() {
            return Err(ModwatchError::Config(
                "platform.game_version must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("registry.connect_timeout", self.registry.connect_timeout),
            ("registry.timeout", self.registry.timeout),
            ("loader.timeout", self.loader.timeout),
            ("general.checker_timeout", self.general.checker_timeout),
        ] {
            if value == 0 {
                return Err(ModwatchError::Config(format!("{name} must be greater than zero")));
            }
        }
        for (name, url) in [
            ("registry.api_url", &self.registry.api_url),
            ("registry.site_url", &self.registry.site_url),
            ("loader.fabric_meta_url", &self.loader.fabric_meta_url),
            ("loader.quilt_meta_url", &self.loader.quilt_meta_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ModwatchError::Config(format!(
                    "{name} must be an http(s) URL, got `{url}`"
                )));
            }
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.general.manifest_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("updates.json")
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.general.log_dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("logs")
        })
    }

    pub fn platform(&self) -> Platform {
        Platform {
            client_name: self.platform.client_name.clone(),
            client_version: self.platform.client_version.clone(),
            game_version: self.platform.game_version.clone(),
            loaders: self.platform.loaders.clone(),
            development: self.platform.development,
        }
    }

    pub fn registry_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.connect_timeout)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout)
    }

    pub fn loader_timeout(&self) -> Duration {
        Duration::from_secs(self.loader.timeout)
    }

    pub fn checker_timeout(&self) -> Duration {
        Duration::from_secs(self.general.checker_timeout)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ModwatchConfig::default();
        config.validate().unwrap();
        assert!(config.general.update_checker);
        assert_eq!(config.general.channel, UpdateChannel::Release);
        assert_eq!(config.general.strategy, ReconcileStrategy::ReleaseDate);
        assert_eq!(config.registry.api_url, "https://api.modrinth.com");
    }

    #[test]
    fn parses_partial_document() {
        let config = ModwatchConfig::from_toml(
            r#"
            [general]
            channel = "beta"
            strategy = "hash-only"

            [platform]
            game_version = "1.21.1"
            loaders = ["quilt", "fabric"]
            development = true
            "#,
        )
        .unwrap();

        assert_eq!(config.general.channel, UpdateChannel::Beta);
        assert_eq!(config.general.strategy, ReconcileStrategy::HashOnly);
        assert_eq!(config.registry.timeout, 30);
        let platform = config.platform();
        assert_eq!(platform.loaders, vec!["quilt", "fabric"]);
        assert!(platform.user_agent().ends_with("(1.21.1/quilt/development)"));
    }

    #[test]
    fn rejects_invalid_values() {
        let empty_loaders = ModwatchConfig::from_toml("[platform]\nloaders = []\n").unwrap();
        assert!(empty_loaders.validate().is_err());

        let zero = ModwatchConfig::from_toml("[registry]\ntimeout = 0\n").unwrap();
        assert!(zero.validate().is_err());

        let scheme = ModwatchConfig::from_toml("[registry]\napi_url = \"ftp://x\"\n").unwrap();
        assert!(scheme.validate().is_err());

        assert!(ModwatchConfig::from_toml("[general]\nchannel = \"nightly\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ModwatchConfig::load_from_optional_path(Some(&missing)),
            Err(ModwatchError::Config(_))
        ));

        let present = dir.path().join("config.toml");
        std::fs::write(&present, "[general]\nupdate_checker = false\n").unwrap();
        let config = ModwatchConfig::load_from_optional_path(Some(&present)).unwrap();
        assert!(!config.general.update_checker);
    }
}
