/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::http
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Describe the running platform and build the HTTP clients
    (async for registry batches, blocking for checkers) with
    a privacy-preserving User-Agent.

  Security / Safety Notes:
    Build metadata is stripped from the client version before
    it is sent; no other host details are disclosed.

  Dependencies:
    reqwest for HTTP transport.

  Operational Scope:
    Shared by the registry client and loader checkers.

  Revision History:
    2025-03-04 COD  Centralised client construction.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit timeouts on every outbound connection
    - One User-Agent format for all endpoints
============================================================*/

use std::time::Duration;

use crate::error::{ModwatchError, Result};
use crate::loader::LoaderFlavor;
use crate::version::strip_build_metadata;

/// Host platform facts supplied by the mod loader collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Product token, e.g. `Synavera/ModWatch`.
    pub client_name: String,
    pub client_version: String,
    pub game_version: String,
    /// Loader identifiers the registry should match against. Quilt runs
    /// Fabric mods, so a Quilt install lists both.
    pub loaders: Vec<String>,
    pub development: bool,
}

impl Platform {
    /// The loader actually running the game; any Quilt entry wins.
    pub fn running_loader(&self) -> LoaderFlavor {
        if self.loaders.iter().any(|loader| loader == "quilt") {
            LoaderFlavor::Quilt
        } else {
            LoaderFlavor::Fabric
        }
    }

    /// `{client}/{version} ({game}/{loader}[/development])`.
    pub fn user_agent(&self) -> String {
        let env = if self.development { "/development" } else { "" };
        let loader = self.running_loader().as_str();
        format!(
            "{}/{} ({}/{}{})",
            self.client_name,
            strip_build_metadata(&self.client_version),
            self.game_version,
            loader,
            env
        )
    }
}

/// Async client for batched registry lookups.
pub fn build_async_client(
    platform: &Platform,
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .user_agent(platform.user_agent())
        .build()
        .map_err(|err| ModwatchError::Network(format!("Failed to build HTTP client: {err}")))
}

/// Blocking client for synchronous checkers. Must be built and dropped
/// outside of an async context.
pub fn build_blocking_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .user_agent(user_agent.to_string())
        .build()
        .map_err(|err| ModwatchError::Network(format!("Failed to build HTTP client: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> Platform {
        Platform {
            client_name: "Synavera/ModWatch".into(),
            client_version: "0.4.0+git.3f2a".into(),
            game_version: "1.20.4".into(),
            loaders: vec!["fabric".into(), "quilt".into()],
            development: false,
        }
    }

    #[test]
    fn user_agent_strips_build_metadata() {
        assert_eq!(
            platform().user_agent(),
            "Synavera/ModWatch/0.4.0 (1.20.4/quilt)"
        );
    }

    #[test]
    fn user_agent_marks_development_environment() {
        let mut platform = platform();
        platform.development = true;
        platform.loaders = vec!["fabric".into()];
        assert_eq!(
            platform.user_agent(),
            "Synavera/ModWatch/0.4.0 (1.20.4/fabric/development)"
        );
    }

    #[test]
    fn quilt_is_reported_whatever_the_loader_order() {
        let mut platform = platform();
        assert_eq!(platform.running_loader(), LoaderFlavor::Quilt);
        platform.loaders = vec!["quilt".into(), "fabric".into()];
        assert_eq!(platform.running_loader(), LoaderFlavor::Quilt);
        platform.loaders = vec!["fabric".into()];
        assert_eq!(platform.running_loader(), LoaderFlavor::Fabric);
    }
}
