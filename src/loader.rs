/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::loader
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Reference custom checker: compare the running mod loader
    against the newest version published by its metadata
    service, honouring the user's release channel.

  Security / Safety Notes:
    Performs a single read-only HTTPS GET per check. Every
    failure degrades to "no update".

  Dependencies:
    reqwest (blocking) for HTTP, serde_json for parsing.

  Operational Scope:
    Attached to the `fabricloader` or `quilt_loader` mod; runs
    on a blocking worker dispatched by the checker runner.

  Revision History:
    2025-03-09 COD  Authored Fabric loader checker.
    2025-03-12 COD  Added Quilt flavour.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Content-type and status validated before parsing
    - Unparseable entries skipped individually
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;

use crate::channel::UpdateChannel;
use crate::error::{ModwatchError, Result};
use crate::http::build_blocking_client;
use crate::logger::Logger;
use crate::mod_record::{CustomChecker, UpdateResult};
use crate::version::SemanticVersion;

/// Which loader's metadata service to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderFlavor {
    Fabric,
    Quilt,
}

impl LoaderFlavor {
    /// Mod id under which the loader appears in the mod list.
    pub fn mod_id(self) -> &'static str {
        match self {
            LoaderFlavor::Fabric => "fabricloader",
            LoaderFlavor::Quilt => "quilt_loader",
        }
    }

    /// Loader token as reported to remote services.
    pub fn as_str(self) -> &'static str {
        match self {
            LoaderFlavor::Fabric => "fabric",
            LoaderFlavor::Quilt => "quilt",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LoaderFlavor::Fabric => "Fabric Loader",
            LoaderFlavor::Quilt => "Quilt Loader",
        }
    }

    pub fn installer_url(self) -> &'static str {
        match self {
            LoaderFlavor::Fabric => "https://fabricmc.net/use/installer",
            LoaderFlavor::Quilt => "https://quiltmc.org/install",
        }
    }

    // Quilt meta publishes no stability flag; pre-release suffixes mark betas.
    fn is_stable(self, entry: &serde_json::Map<String, Value>, version: &SemanticVersion) -> bool {
        match (entry.get("stable").and_then(Value::as_bool), self) {
            (Some(stable), _) => stable,
            (None, LoaderFlavor::Fabric) => false,
            (None, LoaderFlavor::Quilt) => !version.is_pre_release(),
        }
    }
}

/// Pick the greatest eligible version from a loader metadata listing.
///
/// Non-object entries, entries without a string `version`, and versions that
/// do not parse are skipped. Unstable entries are skipped when the preference
/// is strictly `Release`. Returns the version and whether it is stable.
pub fn select_latest(
    entries: &[Value],
    flavor: LoaderFlavor,
    preference: UpdateChannel,
) -> Option<(SemanticVersion, bool)> {
    let mut best: Option<(SemanticVersion, bool)> = None;

    for entry in entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(raw) = object.get("version").and_then(Value::as_str) else {
            continue;
        };
        let Ok(parsed) = raw.parse::<SemanticVersion>() else {
            continue;
        };
        let stable = flavor.is_stable(object, &parsed);
        if !preference.accepts(channel_for(stable)) {
            continue;
        }
        let newer = best
            .as_ref()
            .map_or(true, |(current, _)| parsed > *current);
        if newer {
            best = Some((parsed, stable));
        }
    }

    best
}

fn channel_for(stable: bool) -> UpdateChannel {
    if stable {
        UpdateChannel::Release
    } else {
        UpdateChannel::Beta
    }
}

/// Custom checker comparing the running loader to its metadata service.
pub struct LoaderUpdateChecker {
    flavor: LoaderFlavor,
    meta_url: String,
    current_version: String,
    preference: UpdateChannel,
    user_agent: String,
    timeout: Duration,
    logger: Arc<Logger>,
}

impl LoaderUpdateChecker {
    pub fn new(
        flavor: LoaderFlavor,
        meta_url: impl Into<String>,
        current_version: impl Into<String>,
        preference: UpdateChannel,
        user_agent: impl Into<String>,
        timeout: Duration,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            flavor,
            meta_url: meta_url.into(),
            current_version: current_version.into(),
            preference,
            user_agent: user_agent.into(),
            timeout,
            logger,
        }
    }

    fn check(&self) -> Result<Option<UpdateResult>> {
        let name = self.flavor.display_name();
        let client = build_blocking_client(&self.user_agent, self.timeout)?;
        let response = client.get(&self.meta_url).send().map_err(|err| {
            ModwatchError::Network(format!("{name} meta request to {} failed: {err}", self.meta_url))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            self.logger.warn(
                "LOADER",
                format!("{name} meta responded with a non-200 status: {}", status.as_u16()),
            );
            return Ok(None);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            self.logger.warn(
                "LOADER",
                format!("{name} meta responded with a non-json content type, aborting loader update check"),
            );
            return Ok(None);
        }

        let payload = response.json::<Value>().map_err(|err| {
            ModwatchError::Serialization(format!("Failed to decode {name} meta response: {err}"))
        })?;
        let Value::Array(entries) = payload else {
            self.logger.warn(
                "LOADER",
                format!("Received invalid data from {name} meta, aborting loader update check"),
            );
            return Ok(None);
        };

        let current: SemanticVersion = self.current_version.parse()?;
        let Some((latest, stable)) = select_latest(&entries, self.flavor, self.preference) else {
            self.logger.debug("LOADER", format!("{name} has no eligible versions"));
            return Ok(None);
        };
        if latest <= current {
            self.logger.debug("LOADER", format!("{name} is up to date"));
            return Ok(None);
        }

        self.logger.debug(
            "LOADER",
            format!("{name} has a matching update available: {latest}"),
        );
        Ok(Some(UpdateResult::available(
            format!("Install {latest}"),
            self.flavor.installer_url(),
            channel_for(stable),
            Some(latest.friendly().to_string()),
        )))
    }
}

impl CustomChecker for LoaderUpdateChecker {
    fn check_for_updates(&self) -> Option<UpdateResult> {
        match self.check() {
            Ok(result) => result,
            Err(err) => {
                self.logger.error(
                    "LOADER",
                    format!("Failed {} update check: {err}", self.flavor.display_name()),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn listing() -> Vec<Value> {
        vec![
            json!({ "version": "1.3.0-beta", "stable": false }),
            json!({ "version": "1.2.0", "stable": true }),
            json!({ "version": "not.a.version", "stable": true }),
            json!("garbage"),
            json!({ "stable": true }),
        ]
    }

    fn checker(server: &MockServer, current: &str, preference: UpdateChannel) -> LoaderUpdateChecker {
        LoaderUpdateChecker::new(
            LoaderFlavor::Fabric,
            server.url("/v2/versions/loader"),
            current,
            preference,
            "Synavera/ModWatch/0.4.0 (1.20.4/fabric)",
            Duration::from_secs(5),
            Arc::new(Logger::in_memory()),
        )
    }

    #[test]
    fn release_preference_excludes_unstable_versions() {
        let (latest, stable) =
            select_latest(&listing(), LoaderFlavor::Fabric, UpdateChannel::Release).unwrap();
        assert_eq!(latest.friendly(), "1.2.0");
        assert!(stable);

        for preference in [UpdateChannel::Beta, UpdateChannel::Alpha] {
            let (latest, stable) = select_latest(&listing(), LoaderFlavor::Fabric, preference).unwrap();
            assert_eq!(latest.friendly(), "1.3.0-beta");
            assert!(!stable);
        }
    }

    #[test]
    fn quilt_infers_stability_from_pre_release() {
        let entries = vec![
            json!({ "version": "0.26.0-beta.1" }),
            json!({ "version": "0.25.1" }),
        ];
        let (latest, _) =
            select_latest(&entries, LoaderFlavor::Quilt, UpdateChannel::Release).unwrap();
        assert_eq!(latest.friendly(), "0.25.1");
        let (latest, stable) =
            select_latest(&entries, LoaderFlavor::Quilt, UpdateChannel::Beta).unwrap();
        assert_eq!(latest.friendly(), "0.26.0-beta.1");
        assert!(!stable);
    }

    #[test]
    fn stable_preference_reports_no_update_when_current() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/versions/loader");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!(listing()));
        });

        assert!(checker(&server, "1.2.0", UpdateChannel::Release)
            .check_for_updates()
            .is_none());

        for preference in [UpdateChannel::Beta, UpdateChannel::Alpha] {
            let update = checker(&server, "1.2.0", preference)
                .check_for_updates()
                .unwrap();
            assert_eq!(update.version_number.as_deref(), Some("1.3.0-beta"));
            assert_eq!(update.channel, UpdateChannel::Beta);
            assert_eq!(update.message, "Install 1.3.0-beta");
            assert_eq!(update.download_link, "https://fabricmc.net/use/installer");
        }
    }

    #[test]
    fn failures_degrade_to_no_update() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/versions/loader");
            then.status(500);
        });
        assert!(checker(&server, "0.1.0", UpdateChannel::Alpha)
            .check_for_updates()
            .is_none());

        let html = MockServer::start();
        html.mock(|when, then| {
            when.method(GET).path("/v2/versions/loader");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html></html>");
        });
        assert!(checker(&html, "0.1.0", UpdateChannel::Alpha)
            .check_for_updates()
            .is_none());

        let object = MockServer::start();
        object.mock(|when, then| {
            when.method(GET).path("/v2/versions/loader");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"version\":\"9.9.9\"}");
        });
        assert!(checker(&object, "0.1.0", UpdateChannel::Alpha)
            .check_for_updates()
            .is_none());
    }

    #[test]
    fn flavors_name_their_mod_and_token() {
        assert_eq!(LoaderFlavor::Fabric.mod_id(), "fabricloader");
        assert_eq!(LoaderFlavor::Quilt.mod_id(), "quilt_loader");
        assert_eq!(LoaderFlavor::Quilt.as_str(), "quilt");
    }
}
