/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::manifest
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Snapshot every mod's update state after a cycle into a
    JSON manifest for launchers and operators.

  Security / Safety Notes:
    Manifest data is written to operator-controlled paths; no
    privileged operations are performed.

  Dependencies:
    serde for JSON serialization, chrono for timestamps.

  Operational Scope:
    Written by the CLI once the cycle report is in.

  Revision History:
    2025-03-14 COD  Authored update manifest builder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible manifests
    - Explicit source attribution for each mod
    - Rich metadata for audit and observability
============================================================*/

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::channel::UpdateChannel;
use crate::coordinator::CycleReport;
use crate::error::{ModwatchError, Result};
use crate::mod_record::ModRecord;

/// Wrapper representing the full manifest document.
#[derive(Debug, Serialize)]
pub struct ManifestDocument {
    pub metadata: ManifestMetadata,
    pub mods: BTreeMap<String, ManifestEntry>,
}

/// Metadata block describing manifest context.
#[derive(Debug, Serialize)]
pub struct ManifestMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub channel: UpdateChannel,
    pub total_mods: usize,
    pub skipped: usize,
    pub custom_checked: usize,
    pub registry_checked: usize,
    pub updates_available: usize,
    pub registry_retired: bool,
}

/// Per-mod manifest entry.
#[derive(Debug, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub installed_version: String,
    pub source: CheckSource,
    pub update_available: bool,
    pub new_version: Option<String>,
    pub channel: Option<UpdateChannel>,
    pub message: Option<String>,
    pub download_link: Option<String>,
}

/// Which path decided a mod's update state.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckSource {
    Custom,
    Registry,
    Disabled,
}

/// Build a manifest from the mods of a finished cycle.
pub fn build_manifest(
    mods: &[Arc<ModRecord>],
    report: &CycleReport,
    channel: UpdateChannel,
) -> ManifestDocument {
    let mut entries = BTreeMap::new();
    let mut updates_available = 0usize;

    for record in mods {
        let source = if !record.allows_update_checks() {
            CheckSource::Disabled
        } else if record.custom_checker().is_some() {
            CheckSource::Custom
        } else {
            CheckSource::Registry
        };
        let update = record.update();
        let available = update.as_ref().is_some_and(|u| u.available);
        if available {
            updates_available += 1;
        }

        entries.insert(
            record.id().to_string(),
            ManifestEntry {
                name: record.display_name().to_string(),
                installed_version: record.installed_version().to_string(),
                source,
                update_available: available,
                new_version: update.as_ref().and_then(|u| u.version_number.clone()),
                channel: update.as_ref().map(|u| u.channel),
                message: update.as_ref().map(|u| u.message.clone()),
                download_link: update.map(|u| u.download_link),
            },
        );
    }

    let metadata = ManifestMetadata {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        generated_by: "modwatch_core".to_string(),
        channel,
        total_mods: mods.len(),
        skipped: report.skipped,
        custom_checked: report.custom_checked,
        registry_checked: report.hashed_mods,
        updates_available,
        registry_retired: report.registry_retired,
    };

    ManifestDocument {
        metadata,
        mods: entries,
    }
}

/// Persist the manifest to the given path.
pub fn write_manifest(document: &ManifestDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            ModwatchError::Filesystem(format!(
                "Failed to create manifest directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        ModwatchError::Filesystem(format!(
            "Failed to create manifest file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, document).map_err(|err| {
        ModwatchError::Filesystem(format!(
            "Failed to write manifest {}: {err}",
            path.display()
        ))
    })?;
    Ok(())
}
