/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::inventory
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Read the installed-mod export produced by the host mod
    loader and turn it into ModRecords, attaching the loader
    self-update checkers to the loader's own entry.

  Security / Safety Notes:
    Reads an operator-supplied JSON file; artifact paths are
    resolved relative to that file and only read for hashing.

  Dependencies:
    serde_json for parsing.

  Operational Scope:
    CLI entry point only; embedding applications construct
    ModRecords directly.

  Revision History:
    2025-03-13 COD  Authored inventory adapter.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Structured parsing with clear failure modes
    - Duplicate ids rejected up front
============================================================*/

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::config::ModwatchConfig;
use crate::error::{ModwatchError, Result};
use crate::loader::{LoaderFlavor, LoaderUpdateChecker};
use crate::logger::Logger;
use crate::mod_record::{ArtifactSource, ModRecord};

/// One entry of the loader's mod export.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryEntry {
    pub id: String,
    pub name: Option<String>,
    pub version: String,
    pub path: Option<PathBuf>,
    pub sha512: Option<String>,
    #[serde(default = "default_true")]
    pub allows_update_checks: bool,
}

fn default_true() -> bool {
    true
}

/// Parse an inventory document.
pub fn parse_inventory(raw: &str) -> Result<Vec<InventoryEntry>> {
    let entries: Vec<InventoryEntry> = serde_json::from_str(raw)
        .map_err(|err| ModwatchError::Serialization(format!("Invalid mod inventory: {err}")))?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(ModwatchError::Serialization(format!(
                "Mod id `{}` appears more than once in the inventory",
                entry.id
            )));
        }
    }
    Ok(entries)
}

/// Load the inventory at `path` and build records for a cycle.
pub fn load_inventory(
    path: &Path,
    config: &ModwatchConfig,
    logger: &Arc<Logger>,
) -> Result<Vec<Arc<ModRecord>>> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        ModwatchError::Filesystem(format!("Failed to read inventory {}: {err}", path.display()))
    })?;
    let entries = parse_inventory(&raw)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(entries
        .into_iter()
        .map(|entry| Arc::new(build_record(entry, base, config, logger)))
        .collect())
}

/// Turn an entry into a record, giving loader mods their reference checker.
pub fn build_record(
    entry: InventoryEntry,
    base: &Path,
    config: &ModwatchConfig,
    logger: &Arc<Logger>,
) -> ModRecord {
    let artifact = match (entry.sha512, entry.path) {
        (Some(hash), _) => ArtifactSource::Digest(hash),
        (None, Some(path)) if path.is_absolute() => ArtifactSource::File(path),
        (None, Some(path)) => ArtifactSource::File(base.join(path)),
        (None, None) => ArtifactSource::None,
    };
    let name = entry.name.unwrap_or_else(|| entry.id.clone());
    let record = ModRecord::new(entry.id.clone(), name, entry.version.clone(), artifact)
        .with_update_checks(entry.allows_update_checks);

    // Only the running loader gets a checker; Quilt also lists a
    // compatibility `fabricloader` entry that must go to the registry.
    let platform = config.platform();
    let flavor = platform.running_loader();
    if entry.id != flavor.mod_id() {
        return record;
    }
    let meta_url = match flavor {
        LoaderFlavor::Fabric => config.loader.fabric_meta_url.clone(),
        LoaderFlavor::Quilt => config.loader.quilt_meta_url.clone(),
    };
    let checker = LoaderUpdateChecker::new(
        flavor,
        meta_url,
        entry.version,
        config.general.channel,
        platform.user_agent(),
        config.loader_timeout(),
        Arc::clone(logger),
    );
    record.with_checker(Arc::new(checker))
}
