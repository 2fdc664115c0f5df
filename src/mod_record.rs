/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::mod_record
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing installed mods, the update
    descriptors written back onto them, and the pluggable
    checker capability mod authors may supply.

  Security / Safety Notes:
    Artifact hashing reads mod files with user privileges
    only; file contents never leave this module.

  Dependencies:
    sha2 for SHA-512 artifact digests, serde for manifests.

  Operational Scope:
    Produced by the mod inventory collaborator, read by the
    coordinator, and mutated only through `set_update`.

  Revision History:
    2025-03-02 COD  Introduced ModRecord and UpdateResult.
    2025-03-11 COD  Lazy artifact hashing with retry on failure.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Write-once-per-cycle result slot behind a lock
============================================================*/

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use sha2::{Digest, Sha512};

use crate::channel::UpdateChannel;

/// Immutable descriptor of an available update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub available: bool,
    pub message: String,
    pub download_link: String,
    pub channel: UpdateChannel,
    /// Target version, when the source reports one.
    pub version_number: Option<String>,
}

impl UpdateResult {
    /// Descriptor for an update that is available.
    pub fn available(
        message: impl Into<String>,
        download_link: impl Into<String>,
        channel: UpdateChannel,
        version_number: Option<String>,
    ) -> Self {
        Self {
            available: true,
            message: message.into(),
            download_link: download_link.into(),
            channel,
            version_number,
        }
    }
}

/// Mod-supplied override for update detection.
///
/// Invoked on a blocking worker, so implementations may perform their own
/// network I/O synchronously. Returning `None` means "no update" or "could
/// not tell"; either way the mod's result is left untouched.
pub trait CustomChecker: Send + Sync {
    fn check_for_updates(&self) -> Option<UpdateResult>;
}

/// Where a mod's content hash comes from.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Packaged jar on disk, hashed on first request.
    File(PathBuf),
    /// Hash already known to the collaborator (lowercase hex SHA-512).
    Digest(String),
    /// Runtime-synthesized mod with no artifact.
    None,
}

/// An installed mod as seen by the update detection core.
pub struct ModRecord {
    id: String,
    display_name: String,
    installed_version: String,
    allows_update_checks: bool,
    artifact: ArtifactSource,
    content_hash: OnceLock<String>,
    custom_checker: Option<Arc<dyn CustomChecker>>,
    update: Mutex<Option<UpdateResult>>,
}

impl ModRecord {
    /// Create a record that opts in to update checks and has no custom checker.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        installed_version: impl Into<String>,
        artifact: ArtifactSource,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            installed_version: installed_version.into(),
            allows_update_checks: true,
            artifact,
            content_hash: OnceLock::new(),
            custom_checker: None,
            update: Mutex::new(None),
        }
    }

    /// Set the opt-out flag.
    pub fn with_update_checks(mut self, allowed: bool) -> Self {
        self.allows_update_checks = allowed;
        self
    }

    /// Attach a custom checker; the mod then bypasses the registry path.
    pub fn with_checker(mut self, checker: Arc<dyn CustomChecker>) -> Self {
        self.custom_checker = Some(checker);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn installed_version(&self) -> &str {
        &self.installed_version
    }

    pub fn allows_update_checks(&self) -> bool {
        self.allows_update_checks
    }

    pub fn custom_checker(&self) -> Option<&Arc<dyn CustomChecker>> {
        self.custom_checker.as_ref()
    }

    /// True once the hash has been computed (or was supplied up front).
    pub fn has_cached_hash(&self) -> bool {
        self.content_hash.get().is_some() || matches!(self.artifact, ArtifactSource::Digest(_))
    }

    /// SHA-512 of the packaged artifact, computed lazily.
    ///
    /// `Ok(None)` for mods without an artifact. A failed read is not cached,
    /// so the next cycle tries again.
    pub fn content_hash(&self) -> io::Result<Option<String>> {
        match &self.artifact {
            ArtifactSource::None => Ok(None),
            ArtifactSource::Digest(hash) => Ok(Some(hash.to_ascii_lowercase())),
            ArtifactSource::File(path) => {
                if let Some(hash) = self.content_hash.get() {
                    return Ok(Some(hash.clone()));
                }
                let hash = sha512_file(path)?;
                Ok(Some(self.content_hash.get_or_init(|| hash).clone()))
            }
        }
    }

    /// Current update descriptor, if one was detected.
    pub fn update(&self) -> Option<UpdateResult> {
        self.update.lock().ok().and_then(|slot| slot.clone())
    }

    /// Overwrite the update descriptor.
    pub fn set_update(&self, result: UpdateResult) {
        if let Ok(mut slot) = self.update.lock() {
            *slot = Some(result);
        }
    }
}

impl fmt::Debug for ModRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModRecord")
            .field("id", &self.id)
            .field("installed_version", &self.installed_version)
            .field("allows_update_checks", &self.allows_update_checks)
            .field("custom_checker", &self.custom_checker.is_some())
            .finish_non_exhaustive()
    }
}

fn sha512_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
