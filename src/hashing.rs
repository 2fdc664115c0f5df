/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::hashing
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Group mods that rely on registry lookups by the SHA-512 of
    their artifact so each distinct jar is queried once.

  Security / Safety Notes:
    Reads mod artifacts from disk; hashes are logged at DEBUG
    level only.

  Dependencies:
    sha2 (via mod_record) for digests.

  Operational Scope:
    Runs on a blocking worker inside the check cycle, ahead of
    the batched registry requests.

  Revision History:
    2025-03-05 COD  Authored hash indexer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Per-mod failures are isolated and logged
    - Duplicate artifacts collapse into a single lookup key
============================================================*/

use std::collections::HashMap;
use std::sync::Arc;

use crate::logger::Logger;
use crate::mod_record::ModRecord;

/// Content hash → mods sharing that artifact.
#[derive(Debug, Default)]
pub struct HashBucket {
    entries: HashMap<String, Vec<Arc<ModRecord>>>,
}

impl HashBucket {
    /// Add a mod under `hash`; re-inserting the same record is a no-op.
    pub fn insert(&mut self, hash: String, record: Arc<ModRecord>) {
        let members = self.entries.entry(hash).or_default();
        if !members.iter().any(|existing| Arc::ptr_eq(existing, &record)) {
            members.push(record);
        }
    }

    /// Distinct hashes in sorted order.
    pub fn hashes(&self) -> Vec<String> {
        let mut hashes: Vec<String> = self.entries.keys().cloned().collect();
        hashes.sort();
        hashes
    }

    pub fn mods_for(&self, hash: &str) -> &[Arc<ModRecord>] {
        self.entries.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of mods across every hash.
    pub fn mod_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Index mods that opt in to update checks and carry no custom checker.
///
/// Mods whose artifact cannot be read are logged and left out of the batch;
/// mods without an artifact are skipped silently.
pub fn index_mods(mods: &[Arc<ModRecord>], logger: &Logger) -> HashBucket {
    let mut bucket = HashBucket::default();

    for record in mods {
        if !record.allows_update_checks() || record.custom_checker().is_some() {
            continue;
        }
        match record.content_hash() {
            Ok(Some(hash)) => {
                logger.debug("HASH", format!("Hash for {} is {hash}", record.id()));
                bucket.insert(hash, Arc::clone(record));
            }
            Ok(None) => {
                logger.debug(
                    "HASH",
                    format!("{} has no artifact; skipping registry lookup", record.id()),
                );
            }
            Err(err) => {
                logger.error(
                    "HASH",
                    format!("Error getting mod hash for mod {}: {err}", record.id()),
                );
            }
        }
    }

    bucket
}
