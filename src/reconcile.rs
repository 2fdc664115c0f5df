/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::reconcile
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Join the installed and candidate registry batches into
    per-hash update decisions and write them onto every mod
    that shares the artifact.

  Security / Safety Notes:
    Pure decision logic plus in-memory writes; no I/O beyond
    logging.

  Dependencies:
    urlencoding for download link segments.

  Operational Scope:
    Final stage of the batched path in each check cycle.

  Revision History:
    2025-03-07 COD  Authored release-date reconciler.
    2025-03-20 COD  Added hash-only fallback strategy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic decisions from explicit inputs
    - Inconclusive data never produces an update
============================================================*/

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::hashing::HashBucket;
use crate::logger::Logger;
use crate::mod_record::UpdateResult;
use crate::registry::{CandidateVersionMeta, InstalledVersionMeta};

/// How installed artifacts are compared against candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileStrategy {
    /// Cross-check release dates from the installed-version lookup.
    #[default]
    ReleaseDate,
    /// Compare primary file hashes only; skips the installed lookup and
    /// may offer a "downgrade" after a channel preference change.
    HashOnly,
}

/// Outcome for one artifact hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Update(UpdateResult),
    /// Installed artifact is the candidate, or newer than it.
    UpToDate,
    /// Registry offered nothing eligible.
    NoCandidate,
    /// No baseline release date for the installed artifact.
    Inconclusive,
}

/// Decision rules for a single artifact hash.
pub fn decide(
    hash: &str,
    installed: Option<&InstalledVersionMeta>,
    candidate: Option<&CandidateVersionMeta>,
    strategy: ReconcileStrategy,
    site_url: &str,
) -> Decision {
    let Some(candidate) = candidate else {
        return Decision::NoCandidate;
    };

    if strategy == ReconcileStrategy::ReleaseDate {
        let Some(installed) = installed else {
            return Decision::Inconclusive;
        };
        if candidate.file_hash.eq_ignore_ascii_case(hash) {
            return Decision::UpToDate;
        }
        if installed.release_date >= candidate.release_date {
            return Decision::UpToDate;
        }
    } else if candidate.file_hash.eq_ignore_ascii_case(hash) {
        return Decision::UpToDate;
    }

    Decision::Update(update_for(candidate, site_url))
}

/// Build the descriptor handed to every mod sharing the artifact.
pub fn update_for(candidate: &CandidateVersionMeta, site_url: &str) -> UpdateResult {
    let link = format!(
        "{}/project/{}/version/{}",
        site_url.trim_end_matches('/'),
        encode(&candidate.project_id),
        encode(&candidate.version_id)
    );
    UpdateResult::available(
        format!(
            "{} available on the {} channel",
            candidate.version_number, candidate.channel
        ),
        link,
        candidate.channel,
        Some(candidate.version_number.clone()),
    )
}

/// Applies batch decisions onto the mods in a bucket.
#[derive(Debug, Clone)]
pub struct Reconciler {
    strategy: ReconcileStrategy,
    site_url: String,
}

impl Reconciler {
    pub fn new(strategy: ReconcileStrategy, site_url: impl Into<String>) -> Self {
        Self {
            strategy,
            site_url: site_url.into(),
        }
    }

    pub fn strategy(&self) -> ReconcileStrategy {
        self.strategy
    }

    /// Write updates onto affected mods; returns how many mods were updated.
    pub fn reconcile(
        &self,
        bucket: &HashBucket,
        installed: &HashMap<String, InstalledVersionMeta>,
        candidates: &HashMap<String, CandidateVersionMeta>,
        logger: &Logger,
    ) -> usize {
        let mut updated = 0usize;

        for hash in bucket.hashes() {
            let decision = decide(
                &hash,
                installed.get(&hash),
                candidates.get(&hash),
                self.strategy,
                &self.site_url,
            );
            let update = match decision {
                Decision::Update(update) => update,
                Decision::Inconclusive => {
                    logger.debug(
                        "UPDATE",
                        format!("No registry baseline for {} mod(s); skipping", bucket.mods_for(&hash).len()),
                    );
                    continue;
                }
                Decision::UpToDate | Decision::NoCandidate => continue,
            };

            for record in bucket.mods_for(&hash) {
                record.set_update(update.clone());
                updated += 1;
                logger.info(
                    "UPDATE",
                    format!(
                        "Update available for '{}@{}' (-> {})",
                        record.id(),
                        record.installed_version(),
                        update.version_number.as_deref().unwrap_or("?")
                    ),
                );
            }
        }

        updated
    }
}
