/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::registry
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Query the package registry API in two batches keyed by
    artifact hash: the release date of each installed file,
    and the best eligible update for each installed file.

  Security / Safety Notes:
    Performs read-only HTTPS POST requests carrying artifact
    hashes and platform identifiers. No credentials are sent.

  Dependencies:
    reqwest for HTTP, serde for request/response bodies,
    chrono for release timestamps.

  Operational Scope:
    Supplies the reconciler with installed and candidate
    metadata for mods that ship no custom checker.

  Revision History:
    2025-03-06 COD  Implemented batched registry client.
    2025-03-19 COD  Latch endpoint retirement (410 Gone).
  ------------------------------------------------------------
  SSE Principles Observed:
    - Single attempt per cycle; the next cycle is the retry
    - Malformed entries are dropped one at a time
    - Process-wide retirement latch, set once and never reset
============================================================*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::UpdateChannel;
use crate::error::{ModwatchError, Result};
use crate::logger::Logger;

pub const INSTALLED_ENDPOINT: &str = "/v2/version_files";
pub const CANDIDATES_ENDPOINT: &str = "/v2/version_files/update";
const HASH_ALGORITHM: &str = "sha512";

/// Latch recording that the batched registry API has been retired.
#[derive(Debug, Default)]
pub struct DeprecationFlag(AtomicBool);

impl DeprecationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Set the latch; returns true only for the call that flipped it.
    pub fn mark(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Registry's record of an installed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersionMeta {
    pub release_date: DateTime<Utc>,
    /// Primary file hash of the version the registry matched.
    pub hash: String,
}

/// Best eligible version the registry offers for an installed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVersionMeta {
    pub project_id: String,
    pub version_id: String,
    pub version_number: String,
    pub release_date: DateTime<Utc>,
    pub channel: UpdateChannel,
    /// SHA-512 of the candidate's primary file.
    pub file_hash: String,
}

/// Platform filter for the candidate lookup.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub loaders: Vec<String>,
    pub game_version: String,
    pub channels: Vec<UpdateChannel>,
}

/// Entries decoded from one batch response.
#[derive(Debug)]
pub struct Batch<T> {
    pub entries: HashMap<String, T>,
    /// Entries dropped because they were malformed or had no primary file.
    pub skipped: usize,
}

/// Client for the registry's hash-keyed batch endpoints.
#[derive(Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    api_url: String,
    deprecation: Arc<DeprecationFlag>,
    logger: Arc<Logger>,
}

impl RegistryClient {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        deprecation: Arc<DeprecationFlag>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            deprecation,
            logger,
        }
    }

    /// Release date the registry associates with each exact artifact.
    pub async fn fetch_installed(&self, hashes: &[String]) -> Result<Batch<InstalledVersionMeta>> {
        let body = InstalledRequest {
            hashes,
            algorithm: HASH_ALGORITHM,
        };
        let payload = self.post(INSTALLED_ENDPOINT, &body).await?;

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for (hash, value) in payload {
            match decode_installed(&hash, value) {
                Some(meta) => {
                    entries.insert(hash, meta);
                }
                None => skipped += 1,
            }
        }
        Ok(Batch { entries, skipped })
    }

    /// Best eligible update per artifact for the given platform and channels.
    pub async fn fetch_candidates(
        &self,
        hashes: &[String],
        query: &CandidateQuery,
    ) -> Result<Batch<CandidateVersionMeta>> {
        let body = CandidateRequest {
            hashes,
            algorithm: HASH_ALGORITHM,
            loaders: &query.loaders,
            game_versions: vec![query.game_version.as_str()],
            version_types: query.channels.iter().map(|c| c.as_str()).collect(),
        };
        let payload = self.post(CANDIDATES_ENDPOINT, &body).await?;

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for (hash, value) in payload {
            match decode_candidate(value) {
                Some(meta) => {
                    entries.insert(hash, meta);
                }
                None => skipped += 1,
            }
        }
        Ok(Batch { entries, skipped })
    }

    async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<Map<String, Value>> {
        if self.deprecation.is_set() {
            return Err(ModwatchError::Deprecated {
                endpoint: endpoint.to_string(),
            });
        }

        let url = format!("{}{}", self.api_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| ModwatchError::Network(format!("Registry request to {url} failed: {err}")))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::GONE => {
                // Only the request that flips the latch reports it.
                if self.deprecation.mark() {
                    self.logger.warn(
                        "DEPRECATED",
                        "Registry batch API is deprecated, unable to check for mod updates",
                    );
                }
                return Err(ModwatchError::Deprecated {
                    endpoint: endpoint.to_string(),
                });
            }
            status => {
                return Err(ModwatchError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                });
            }
        }

        let payload = response.json::<Value>().await.map_err(|err| {
            ModwatchError::Serialization(format!("Failed to decode registry response from {url}: {err}"))
        })?;
        match payload {
            Value::Object(map) => Ok(map),
            other => Err(ModwatchError::Serialization(format!(
                "Registry response from {url} is not an object: {}",
                json_kind(&other)
            ))),
        }
    }
}

#[derive(Serialize)]
struct InstalledRequest<'a> {
    hashes: &'a [String],
    algorithm: &'static str,
}

#[derive(Serialize)]
struct CandidateRequest<'a> {
    hashes: &'a [String],
    algorithm: &'static str,
    loaders: &'a [String],
    game_versions: Vec<&'a str>,
    version_types: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    id: Option<String>,
    project_id: Option<String>,
    version_number: Option<String>,
    version_type: Option<String>,
    date_published: String,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    hashes: FileHashes,
}

#[derive(Debug, Default, Deserialize)]
struct FileHashes {
    sha512: Option<String>,
}

impl VersionEntry {
    fn primary_hash(&self) -> Option<String> {
        self.files
            .iter()
            .find(|file| file.primary)
            .and_then(|file| file.hashes.sha512.as_deref())
            .map(str::to_ascii_lowercase)
    }
}

fn decode_installed(lookup_hash: &str, value: Value) -> Option<InstalledVersionMeta> {
    let entry: VersionEntry = serde_json::from_value(value).ok()?;
    let release_date = parse_timestamp(&entry.date_published)?;
    let hash = entry
        .primary_hash()
        .unwrap_or_else(|| lookup_hash.to_string());
    Some(InstalledVersionMeta { release_date, hash })
}

fn decode_candidate(value: Value) -> Option<CandidateVersionMeta> {
    let entry: VersionEntry = serde_json::from_value(value).ok()?;
    let file_hash = entry.primary_hash()?;
    let release_date = parse_timestamp(&entry.date_published)?;
    Some(CandidateVersionMeta {
        project_id: entry.project_id?,
        version_id: entry.id?,
        version_number: entry.version_number?,
        release_date,
        channel: UpdateChannel::from_label(entry.version_type.as_deref()),
        file_hash,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
