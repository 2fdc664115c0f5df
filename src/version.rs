/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse and order semantic versions as published by mod
    loader metadata services, and strip build metadata from
    version strings before they leave the machine.

  Security / Safety Notes:
    Pure string processing; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Used by the loader self-update checker and the HTTP
    User-Agent builder.

  Revision History:
    2025-03-04 COD  Authored semantic version comparator.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit parse failures instead of lossy coercion
    - Precedence rules mirror semantic versioning 2.0
============================================================*/

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ModwatchError;

/// One dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PreIdent {
    Numeric(u64),
    Text(String),
}

impl Ord for PreIdent {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreIdent::Numeric(a), PreIdent::Numeric(b)) => a.cmp(b),
            (PreIdent::Numeric(_), PreIdent::Text(_)) => Ordering::Less,
            (PreIdent::Text(_), PreIdent::Numeric(_)) => Ordering::Greater,
            (PreIdent::Text(a), PreIdent::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreIdent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Semantic version with any number of numeric components.
///
/// Loader metadata occasionally publishes four-component versions, so the
/// core is not fixed at `major.minor.patch`; missing trailing components
/// compare as zero. Build metadata stays in the displayed form but is
/// ignored for ordering.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    components: Vec<u64>,
    pre_release: Vec<PreIdent>,
    raw: String,
}

impl SemanticVersion {
    /// Parse a version string such as `0.16.10`, `1.0.0-beta.2` or `0.15.0+build.7`.
    pub fn parse(input: &str) -> Result<Self, ModwatchError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(invalid(input, "empty version"));
        }

        let rest = match raw.split_once('+') {
            Some((rest, build)) if !build.is_empty() => rest,
            Some(_) => return Err(invalid(input, "empty build metadata")),
            None => raw,
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre)),
            Some(_) => return Err(invalid(input, "empty pre-release")),
            None => (rest, None),
        };

        let mut components = Vec::new();
        for part in core.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(input, "non-numeric version component"));
            }
            let value = part
                .parse::<u64>()
                .map_err(|_| invalid(input, "version component out of range"))?;
            components.push(value);
        }

        let mut pre_release = Vec::new();
        if let Some(pre) = pre {
            for ident in pre.split('.') {
                if ident.is_empty()
                    || !ident
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
                {
                    return Err(invalid(input, "malformed pre-release identifier"));
                }
                let parsed = if ident.bytes().all(|b| b.is_ascii_digit()) {
                    ident
                        .parse::<u64>()
                        .map(PreIdent::Numeric)
                        .unwrap_or_else(|_| PreIdent::Text(ident.to_string()))
                } else {
                    PreIdent::Text(ident.to_string())
                };
                pre_release.push(parsed);
            }
        }

        Ok(Self {
            components,
            pre_release,
            raw: raw.to_string(),
        })
    }

    /// True when the version carries a pre-release suffix.
    pub fn is_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }

    /// The version exactly as published.
    pub fn friendly(&self) -> &str {
        &self.raw
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        for index in 0..width {
            match self.component(index).cmp(&other.component(index)) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }
        match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre_release.cmp(&other.pre_release),
        }
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl FromStr for SemanticVersion {
    type Err = ModwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Drop `+build` metadata, which can identify a local build environment.
pub fn strip_build_metadata(version: &str) -> &str {
    version.split_once('+').map_or(version, |(head, _)| head)
}

fn invalid(input: &str, reason: &str) -> ModwatchError {
    ModwatchError::Serialization(format!("Invalid version `{input}`: {reason}"))
}
