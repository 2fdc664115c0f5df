/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::channel
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Model release channels and expand a user's preferred
    channel into the cumulative set of acceptable channels.

  Security / Safety Notes:
    Pure data and functions; no I/O performed in this module.

  Dependencies:
    serde for configuration parsing.

  Operational Scope:
    Feeds the registry candidate filter and classifies channel
    labels returned by external sources.

  Revision History:
    2025-03-02 COD  Introduced release channel model.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Total functions over closed enumerations
    - Unknown input degrades to the most conservative channel
============================================================*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Release maturity tier, ordered by willingness to accept pre-releases.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UpdateChannel {
    #[default]
    Release,
    Beta,
    Alpha,
}

impl UpdateChannel {
    /// Lowercase label used on the wire (`version_types`).
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateChannel::Release => "release",
            UpdateChannel::Beta => "beta",
            UpdateChannel::Alpha => "alpha",
        }
    }

    /// Classify an external channel label; unknown or absent labels are `Release`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("alpha") => UpdateChannel::Alpha,
            Some("beta") => UpdateChannel::Beta,
            _ => UpdateChannel::Release,
        }
    }

    /// Channels acceptable under this preference, most permissive first.
    pub fn eligible_channels(self) -> Vec<UpdateChannel> {
        match self {
            UpdateChannel::Release => vec![UpdateChannel::Release],
            UpdateChannel::Beta => vec![UpdateChannel::Beta, UpdateChannel::Release],
            UpdateChannel::Alpha => vec![
                UpdateChannel::Alpha,
                UpdateChannel::Beta,
                UpdateChannel::Release,
            ],
        }
    }

    /// Whether a version on `channel` is acceptable under this preference.
    pub fn accepts(self, channel: UpdateChannel) -> bool {
        channel <= self
    }
}

impl fmt::Display for UpdateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
