/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise ModWatch error types so the update detection
    core and the CLI share one diagnostic vocabulary.

  Security / Safety Notes:
    Error contexts name endpoints and paths only; request
    bodies and artifact contents are never embedded.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures.
    Inside a check cycle errors are logged and absorbed; only
    CLI setup surfaces them as exit codes.

  Revision History:
    2025-03-02 COD  Established shared error definitions.
    2025-03-19 COD  Added registry status and deprecation kinds.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for ModWatch operations.
pub type Result<T> = std::result::Result<T, ModwatchError>;

/// Enumerates high-level error domains surfaced by ModWatch.
#[derive(Debug, Error)]
pub enum ModwatchError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Endpoint {endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Endpoint {endpoint} is retired (410 Gone)")]
    Deprecated { endpoint: String },
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ModwatchError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ModwatchError::Config(_) => ExitCode::from(20),
            ModwatchError::Network(_) => ExitCode::from(30),
            ModwatchError::Serialization(_) => ExitCode::from(31),
            ModwatchError::Status { .. } => ExitCode::from(32),
            ModwatchError::Deprecated { .. } => ExitCode::from(33),
            ModwatchError::Filesystem(_) => ExitCode::from(40),
            ModwatchError::Io(_) => ExitCode::from(41),
            ModwatchError::Runtime(_) => ExitCode::from(50),
        }
    }

    /// True when the failure means the endpoint will never answer again.
    pub fn is_deprecation(&self) -> bool {
        matches!(self, ModwatchError::Deprecated { .. })
    }
}
