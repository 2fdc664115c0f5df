/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Update detection core for installed game mods: custom
    per-mod checkers plus batched, hash-keyed registry
    lookups, reconciled into per-mod update descriptors.

  Security / Safety Notes:
    Operates within user privileges. Reads mod artifacts for
    hashing and performs HTTPS requests only.

  Dependencies:
    tokio, reqwest, serde, sha2, chrono, thiserror.

  Operational Scope:
    Embedded by launchers and mod menus, or driven through
    the `modwatch` CLI.

  Revision History:
    2025-03-02 COD  Established library surface.
  ------------------------------------------------------------
  SSE Principles Observed:
    - State passed explicitly; no ambient singletons
    - Failures inside a cycle degrade to "no update"
============================================================*/

pub mod channel;
pub mod checker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hashing;
pub mod http;
pub mod inventory;
pub mod loader;
pub mod logger;
pub mod manifest;
pub mod mod_record;
pub mod reconcile;
pub mod registry;
pub mod version;

pub use channel::UpdateChannel;
pub use coordinator::{execute_cycle, run_cycle, CycleContext, CycleReport};
pub use error::{ModwatchError, Result};
pub use mod_record::{ArtifactSource, CustomChecker, ModRecord, UpdateResult};
pub use registry::DeprecationFlag;
