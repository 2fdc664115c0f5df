/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::checker
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Run a mod-supplied update checker on its own blocking
    worker and write its verdict back onto the mod.

  Security / Safety Notes:
    Third-party checker code runs with user privileges; panics
    are contained to the worker and never reach the cycle.

  Dependencies:
    tokio for blocking worker dispatch.

  Operational Scope:
    One worker per mod with a custom checker, per cycle.

  Revision History:
    2025-03-08 COD  Authored custom checker runner.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Failure isolation per mod
    - No checker can stall its siblings or the coordinator
============================================================*/

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::logger::Logger;
use crate::mod_record::ModRecord;

/// How one custom check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerOutcome {
    Updated,
    NoUpdate,
    Failed,
    /// The record had no checker attached.
    NotApplicable,
}

/// Invoke the record's checker on the current thread and apply the result.
pub fn run_checker(record: &ModRecord, logger: &Logger) -> CheckerOutcome {
    let Some(checker) = record.custom_checker() else {
        return CheckerOutcome::NotApplicable;
    };

    match catch_unwind(AssertUnwindSafe(|| checker.check_for_updates())) {
        Ok(Some(update)) => {
            record.set_update(update);
            logger.info(
                "CHECKER",
                format!(
                    "Update available for '{}@{}'",
                    record.id(),
                    record.installed_version()
                ),
            );
            CheckerOutcome::Updated
        }
        Ok(None) => CheckerOutcome::NoUpdate,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            logger.error(
                "CHECKER",
                format!(
                    "Update checker for {} ({}) failed: {reason}",
                    record.display_name(),
                    record.id()
                ),
            );
            CheckerOutcome::Failed
        }
    }
}

/// Dispatch the record's checker onto a dedicated blocking worker.
pub fn spawn_checker(record: Arc<ModRecord>, logger: Arc<Logger>) -> JoinHandle<CheckerOutcome> {
    tokio::task::spawn_blocking(move || run_checker(&record, &logger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::UpdateChannel;
    use crate::mod_record::{ArtifactSource, CustomChecker, UpdateResult};

    struct Fixed(Option<UpdateResult>);

    impl CustomChecker for Fixed {
        fn check_for_updates(&self) -> Option<UpdateResult> {
            self.0.clone()
        }
    }

    struct Exploding;

    impl CustomChecker for Exploding {
        fn check_for_updates(&self) -> Option<UpdateResult> {
            panic!("meta server unreachable");
        }
    }

    fn with(checker: impl CustomChecker + 'static) -> ModRecord {
        ModRecord::new("fabricloader", "Fabric Loader", "0.15.0", ArtifactSource::None)
            .with_checker(Arc::new(checker))
    }

    #[test]
    fn successful_check_writes_result_and_logs() {
        let logger = Logger::in_memory();
        let update = UpdateResult::available("Install 0.16.0", "link", UpdateChannel::Release, None);
        let record = with(Fixed(Some(update.clone())));

        assert_eq!(run_checker(&record, &logger), CheckerOutcome::Updated);
        assert_eq!(record.update(), Some(update));
        assert!(logger.captured()[0].contains("Update available for 'fabricloader@0.15.0'"));
    }

    #[test]
    fn absent_result_leaves_record_untouched() {
        let record = with(Fixed(None));
        assert_eq!(run_checker(&record, &Logger::in_memory()), CheckerOutcome::NoUpdate);
        assert!(record.update().is_none());
    }

    #[test]
    fn panicking_checker_is_contained() {
        let logger = Logger::in_memory();
        let record = with(Exploding);
        assert_eq!(run_checker(&record, &logger), CheckerOutcome::Failed);
        assert!(record.update().is_none());
        assert!(logger.captured()[0].contains("meta server unreachable"));
    }

    #[tokio::test]
    async fn spawned_checker_reports_outcome() {
        let record = Arc::new(with(Fixed(None)));
        let outcome = spawn_checker(record, Arc::new(Logger::in_memory()))
            .await
            .unwrap();
        assert_eq!(outcome, CheckerOutcome::NoUpdate);
    }
}
