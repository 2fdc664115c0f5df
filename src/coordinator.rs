/*============================================================
  Synavera Project: ModWatch
  Module: modwatch_core::coordinator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Orchestrate one update check cycle: dispatch custom
    checkers, index the remaining mods by artifact hash, run
    both registry batches concurrently, and reconcile.

  Security / Safety Notes:
    Runs entirely in background tasks; the caller is never
    blocked. No failure inside a cycle propagates outward.

  Dependencies:
    tokio for task orchestration and timeouts.

  Operational Scope:
    Invoked once per check cycle by the embedding application
    or the CLI.

  Revision History:
    2025-03-10 COD  Authored cycle coordinator.
    2025-03-19 COD  Honour registry retirement latch.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Disjoint write sets: a mod is checked by exactly one path
    - Fire-and-forget with an optional report for observers
    - Each failure domain logged, none fatal
============================================================*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::channel::UpdateChannel;
use crate::checker::{spawn_checker, CheckerOutcome};
use crate::error::{ModwatchError, Result};
use crate::hashing::{index_mods, HashBucket};
use crate::http::Platform;
use crate::logger::Logger;
use crate::mod_record::ModRecord;
use crate::reconcile::{ReconcileStrategy, Reconciler};
use crate::registry::{Batch, CandidateQuery, DeprecationFlag, RegistryClient};

/// Everything a cycle needs, passed explicitly instead of held in globals.
pub struct CycleContext {
    pub platform: Platform,
    pub preference: UpdateChannel,
    pub registry: RegistryClient,
    pub reconciler: Reconciler,
    pub deprecation: Arc<DeprecationFlag>,
    pub logger: Arc<Logger>,
    /// How long the cycle waits on a custom checker; `None` waits forever.
    pub checker_timeout: Option<Duration>,
}

/// What a finished cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub skipped: usize,
    pub custom_checked: usize,
    pub custom_updated: usize,
    pub custom_failed: usize,
    /// Checkers still running when the cycle stopped waiting.
    pub custom_abandoned: usize,
    pub hashed_mods: usize,
    pub distinct_hashes: usize,
    pub batch_updated: usize,
    /// The registry path was skipped or retired during this cycle.
    pub registry_retired: bool,
}

impl CycleReport {
    pub fn updates(&self) -> usize {
        self.custom_updated + self.batch_updated
    }
}

/// Start a cycle in the background and return immediately.
///
/// Results land on each `ModRecord`; the handle may be dropped, or awaited
/// for a `CycleReport`. Must be called from within a Tokio runtime.
pub fn run_cycle(ctx: Arc<CycleContext>, mods: Vec<Arc<ModRecord>>) -> JoinHandle<CycleReport> {
    tokio::spawn(execute_cycle(ctx, mods))
}

/// Run a full cycle on the current task.
pub async fn execute_cycle(ctx: Arc<CycleContext>, mods: Vec<Arc<ModRecord>>) -> CycleReport {
    let logger = Arc::clone(&ctx.logger);
    let mut report = CycleReport::default();
    logger.info("CYCLE", format!("Checking updates for {} mods", mods.len()));

    let mut checkers = Vec::new();
    let mut batched = Vec::new();
    for record in mods {
        if !record.allows_update_checks() {
            report.skipped += 1;
            logger.debug("SKIP", format!("{} opted out of update checks", record.id()));
        } else if record.custom_checker().is_some() {
            report.custom_checked += 1;
            checkers.push(spawn_checker(record, Arc::clone(&logger)));
        } else {
            batched.push(record);
        }
    }

    if ctx.deprecation.is_set() {
        report.registry_retired = true;
        logger.debug("REGISTRY", "Registry batch API retired; skipping batched lookups");
    } else if !batched.is_empty() {
        match index_on_worker(batched, Arc::clone(&logger)).await {
            Ok(bucket) => {
                report.hashed_mods = bucket.mod_count();
                report.distinct_hashes = bucket.len();
                if !bucket.is_empty() {
                    run_batched(&ctx, &bucket, &mut report).await;
                }
            }
            Err(err) => logger.error("HASH", format!("Hash indexing aborted: {err}")),
        }
    }

    // One deadline for every checker, measured from the end of the batch.
    let deadline = ctx.checker_timeout.map(|limit| Instant::now() + limit);
    for handle in checkers {
        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, handle).await {
                Ok(joined) => joined.ok(),
                Err(_) => {
                    report.custom_abandoned += 1;
                    continue;
                }
            },
            None => handle.await.ok(),
        };
        match outcome {
            Some(CheckerOutcome::Updated) => report.custom_updated += 1,
            Some(CheckerOutcome::Failed) | None => report.custom_failed += 1,
            Some(CheckerOutcome::NoUpdate) | Some(CheckerOutcome::NotApplicable) => {}
        }
    }
    if report.custom_abandoned > 0 {
        logger.warn(
            "CHECKER",
            format!(
                "{} update checker(s) still running; results will land when they finish",
                report.custom_abandoned
            ),
        );
    }

    logger.info(
        "CYCLE",
        format!(
            "Cycle complete: updates={} skipped={} custom={} hashed={}",
            report.updates(),
            report.skipped,
            report.custom_checked,
            report.hashed_mods
        ),
    );
    report
}

async fn index_on_worker(mods: Vec<Arc<ModRecord>>, logger: Arc<Logger>) -> Result<HashBucket> {
    tokio::task::spawn_blocking(move || index_mods(&mods, &logger))
        .await
        .map_err(|err| ModwatchError::Runtime(format!("Hash worker failed: {err}")))
}

async fn run_batched(ctx: &CycleContext, bucket: &HashBucket, report: &mut CycleReport) {
    let logger = &ctx.logger;
    let hashes = bucket.hashes();
    let query = CandidateQuery {
        loaders: ctx.platform.loaders.clone(),
        game_version: ctx.platform.game_version.clone(),
        channels: ctx.preference.eligible_channels(),
    };

    let (installed, candidates) = match ctx.reconciler.strategy() {
        ReconcileStrategy::ReleaseDate => {
            tokio::join!(
                ctx.registry.fetch_installed(&hashes),
                ctx.registry.fetch_candidates(&hashes, &query)
            )
        }
        ReconcileStrategy::HashOnly => (
            Ok(Batch {
                entries: HashMap::new(),
                skipped: 0,
            }),
            ctx.registry.fetch_candidates(&hashes, &query).await,
        ),
    };

    let installed = settle("installed version", installed, report, logger);
    let candidates = settle("update candidate", candidates, report, logger);

    let (Some(installed), Some(candidates)) = (installed, candidates) else {
        return;
    };
    report.batch_updated = ctx
        .reconciler
        .reconcile(bucket, &installed, &candidates, logger);
}

fn settle<T>(
    label: &str,
    outcome: Result<Batch<T>>,
    report: &mut CycleReport,
    logger: &Logger,
) -> Option<HashMap<String, T>> {
    match outcome {
        Ok(batch) => {
            if batch.skipped > 0 {
                logger.debug(
                    "REGISTRY",
                    format!("Skipped {} malformed {label} entries", batch.skipped),
                );
            }
            Some(batch.entries)
        }
        Err(err) if err.is_deprecation() => {
            report.registry_retired = true;
            None
        }
        Err(err) => {
            logger.error("REGISTRY", format!("Error checking {label}: {err}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use httpmock::prelude::*;
    use serde_json::{json, Value};

    use super::*;
    use crate::mod_record::{ArtifactSource, CustomChecker, UpdateResult};
    use crate::registry::{CANDIDATES_ENDPOINT, INSTALLED_ENDPOINT};

    struct Counting {
        calls: Arc<AtomicUsize>,
        result: Option<UpdateResult>,
        delay: Duration,
    }

    impl CustomChecker for Counting {
        fn check_for_updates(&self) -> Option<UpdateResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.result.clone()
        }
    }

    fn context(server: &MockServer, flag: Arc<DeprecationFlag>, strategy: ReconcileStrategy) -> Arc<CycleContext> {
        let platform = Platform {
            client_name: "Synavera/ModWatch".into(),
            client_version: "0.4.0".into(),
            game_version: "1.20.4".into(),
            loaders: vec!["fabric".into()],
            development: false,
        };
        let logger = Arc::new(Logger::in_memory());
        Arc::new(CycleContext {
            registry: RegistryClient::new(
                reqwest::Client::new(),
                &server.base_url(),
                flag.clone(),
                Arc::clone(&logger),
            ),
            reconciler: Reconciler::new(strategy, "https://modrinth.com"),
            platform,
            preference: UpdateChannel::Release,
            deprecation: flag,
            logger,
            checker_timeout: Some(Duration::from_secs(5)),
        })
    }

    fn version(id: &str, date: &str, primary_hash: &str) -> Value {
        json!({
            "id": id,
            "project_id": "P7dR8mSH",
            "version_number": id,
            "version_type": "release",
            "date_published": date,
            "files": [ { "primary": true, "hashes": { "sha512": primary_hash } } ]
        })
    }

    fn digest(id: &str, hash: &str) -> Arc<ModRecord> {
        Arc::new(ModRecord::new(id, id, "0.90.0", ArtifactSource::Digest(hash.into())))
    }

    #[tokio::test]
    async fn shared_artifact_is_queried_once_and_updates_every_mod() {
        let server = MockServer::start_async().await;
        let installed = server
            .mock_async(|when, then| {
                when.method(POST).path(INSTALLED_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("0.90.0", "2024-01-01T00:00:00Z", "h1"),
                    "h2": version("1.0.0", "2024-01-01T00:00:00Z", "h2")
                }));
            })
            .await;
        let candidates = server
            .mock_async(|when, then| {
                when.method(POST).path(CANDIDATES_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("0.91.0", "2024-02-01T00:00:00Z", "h1-new"),
                    "h2": version("1.0.0", "2024-01-01T00:00:00Z", "h2")
                }));
            })
            .await;

        let x = digest("fabric-api", "h1");
        let y = digest("fabric-api-bundled", "h1");
        let z = digest("modmenu", "h2");
        let ctx = context(&server, Arc::new(DeprecationFlag::new()), ReconcileStrategy::ReleaseDate);

        let report = run_cycle(ctx, vec![x.clone(), y.clone(), z.clone()])
            .await
            .unwrap();

        installed.assert_calls_async(1).await;
        candidates.assert_calls_async(1).await;
        assert_eq!(report.distinct_hashes, 2);
        assert_eq!(report.batch_updated, 2);
        assert_eq!(x.update(), y.update());
        assert_eq!(x.update().unwrap().version_number.as_deref(), Some("0.91.0"));
        assert!(z.update().is_none());
    }

    #[tokio::test]
    async fn opted_out_mods_are_never_touched() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({}));
            })
            .await;
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("quiet.jar");
        std::fs::write(&jar, b"quiet").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let quiet = Arc::new(
            ModRecord::new("quiet", "Quiet", "1.0.0", ArtifactSource::File(jar)).with_update_checks(false),
        );
        let quiet_custom = Arc::new(
            ModRecord::new("quiet_custom", "Quiet Custom", "1.0.0", ArtifactSource::None)
                .with_update_checks(false)
                .with_checker(Arc::new(Counting {
                    calls: calls.clone(),
                    result: Some(UpdateResult::available("x", "y", UpdateChannel::Release, None)),
                    delay: Duration::ZERO,
                })),
        );

        let ctx = context(&server, Arc::new(DeprecationFlag::new()), ReconcileStrategy::ReleaseDate);
        let report = run_cycle(ctx, vec![quiet.clone(), quiet_custom.clone()])
            .await
            .unwrap();

        assert_eq!(report.skipped, 2);
        assert!(!quiet.has_cached_hash());
        assert!(quiet.update().is_none());
        assert!(quiet_custom.update().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        any.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn gone_latches_and_later_cycles_skip_registry() {
        let server = MockServer::start_async().await;
        let installed = server
            .mock_async(|when, then| {
                when.method(POST).path(INSTALLED_ENDPOINT);
                then.status(200).json_body(json!({}));
            })
            .await;
        let candidates = server
            .mock_async(|when, then| {
                when.method(POST).path(CANDIDATES_ENDPOINT);
                then.status(410);
            })
            .await;

        let flag = Arc::new(DeprecationFlag::new());
        let ctx = context(&server, flag.clone(), ReconcileStrategy::ReleaseDate);
        let mods = vec![digest("sodium", "h1")];

        let first = run_cycle(Arc::clone(&ctx), mods.clone()).await.unwrap();
        assert!(first.registry_retired);
        assert!(flag.is_set());
        installed.assert_calls_async(1).await;
        candidates.assert_calls_async(1).await;

        for _ in 0..2 {
            let later = run_cycle(Arc::clone(&ctx), mods.clone()).await.unwrap();
            assert!(later.registry_retired);
            assert_eq!(later.hashed_mods, 0);
        }
        installed.assert_calls_async(1).await;
        candidates.assert_calls_async(1).await;

        let warnings = ctx
            .logger
            .captured()
            .into_iter()
            .filter(|line| line.contains("[DEPRECATED]"))
            .count();
        assert_eq!(warnings, 1);
    }

    #[tokio::test]
    async fn custom_checked_mods_bypass_the_registry() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({}));
            })
            .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let update = UpdateResult::available("Install 0.16.0", "https://fabricmc.net/use/installer", UpdateChannel::Release, None);
        let loader = Arc::new(
            ModRecord::new("fabricloader", "Fabric Loader", "0.15.0", ArtifactSource::Digest("h9".into()))
                .with_checker(Arc::new(Counting {
                    calls: calls.clone(),
                    result: Some(update.clone()),
                    delay: Duration::ZERO,
                })),
        );

        let ctx = context(&server, Arc::new(DeprecationFlag::new()), ReconcileStrategy::ReleaseDate);
        let report = run_cycle(ctx, vec![loader.clone()]).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.custom_updated, 1);
        assert_eq!(report.hashed_mods, 0);
        assert_eq!(loader.update(), Some(update));
        any.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn slow_checker_does_not_hold_up_the_batch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(INSTALLED_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("1.0.0", "2024-01-01T00:00:00Z", "h1")
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(CANDIDATES_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("1.1.0", "2024-03-01T00:00:00Z", "h1-new")
                }));
            })
            .await;

        let slow = Arc::new(
            ModRecord::new("slowpoke", "Slowpoke", "1.0.0", ArtifactSource::None).with_checker(Arc::new(Counting {
                calls: Arc::new(AtomicUsize::new(0)),
                result: None,
                delay: Duration::from_millis(400),
            })),
        );
        let batched = digest("lithium", "h1");

        let flag = Arc::new(DeprecationFlag::new());
        let base = context(&server, flag.clone(), ReconcileStrategy::ReleaseDate);
        let ctx = Arc::new(CycleContext {
            platform: base.platform.clone(),
            preference: base.preference,
            registry: base.registry.clone(),
            reconciler: base.reconciler.clone(),
            deprecation: flag,
            logger: Arc::clone(&base.logger),
            checker_timeout: Some(Duration::from_millis(50)),
        });

        let report = run_cycle(ctx, vec![slow, batched.clone()]).await.unwrap();
        assert_eq!(report.custom_abandoned, 1);
        assert_eq!(report.batch_updated, 1);
        assert!(batched.update().is_some());
    }

    #[tokio::test]
    async fn hung_checkers_share_one_deadline() {
        let server = MockServer::start_async().await;
        let hung: Vec<Arc<ModRecord>> = (0..3)
            .map(|n| {
                Arc::new(
                    ModRecord::new(format!("hung{n}"), "Hung", "1.0.0", ArtifactSource::None).with_checker(
                        Arc::new(Counting {
                            calls: Arc::new(AtomicUsize::new(0)),
                            result: None,
                            delay: Duration::from_millis(1500),
                        }),
                    ),
                )
            })
            .collect();

        let flag = Arc::new(DeprecationFlag::new());
        let base = context(&server, flag.clone(), ReconcileStrategy::ReleaseDate);
        let ctx = Arc::new(CycleContext {
            platform: base.platform.clone(),
            preference: base.preference,
            registry: base.registry.clone(),
            reconciler: base.reconciler.clone(),
            deprecation: flag,
            logger: Arc::clone(&base.logger),
            checker_timeout: Some(Duration::from_millis(200)),
        });

        let started = std::time::Instant::now();
        let report = run_cycle(ctx, hung).await.unwrap();
        assert_eq!(report.custom_abandoned, 3);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn identical_artifact_reports_no_update() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(INSTALLED_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("2.0.0", "2024-01-01T00:00:00Z", "h1")
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(CANDIDATES_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("2.0.0", "2024-01-01T00:00:00Z", "h1")
                }));
            })
            .await;

        let x = digest("iris", "h1");
        let ctx = context(&server, Arc::new(DeprecationFlag::new()), ReconcileStrategy::ReleaseDate);
        let report = run_cycle(ctx, vec![x.clone()]).await.unwrap();
        assert_eq!(report.updates(), 0);
        assert!(x.update().is_none());
    }

    #[tokio::test]
    async fn hash_only_strategy_skips_installed_lookup() {
        let server = MockServer::start_async().await;
        let installed = server
            .mock_async(|when, then| {
                when.method(POST).path(INSTALLED_ENDPOINT);
                then.status(200).json_body(json!({}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(CANDIDATES_ENDPOINT);
                then.status(200).json_body(json!({
                    "h1": version("3.0.0", "2023-01-01T00:00:00Z", "h1-new")
                }));
            })
            .await;

        let x = digest("cloth-config", "h1");
        let ctx = context(&server, Arc::new(DeprecationFlag::new()), ReconcileStrategy::HashOnly);
        let report = run_cycle(ctx, vec![x.clone()]).await.unwrap();

        installed.assert_calls_async(0).await;
        assert_eq!(report.batch_updated, 1);
        assert_eq!(x.update().unwrap().version_number.as_deref(), Some("3.0.0"));
    }
}
