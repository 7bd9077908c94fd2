//! Run orchestration
//!
//! Load the store, harvest every source concurrently, classify, diff,
//! remember, persist. Source failures of any kind count as zero records;
//! only store failures end the run.

use chrono::{Local, NaiveDate};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::eligibility::ProofClassifier;
use crate::error::{FinderError, Result};
use crate::scrapers::{Harvest, SourceAdapter};
use crate::storage::{diff_new, DedupStore};
use crate::types::{ProofRequirement, Settlement, SourceKind};

/// How a source fared in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    /// Network failure, timeout or bad status
    Unavailable(String),
    /// The adapter crashed
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub status: SourceStatus,
    pub found: usize,
    pub eligible: usize,
    pub skipped_blocks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub sources: Vec<SourceReport>,
    pub found: usize,
    pub eligible: usize,
    pub proof_required: usize,
    pub proof_unknown: usize,
    /// No proof required, but the claim deadline has passed
    pub expired: usize,
    pub new: usize,
    pub known_before: usize,
    pub known_after: usize,
}

impl RunStats {
    pub fn filtered_out(&self) -> usize {
        self.found - self.eligible
    }

    pub fn sources_ok(&self) -> usize {
        self.sources.iter().filter(|s| s.status == SourceStatus::Ok).count()
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sources: {}/{} ok | Found: {} | Eligible: {} | Filtered out: {} | New: {} | Expired: {}",
            self.sources_ok(),
            self.sources.len(),
            self.found,
            self.eligible,
            self.filtered_out(),
            self.new,
            self.expired
        )?;
        for report in &self.sources {
            let status = match &report.status {
                SourceStatus::Ok => "ok".to_string(),
                SourceStatus::Unavailable(reason) => format!("unavailable ({})", reason),
                SourceStatus::Failed(reason) => format!("failed ({})", reason),
            };
            writeln!(
                f,
                "  - {}: {} | found {} | eligible {}",
                report.source, status, report.found, report.eligible
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub new_records: Vec<Settlement>,
    pub stats: RunStats,
}

pub struct Finder {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    classifier: ProofClassifier,
    client: Client,
    store_path: PathBuf,
    dry_run: bool,
}

impl Finder {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        classifier: ProofClassifier,
        client: Client,
        config: &Config,
    ) -> Self {
        Self {
            adapters,
            classifier,
            client,
            store_path: config.store_path.clone(),
            dry_run: config.dry_run,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        self.run_on(Local::now().date_naive()).await
    }

    /// Run with an explicit date for `first_seen` stamps and deadline checks
    pub async fn run_on(&self, today: NaiveDate) -> Result<RunOutcome> {
        // Corruption must surface before anything is fetched or written
        let mut store = DedupStore::load(&self.store_path)?;
        let known_before = store.len();
        info!(known = known_before, sources = self.adapters.len(), "starting run");

        let harvests = self.harvest_all().await;

        let mut stats = RunStats {
            known_before,
            ..Default::default()
        };
        let mut eligible: Vec<Settlement> = Vec::new();

        for (kind, harvest) in harvests {
            let (status, harvest) = match harvest {
                Ok(h) => (SourceStatus::Ok, h),
                Err(HarvestFailure::Unavailable(reason)) => {
                    (SourceStatus::Unavailable(reason), Harvest::default())
                }
                Err(HarvestFailure::Crashed(reason)) => (SourceStatus::Failed(reason), Harvest::default()),
            };

            let found = harvest.candidates.len();
            let mut source_eligible = 0;
            for candidate in harvest.candidates {
                let settlement = self.classifier.classify(candidate);
                match settlement.proof_required {
                    ProofRequirement::NotRequired if !settlement.is_open_on(today) => {
                        debug!(title = %settlement.title, "claim deadline passed");
                        stats.expired += 1;
                    }
                    ProofRequirement::NotRequired => {
                        source_eligible += 1;
                        eligible.push(settlement);
                    }
                    ProofRequirement::Required => stats.proof_required += 1,
                    ProofRequirement::Unknown => stats.proof_unknown += 1,
                }
            }

            info!(source = %kind, found, eligible = source_eligible, "source done");
            stats.found += found;
            stats.eligible += source_eligible;
            stats.sources.push(SourceReport {
                source: kind,
                status,
                found,
                eligible: source_eligible,
                skipped_blocks: harvest.skipped,
            });
        }

        let new_records = diff_new(&eligible, &store);
        stats.new = new_records.len();

        store.remember(&eligible, today);
        stats.known_after = store.len();

        if self.dry_run {
            info!(path = %store.path().display(), "dry run; store not written");
        } else {
            store.persist()?;
        }

        info!(
            found = stats.found,
            eligible = stats.eligible,
            new = stats.new,
            known = stats.known_after,
            "run complete"
        );

        Ok(RunOutcome { new_records, stats })
    }

    /// One task per adapter so a panic stays inside its source. Results keep
    /// adapter order.
    async fn harvest_all(&self) -> Vec<(SourceKind, std::result::Result<Harvest, HarvestFailure>)> {
        let tasks = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            let client = self.client.clone();
            let kind = adapter.kind();
            let handle = tokio::spawn(async move { adapter.extract(&client).await });
            async move {
                let result = match handle.await {
                    Ok(Ok(harvest)) => Ok(harvest),
                    Ok(Err(e)) => {
                        warn!(source = %kind, error = %e, "source unavailable");
                        Err(HarvestFailure::Unavailable(unavailable_reason(e)))
                    }
                    Err(join_err) => {
                        error!(source = %kind, error = %join_err, "source adapter crashed");
                        Err(HarvestFailure::Crashed(join_err.to_string()))
                    }
                };
                (kind, result)
            }
        });

        join_all(tasks).await
    }
}

enum HarvestFailure {
    Unavailable(String),
    Crashed(String),
}

fn unavailable_reason(e: FinderError) -> String {
    match e {
        FinderError::SourceUnavailable { reason, .. } => reason,
        other => other.to_string(),
    }
}
