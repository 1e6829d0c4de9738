//! Persisted record of failed vendor browser runs, replayed on later runs.
//!
//! Each entry carries the generation it failed in (`retries`). A replay
//! walks generations `0, 1, 2, ...`: every vendor entry at the current
//! generation is re-run; a success drops every entry for that URL, a failure
//! adds a new entry at the next generation. Older entries stay put, so a URL
//! that keeps failing leaves one entry per generation behind.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::detector::host_matches;
use crate::models::FailedAttempt;
use crate::scheduler::run_bounded;
use crate::store::{read_array, write_array};

/// Totals from one replay.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub generations: u32,
    pub recovered: usize,
    pub still_failing: usize,
}

pub struct RetryLedger {
    path: PathBuf,
    max_retries: u32,
    vendor_domain: String,
}

impl RetryLedger {
    pub fn new(path: impl Into<PathBuf>, max_retries: u32, vendor_domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_retries,
            vendor_domain: vendor_domain.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry with a usable URL. A missing or unreadable ledger is
    /// empty.
    pub fn load_pending(&self) -> Vec<FailedAttempt> {
        read_array::<FailedAttempt>(&self.path)
            .into_iter()
            .filter(|attempt| !attempt.url.trim().is_empty())
            .collect()
    }

    pub fn save(&self, attempts: &[FailedAttempt]) -> Result<()> {
        write_array(&self.path, attempts)?;
        debug!("Saved {} failed attempts to {}", attempts.len(), self.path.display());
        Ok(())
    }

    /// Adds a run's failures to the ledger. Nothing is written when
    /// `attempts` is empty; an attempt already recorded for the same URL and
    /// generation is not added twice.
    pub fn merge(&self, attempts: &[FailedAttempt]) -> Result<()> {
        if attempts.is_empty() {
            return Ok(());
        }

        let mut ledger = self.load_pending();
        let mut seen: HashSet<(String, u32)> = ledger
            .iter()
            .map(|a| (a.url.clone(), a.retries))
            .collect();
        for attempt in attempts {
            if seen.insert((attempt.url.clone(), attempt.retries)) {
                ledger.push(attempt.clone());
            }
        }

        self.save(&ledger)?;
        info!("Failed attempts saved to {}", self.path.display());
        Ok(())
    }

    /// Re-runs pending vendor failures through `retry`, generation by
    /// generation, writing the ledger after each one. With nothing pending
    /// this does not touch the file.
    pub async fn replay<R, F, Fut>(&self, concurrency: usize, retry: F) -> Result<ReplaySummary>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut ledger = self.load_pending();
        let mut summary = ReplaySummary::default();

        for generation in 0..self.max_retries {
            let mut seen = HashSet::new();
            let due: Vec<String> = ledger
                .iter()
                .filter(|a| a.retries == generation && host_matches(&a.url, &self.vendor_domain))
                .map(|a| a.url.clone())
                .filter(|url| seen.insert(url.clone()))
                .collect();
            if due.is_empty() {
                break;
            }

            info!(
                "Retrying {} failed vendor pages (generation {})",
                due.len(),
                generation
            );
            summary.generations += 1;
            summary.still_failing = 0;

            for settled in run_bounded(due, concurrency, &retry).await {
                match settled.result {
                    Ok(_) => {
                        info!("Retry succeeded for {}", settled.item);
                        ledger.retain(|a| a.url != settled.item);
                        summary.recovered += 1;
                    }
                    Err(e) => {
                        warn!("Retry failed for {}: {:#}", settled.item, e);
                        let next = generation + 1;
                        if !ledger
                            .iter()
                            .any(|a| a.url == settled.item && a.retries == next)
                        {
                            ledger.push(FailedAttempt::new(settled.item, e.to_string(), next));
                        }
                        summary.still_failing += 1;
                    }
                }
            }

            self.save(&ledger)?;
        }

        if summary.generations > 0 {
            info!(
                "Retrying completed. {} recovered, {} still failing",
                summary.recovered, summary.still_failing
            );
        }
        Ok(summary)
    }
}
