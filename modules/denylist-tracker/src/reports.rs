//! Report generation for recently submitted issues.
//!
//! For each pending issue the block height at creation time pins the report
//! window, so the datasets describe the hotspots as they were when the issue
//! was filed. Artifacts are plain JSON under `issues/{n}/...`.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use denylist_common::{entry_dataset_key, issue_details_key, EntryReport};
use denylist_store::ArtifactStore;

use crate::traits::{DenylistRepository, Telemetry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStats {
    pub issues_completed: usize,
    pub entries_reported: usize,
    pub entries_skipped: usize,
}

pub struct ReportGenerator<'a> {
    repo: &'a dyn DenylistRepository,
    telemetry: &'a dyn Telemetry,
    artifacts: &'a ArtifactStore,
    window: Duration,
    block_window: i64,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        repo: &'a dyn DenylistRepository,
        telemetry: &'a dyn Telemetry,
        artifacts: &'a ArtifactStore,
        window_days: i64,
        block_window: i64,
    ) -> Self {
        Self {
            repo,
            telemetry,
            artifacts,
            window: Duration::days(window_days),
            block_window,
        }
    }

    /// Generate reports for every issue created within the window before
    /// `now` that is not yet complete.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReportStats> {
        let pending = self.repo.issues_without_reports(now - self.window).await?;
        info!(pending = pending.len(), "Generating reports");

        let mut stats = ReportStats::default();
        for issue in pending {
            let issue_stats = self.generate_issue(issue).await?;
            stats.issues_completed += 1;
            stats.entries_reported += issue_stats.entries_reported;
            stats.entries_skipped += issue_stats.entries_skipped;
        }
        Ok(stats)
    }

    /// Write the issue-level artifact and every entry report, then mark the
    /// issue complete. Addresses missing from the warehouse are skipped.
    pub async fn generate_issue(&self, issue: i64) -> Result<ReportStats> {
        info!(issue, "Processing issue");

        let details = self
            .repo
            .issue_details(issue)
            .await?
            .ok_or_else(|| anyhow!("issue #{issue} is not stored"))?;
        let max_block = self
            .telemetry
            .height_at(details.created_at)
            .await?
            .ok_or_else(|| anyhow!("no block found before issue #{issue} was created"))?;

        self.artifacts
            .put_json(&issue_details_key(issue), &details)
            .await?;

        let mut stats = ReportStats::default();
        for address in self.repo.entry_addresses(issue).await? {
            info!(issue, address = address.as_str(), "Processing address");
            match self.entry_report(&address, max_block).await? {
                Some(report) => {
                    for (dataset, body) in report.datasets()? {
                        self.artifacts
                            .put_json(&entry_dataset_key(issue, &address, dataset), &body)
                            .await?;
                    }
                    self.repo.mark_entry_reported(&address, issue).await?;
                    stats.entries_reported += 1;
                }
                None => {
                    warn!(issue, address = address.as_str(), "Hotspot not found in warehouse, skipping");
                    stats.entries_skipped += 1;
                }
            }
        }

        self.repo.mark_issue_reported(issue).await?;
        stats.issues_completed = 1;
        info!(
            issue,
            reported = stats.entries_reported,
            skipped = stats.entries_skipped,
            "Issue reports complete"
        );
        Ok(stats)
    }

    /// All five datasets for one address, or `None` when the warehouse has
    /// no hotspot row for it.
    async fn entry_report(&self, address: &str, max_block: i64) -> Result<Option<EntryReport>> {
        let Some(hotspot_details) = self.telemetry.hotspot_details(address).await? else {
            return Ok(None);
        };
        let window = self.block_window;

        Ok(Some(EntryReport {
            distance_vs_rssi: self
                .telemetry
                .distance_vs_rssi(address, max_block, window)
                .await?,
            witnessed_makers: self
                .telemetry
                .witnessed_makers(address, max_block, window)
                .await?,
            hotspot_details,
            witness_graph: self.telemetry.witness_graph(address, max_block, window).await?,
            rssi_vs_snr: self.telemetry.rssi_vs_snr(address, max_block, window).await?,
        }))
    }
}
