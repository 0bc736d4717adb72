// Trait seams for the tracker pipeline.
//
// IssueSource: the upstream issue tracker (GitHub).
// DenylistRepository: the relational store the pipeline writes to.
// Telemetry: the read-only warehouse: inventory and report datasets.
//
// Production implementations wrap GithubClient, DenylistStore and Warehouse.
// Tests use the in-memory mocks in `testing`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use denylist_common::{
    AcceptedEntry, DistanceVsRssi, Entry, HotspotDetails, InventoryRow, Issue, IssueDetails,
    Pull, PullIssueLink, RssiVsSnr, WitnessGraph, WitnessedMakers,
};
use denylist_store::{DenylistStore, UnparsedIssue};
use denylist_warehouse::Warehouse;
use github_client::GithubClient;

// ---------------------------------------------------------------------------
// IssueSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IssueSource: Send + Sync {
    /// All issues (pull requests included, as GitHub returns them) updated
    /// at or after `since`, or every issue when `None`.
    async fn issues(&self, since: Option<DateTime<Utc>>) -> Result<Vec<github_client::Issue>>;

    async fn pulls(&self) -> Result<Vec<github_client::PullRequest>>;
}

#[async_trait]
impl IssueSource for GithubClient {
    async fn issues(&self, since: Option<DateTime<Utc>>) -> Result<Vec<github_client::Issue>> {
        Ok(self.list_issues(since).await?)
    }

    async fn pulls(&self) -> Result<Vec<github_client::PullRequest>> {
        Ok(self.list_pulls().await?)
    }
}

// ---------------------------------------------------------------------------
// DenylistRepository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DenylistRepository: Send + Sync {
    async fn latest_issue_update(&self) -> Result<Option<DateTime<Utc>>>;

    async fn upsert_issues(&self, issues: &[Issue]) -> Result<u64>;

    async fn insert_entries(&self, entries: &[Entry]) -> Result<u64>;

    async fn upsert_pulls(&self, pulls: &[Pull]) -> Result<u64>;

    async fn insert_pull_links(&self, links: &[PullIssueLink]) -> Result<u64>;

    async fn issues_without_reports(&self, since: DateTime<Utc>) -> Result<Vec<i64>>;

    /// Issue details without the body.
    async fn issue_details(&self, number: i64) -> Result<Option<IssueDetails>>;

    async fn entry_addresses(&self, issue_number: i64) -> Result<Vec<String>>;

    async fn mark_entry_reported(&self, address: &str, issue_number: i64) -> Result<()>;

    async fn mark_issue_reported(&self, issue_number: i64) -> Result<()>;

    async fn unparsed_issues(&self) -> Result<Vec<UnparsedIssue>>;

    async fn accepted_entries(&self) -> Result<Vec<AcceptedEntry>>;
}

#[async_trait]
impl DenylistRepository for DenylistStore {
    async fn latest_issue_update(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.latest_issue_update().await?)
    }

    async fn upsert_issues(&self, issues: &[Issue]) -> Result<u64> {
        Ok(self.upsert_issues(issues).await?)
    }

    async fn insert_entries(&self, entries: &[Entry]) -> Result<u64> {
        Ok(self.insert_entries(entries).await?)
    }

    async fn upsert_pulls(&self, pulls: &[Pull]) -> Result<u64> {
        Ok(self.upsert_pulls(pulls).await?)
    }

    async fn insert_pull_links(&self, links: &[PullIssueLink]) -> Result<u64> {
        Ok(self.insert_pull_links(links).await?)
    }

    async fn issues_without_reports(&self, since: DateTime<Utc>) -> Result<Vec<i64>> {
        Ok(self.issues_without_reports(since).await?)
    }

    async fn issue_details(&self, number: i64) -> Result<Option<IssueDetails>> {
        Ok(DenylistStore::issue_details(self, number, false).await?)
    }

    async fn entry_addresses(&self, issue_number: i64) -> Result<Vec<String>> {
        Ok(self.entry_addresses(issue_number).await?)
    }

    async fn mark_entry_reported(&self, address: &str, issue_number: i64) -> Result<()> {
        Ok(self.mark_entry_reported(address, issue_number).await?)
    }

    async fn mark_issue_reported(&self, issue_number: i64) -> Result<()> {
        Ok(self.mark_issue_reported(issue_number).await?)
    }

    async fn unparsed_issues(&self) -> Result<Vec<UnparsedIssue>> {
        Ok(self.unparsed_issues().await?)
    }

    async fn accepted_entries(&self) -> Result<Vec<AcceptedEntry>> {
        Ok(self.accepted_entries().await?)
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Telemetry: Send + Sync {
    async fn inventory(&self) -> Result<Vec<InventoryRow>>;

    /// Highest block strictly before `timestamp`.
    async fn height_at(&self, timestamp: DateTime<Utc>) -> Result<Option<i64>>;

    async fn distance_vs_rssi(&self, address: &str, max_block: i64, window: i64)
        -> Result<DistanceVsRssi>;

    async fn witnessed_makers(&self, address: &str, max_block: i64, window: i64)
        -> Result<WitnessedMakers>;

    async fn hotspot_details(&self, address: &str) -> Result<Option<HotspotDetails>>;

    async fn witness_graph(&self, address: &str, max_block: i64, window: i64)
        -> Result<WitnessGraph>;

    async fn rssi_vs_snr(&self, address: &str, max_block: i64, window: i64) -> Result<RssiVsSnr>;
}

#[async_trait]
impl Telemetry for Warehouse {
    async fn inventory(&self) -> Result<Vec<InventoryRow>> {
        Ok(self.inventory().await?)
    }

    async fn height_at(&self, timestamp: DateTime<Utc>) -> Result<Option<i64>> {
        Ok(self.height_at(timestamp).await?)
    }

    async fn distance_vs_rssi(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<DistanceVsRssi> {
        Ok(self.distance_vs_rssi(address, max_block, window).await?)
    }

    async fn witnessed_makers(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessedMakers> {
        Ok(self.witnessed_makers(address, max_block, window).await?)
    }

    async fn hotspot_details(&self, address: &str) -> Result<Option<HotspotDetails>> {
        Ok(self.hotspot_details(address).await?)
    }

    async fn witness_graph(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessGraph> {
        Ok(self.witness_graph(address, max_block, window).await?)
    }

    async fn rssi_vs_snr(&self, address: &str, max_block: i64, window: i64) -> Result<RssiVsSnr> {
        Ok(self.rssi_vs_snr(address, max_block, window).await?)
    }
}
