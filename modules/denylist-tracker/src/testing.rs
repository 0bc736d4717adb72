// Test mocks for the tracker pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockIssueSource (IssueSource): fixed issues and pulls, honours `since`
// - MockRepository (DenylistRepository): stateful in-memory store
// - MockTelemetry (Telemetry): inventory, block heights and per-address datasets
//
// Plus helpers for constructing GitHub payloads and inventory rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use denylist_common::{
    AcceptedEntry, DistanceVsRssi, Entry, HotspotDetails, InventoryRow, Issue, IssueDetails,
    IssueState, IssueType, Pull, PullIssueLink, ReviewStatus, RssiVsSnr, WitnessGraph,
    WitnessedMakers,
};
use denylist_store::UnparsedIssue;

use crate::traits::{DenylistRepository, IssueSource, Telemetry};

/// Fixed creation time used by the payload helpers.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 3, 1, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// MockIssueSource
// ---------------------------------------------------------------------------

/// Serves registered issues and pulls. `issues(since)` returns only items
/// updated at or after `since`, like the GitHub endpoint.
#[derive(Default)]
pub struct MockIssueSource {
    issues: Mutex<Vec<github_client::Issue>>,
    pulls: Mutex<Vec<github_client::PullRequest>>,
    since_calls: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl MockIssueSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issues(self, issues: Vec<github_client::Issue>) -> Self {
        *self.issues.lock().unwrap() = issues;
        self
    }

    pub fn with_pulls(self, pulls: Vec<github_client::PullRequest>) -> Self {
        *self.pulls.lock().unwrap() = pulls;
        self
    }

    /// Replace an issue (matched by number) or add it.
    pub fn update_issue(&self, issue: github_client::Issue) {
        let mut issues = self.issues.lock().unwrap();
        issues.retain(|i| i.number != issue.number);
        issues.push(issue);
    }

    /// `since` values passed to `issues()`, in call order.
    pub fn since_calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.since_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueSource for MockIssueSource {
    async fn issues(&self, since: Option<DateTime<Utc>>) -> Result<Vec<github_client::Issue>> {
        self.since_calls.lock().unwrap().push(since);
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|i| since.map_or(true, |s| i.updated_at >= s))
            .cloned()
            .collect())
    }

    async fn pulls(&self) -> Result<Vec<github_client::PullRequest>> {
        Ok(self.pulls.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MockRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredIssue {
    issue: Issue,
    reports_generated: bool,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: Entry,
    review_status: ReviewStatus,
    reports_generated: bool,
}

#[derive(Default)]
struct RepoState {
    issues: BTreeMap<i64, StoredIssue>,
    entries: BTreeMap<(i64, String), StoredEntry>,
    pulls: BTreeMap<i64, Pull>,
    links: BTreeSet<PullIssueLink>,
}

/// In-memory store with the same write semantics as the Postgres store:
/// issues and pulls are latest-wins, entries and links are insert-once,
/// links to unknown issues or pulls are dropped.
#[derive(Default)]
pub struct MockRepository {
    state: Mutex<RepoState>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, number: i64) -> Option<Issue> {
        let state = self.state.lock().unwrap();
        state.issues.get(&number).map(|s| s.issue.clone())
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().unwrap().issues.len()
    }

    pub fn issue_reported(&self, number: i64) -> bool {
        let state = self.state.lock().unwrap();
        state.issues.get(&number).is_some_and(|s| s.reports_generated)
    }

    pub fn entries(&self) -> Vec<Entry> {
        let state = self.state.lock().unwrap();
        state.entries.values().map(|s| s.entry.clone()).collect()
    }

    pub fn entry_reported(&self, address: &str, issue: i64) -> bool {
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(&(issue, address.to_string()))
            .is_some_and(|s| s.reports_generated)
    }

    pub fn set_review_status(&self, address: &str, issue: i64, status: ReviewStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.entries.get_mut(&(issue, address.to_string())) {
            stored.review_status = status;
        }
    }

    pub fn pull_count(&self) -> usize {
        self.state.lock().unwrap().pulls.len()
    }

    pub fn links(&self) -> Vec<PullIssueLink> {
        self.state.lock().unwrap().links.iter().copied().collect()
    }
}

#[async_trait]
impl DenylistRepository for MockRepository {
    async fn latest_issue_update(&self) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock().unwrap();
        Ok(state.issues.values().map(|s| s.issue.updated_at).max())
    }

    async fn upsert_issues(&self, issues: &[Issue]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        for issue in issues {
            let reports_generated = state
                .issues
                .get(&issue.number)
                .is_some_and(|s| s.reports_generated);
            state.issues.insert(
                issue.number,
                StoredIssue {
                    issue: issue.clone(),
                    reports_generated,
                },
            );
        }
        Ok(issues.len() as u64)
    }

    async fn insert_entries(&self, entries: &[Entry]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut inserted = 0;
        for entry in entries {
            let key = (entry.issue_number, entry.address.clone());
            if state.entries.contains_key(&key) {
                continue;
            }
            state.entries.insert(
                key,
                StoredEntry {
                    entry: entry.clone(),
                    review_status: ReviewStatus::NotReviewed,
                    reports_generated: false,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn upsert_pulls(&self, pulls: &[Pull]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        for pull in pulls {
            state.pulls.insert(pull.number, pull.clone());
        }
        Ok(pulls.len() as u64)
    }

    async fn insert_pull_links(&self, links: &[PullIssueLink]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut inserted = 0;
        for link in links {
            let known = state.pulls.contains_key(&link.pull) && state.issues.contains_key(&link.issue);
            if known && state.links.insert(*link) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn issues_without_reports(&self, since: DateTime<Utc>) -> Result<Vec<i64>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .issues
            .values()
            .filter(|s| !s.reports_generated && s.issue.created_at > since)
            .map(|s| s.issue.number)
            .collect())
    }

    async fn issue_details(&self, number: i64) -> Result<Option<IssueDetails>> {
        let state = self.state.lock().unwrap();
        let Some(stored) = state.issues.get(&number) else {
            return Ok(None);
        };
        let linked_pulls = |wanted: IssueState| -> Vec<i64> {
            state
                .links
                .iter()
                .filter(|l| l.issue == number)
                .filter(|l| state.pulls.get(&l.pull).is_some_and(|p| p.state == wanted))
                .map(|l| l.pull)
                .collect()
        };
        let issue = &stored.issue;
        Ok(Some(IssueDetails {
            number: issue.number,
            title: issue.title.clone(),
            user: issue.user.clone(),
            labels: issue.labels.clone(),
            issue_type: issue.issue_type,
            state: issue.state,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            closed_at: issue.closed_at,
            comments: issue.comments,
            body: None,
            reactions: issue.reactions.clone(),
            open_pulls: linked_pulls(IssueState::Open),
            closed_pulls: linked_pulls(IssueState::Closed),
        }))
    }

    async fn entry_addresses(&self, issue_number: i64) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .keys()
            .filter(|(issue, _)| *issue == issue_number)
            .map(|(_, address)| address.clone())
            .collect())
    }

    async fn mark_entry_reported(&self, address: &str, issue_number: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.entries.get_mut(&(issue_number, address.to_string())) {
            stored.reports_generated = true;
        }
        Ok(())
    }

    async fn mark_issue_reported(&self, issue_number: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.issues.get_mut(&issue_number) {
            stored.reports_generated = true;
        }
        Ok(())
    }

    async fn unparsed_issues(&self) -> Result<Vec<UnparsedIssue>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .issues
            .values()
            .filter(|s| !state.entries.keys().any(|(issue, _)| *issue == s.issue.number))
            .map(|s| UnparsedIssue {
                number: s.issue.number,
                body: s.issue.body.clone(),
            })
            .collect())
    }

    async fn accepted_entries(&self) -> Result<Vec<AcceptedEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .values()
            .filter(|s| s.review_status == ReviewStatus::Valid)
            .filter_map(|s| {
                let issue = &state.issues.get(&s.entry.issue_number)?.issue;
                let accepted = issue.state == IssueState::Open
                    && matches!(issue.issue_type, IssueType::Addition | IssueType::Removal);
                accepted.then(|| AcceptedEntry {
                    address: s.entry.address.clone(),
                    issue: issue.number,
                    issue_type: issue.issue_type,
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockTelemetry
// ---------------------------------------------------------------------------

/// Warehouse stand-in. Addresses without registered hotspot details are
/// "not found"; every other dataset falls back to an empty default.
#[derive(Default)]
pub struct MockTelemetry {
    inventory: Vec<InventoryRow>,
    blocks: Vec<(DateTime<Utc>, i64)>,
    details: HashMap<String, HotspotDetails>,
    graphs: HashMap<String, WitnessGraph>,
    queried: Mutex<Vec<(String, i64, i64)>>,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(mut self, rows: Vec<InventoryRow>) -> Self {
        self.inventory = rows;
        self
    }

    /// Register a block produced at `time`.
    pub fn with_block(mut self, time: DateTime<Utc>, height: i64) -> Self {
        self.blocks.push((time, height));
        self
    }

    pub fn with_hotspot(mut self, address: &str, details: HotspotDetails) -> Self {
        self.details.insert(address.to_string(), details);
        self
    }

    pub fn with_witness_graph(mut self, address: &str, graph: WitnessGraph) -> Self {
        self.graphs.insert(address.to_string(), graph);
        self
    }

    /// `(address, max_block, window)` for every windowed dataset query.
    pub fn queried_windows(&self) -> Vec<(String, i64, i64)> {
        self.queried.lock().unwrap().clone()
    }

    fn record(&self, address: &str, max_block: i64, window: i64) {
        self.queried
            .lock()
            .unwrap()
            .push((address.to_string(), max_block, window));
    }
}

#[async_trait]
impl Telemetry for MockTelemetry {
    async fn inventory(&self) -> Result<Vec<InventoryRow>> {
        Ok(self.inventory.clone())
    }

    async fn height_at(&self, timestamp: DateTime<Utc>) -> Result<Option<i64>> {
        Ok(self
            .blocks
            .iter()
            .filter(|(time, _)| *time < timestamp)
            .map(|(_, height)| *height)
            .max())
    }

    async fn distance_vs_rssi(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<DistanceVsRssi> {
        self.record(address, max_block, window);
        Ok(DistanceVsRssi::default())
    }

    async fn witnessed_makers(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessedMakers> {
        self.record(address, max_block, window);
        Ok(WitnessedMakers {
            as_of_block: max_block,
            ..Default::default()
        })
    }

    async fn hotspot_details(&self, address: &str) -> Result<Option<HotspotDetails>> {
        Ok(self.details.get(address).cloned())
    }

    async fn witness_graph(
        &self,
        address: &str,
        max_block: i64,
        window: i64,
    ) -> Result<WitnessGraph> {
        self.record(address, max_block, window);
        Ok(self.graphs.get(address).cloned().unwrap_or_default())
    }

    async fn rssi_vs_snr(&self, address: &str, max_block: i64, window: i64) -> Result<RssiVsSnr> {
        self.record(address, max_block, window);
        Ok(RssiVsSnr::default())
    }
}

/// A telemetry source that fails every call, for error-path tests.
pub struct FailingTelemetry;

#[async_trait]
impl Telemetry for FailingTelemetry {
    async fn inventory(&self) -> Result<Vec<InventoryRow>> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn height_at(&self, _timestamp: DateTime<Utc>) -> Result<Option<i64>> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn distance_vs_rssi(&self, _: &str, _: i64, _: i64) -> Result<DistanceVsRssi> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn witnessed_makers(&self, _: &str, _: i64, _: i64) -> Result<WitnessedMakers> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn hotspot_details(&self, _: &str) -> Result<Option<HotspotDetails>> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn witness_graph(&self, _: &str, _: i64, _: i64) -> Result<WitnessGraph> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }

    async fn rssi_vs_snr(&self, _: &str, _: i64, _: i64) -> Result<RssiVsSnr> {
        Err(anyhow!("FailingTelemetry: warehouse unavailable"))
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// An open issue from `submitter`, created and updated at [`t0`].
pub fn github_issue(number: i64, labels: &[&str], body: Option<&str>) -> github_client::Issue {
    github_client::Issue {
        number,
        title: format!("Denylist request {number}"),
        user: github_client::User {
            login: "submitter".to_string(),
        },
        labels: labels
            .iter()
            .map(|name| github_client::Label {
                name: name.to_string(),
            })
            .collect(),
        state: "open".to_string(),
        created_at: t0(),
        updated_at: t0(),
        closed_at: None,
        comments: 0,
        body: body.map(str::to_string),
        reactions: serde_json::json!({ "total_count": 0 }),
        pull_request: None,
    }
}

/// The issues endpoint's view of a pull request.
pub fn github_pull_item(number: i64) -> github_client::Issue {
    let mut item = github_issue(number, &[], Some("Closes #1"));
    item.pull_request = Some(serde_json::json!({
        "url": format!("https://api.github.com/repos/helium/denylist/pulls/{number}")
    }));
    item
}

pub fn github_pull(number: i64, state: &str, body: Option<&str>) -> github_client::PullRequest {
    github_client::PullRequest {
        number,
        title: format!("Denylist update {number}"),
        user: github_client::User {
            login: "maintainer".to_string(),
        },
        state: state.to_string(),
        created_at: t0(),
        updated_at: t0(),
        closed_at: None,
        body: body.map(str::to_string),
    }
}

pub fn inventory_row(address: &str, name: &str, first_block: i64) -> InventoryRow {
    InventoryRow {
        address: address.to_string(),
        name: Some(name.to_string()),
        location: Some("8c2ab38f1ee6dff".to_string()),
        owner: Some("14owner".to_string()),
        payer: None,
        maker: Some("Maker A".to_string()),
        long_country: Some("United States".to_string()),
        long_state: Some("California".to_string()),
        long_city: Some("San Francisco".to_string()),
        first_block: Some(first_block),
    }
}

pub fn hotspot_details(name: &str) -> HotspotDetails {
    HotspotDetails {
        name: Some(name.to_string()),
        owner: Some("14owner".to_string()),
        first_block: Some(100),
        last_block: Some(2_000),
        reward_scale: Some(0.5),
        elevation: Some(10),
        gain: Some(12),
        nonce: Some(1),
        maker: Some("Maker A".to_string()),
        country: Some("United States".to_string()),
        state: Some("California".to_string()),
        city: Some("San Francisco".to_string()),
        location: Some("8c2ab38f1ee6dff".to_string()),
        as_of_block: Some(2_000),
    }
}
