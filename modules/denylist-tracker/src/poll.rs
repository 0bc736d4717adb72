//! Incremental polling: GitHub issues and pulls into the denylist store.
//!
//! Stage order within one run:
//! inventory → issues → parse/reconcile → upsert issues → insert entries
//! → pulls → closing-reference links → upsert pulls → insert links.
//!
//! Every write is idempotent, so a run interrupted at any stage is simply
//! repeated by the next invocation.

use anyhow::{Context, Result};
use tracing::{debug, info};

use denylist_common::{Entry, Issue, IssueState, IssueType, Pull};

use crate::inventory::Inventory;
use crate::links::ClosingPatterns;
use crate::reconcile::entries_from_body;
use crate::traits::{DenylistRepository, IssueSource, Telemetry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStats {
    pub issues_fetched: usize,
    pub pull_requests_skipped: usize,
    pub entries_found: usize,
    pub entries_inserted: u64,
    pub pulls_fetched: usize,
    pub links_found: usize,
    pub links_inserted: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReparseStats {
    pub issues_checked: usize,
    pub entries_inserted: u64,
}

pub struct Poller<'a> {
    source: &'a dyn IssueSource,
    repo: &'a dyn DenylistRepository,
    telemetry: &'a dyn Telemetry,
    closing: ClosingPatterns,
}

impl<'a> Poller<'a> {
    pub fn new(
        source: &'a dyn IssueSource,
        repo: &'a dyn DenylistRepository,
        telemetry: &'a dyn Telemetry,
        closing: ClosingPatterns,
    ) -> Self {
        Self {
            source,
            repo,
            telemetry,
            closing,
        }
    }

    pub async fn run(&self) -> Result<PollStats> {
        let mut stats = PollStats::default();

        let inventory = self.load_inventory().await?;

        let since = self.repo.latest_issue_update().await?;
        info!(since = ?since, "Fetching issues");
        let raw = self.source.issues(since).await?;

        let (pull_items, raw): (Vec<_>, Vec<_>) =
            raw.into_iter().partition(github_client::Issue::is_pull_request);
        stats.pull_requests_skipped = pull_items.len();

        let issues = raw
            .into_iter()
            .map(issue_from_github)
            .collect::<Result<Vec<_>>>()?;
        stats.issues_fetched = issues.len();

        let entries: Vec<Entry> = issues
            .iter()
            .flat_map(|issue| entries_from_body(issue.number, issue.body.as_deref(), &inventory))
            .collect();
        stats.entries_found = entries.len();

        self.repo.upsert_issues(&issues).await?;
        stats.entries_inserted = self.repo.insert_entries(&entries).await?;
        info!(
            issues = stats.issues_fetched,
            skipped_pull_requests = stats.pull_requests_skipped,
            entries = stats.entries_found,
            inserted = stats.entries_inserted,
            "Issues stored"
        );

        let pulls = self
            .source
            .pulls()
            .await?
            .into_iter()
            .map(pull_from_github)
            .collect::<Result<Vec<_>>>()?;
        stats.pulls_fetched = pulls.len();

        let links = self.closing.links(&pulls);
        stats.links_found = links.len();

        self.repo.upsert_pulls(&pulls).await?;
        stats.links_inserted = self.repo.insert_pull_links(&links).await?;
        info!(
            pulls = stats.pulls_fetched,
            links = stats.links_found,
            inserted = stats.links_inserted,
            "Pulls stored"
        );

        Ok(stats)
    }

    /// Re-run parsing and reconciliation for issues that have no entries,
    /// against the current inventory.
    pub async fn reparse(&self) -> Result<ReparseStats> {
        let inventory = self.load_inventory().await?;
        let unparsed = self.repo.unparsed_issues().await?;

        let entries: Vec<Entry> = unparsed
            .iter()
            .flat_map(|issue| entries_from_body(issue.number, issue.body.as_deref(), &inventory))
            .collect();
        let inserted = self.repo.insert_entries(&entries).await?;

        info!(issues = unparsed.len(), inserted, "Re-parsed issues without entries");
        Ok(ReparseStats {
            issues_checked: unparsed.len(),
            entries_inserted: inserted,
        })
    }

    async fn load_inventory(&self) -> Result<Inventory> {
        let inventory = Inventory::new(self.telemetry.inventory().await?);
        debug!(rows = inventory.len(), "Inventory loaded");
        Ok(inventory)
    }
}

pub fn issue_from_github(raw: github_client::Issue) -> Result<Issue> {
    let labels = raw.label_names();
    let state = raw
        .state
        .parse::<IssueState>()
        .with_context(|| format!("issue #{}", raw.number))?;

    Ok(Issue {
        number: raw.number,
        title: raw.title,
        user: raw.user.login,
        issue_type: IssueType::from_labels(&labels),
        labels,
        state,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        closed_at: raw.closed_at,
        comments: raw.comments,
        body: raw.body,
        reactions: raw.reactions,
    })
}

pub fn pull_from_github(raw: github_client::PullRequest) -> Result<Pull> {
    let state = raw
        .state
        .parse::<IssueState>()
        .with_context(|| format!("pull #{}", raw.number))?;

    Ok(Pull {
        number: raw.number,
        title: raw.title,
        user: raw.user.login,
        state,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        closed_at: raw.closed_at,
        body: raw.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{github_issue, github_pull};

    #[test]
    fn labels_drive_issue_type() {
        let issue = issue_from_github(github_issue(3, &["removal", "bug"], Some("body"))).unwrap();
        assert_eq!(issue.issue_type, IssueType::Removal);
        assert_eq!(issue.labels, vec!["removal".to_string(), "bug".to_string()]);
        assert_eq!(issue.user, "submitter");
        assert_eq!(issue.state, IssueState::Open);
    }

    #[test]
    fn unknown_state_is_an_error() {
        let mut raw = github_pull(5, "open", None);
        raw.state = "merged".to_string();
        let err = pull_from_github(raw).unwrap_err();
        assert!(err.to_string().contains("pull #5"));
    }
}
