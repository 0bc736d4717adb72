//! Pipeline tests: polling, reconciliation, links, reports and export run
//! end to end against the in-memory mocks.

use chrono::Duration;

use denylist_common::{entry_dataset_key, issue_details_key, IssueState, ReviewStatus, ENTRY_DATASETS};
use denylist_store::ArtifactStore;
use denylist_tracker::export::{export, ExportKind};
use denylist_tracker::links::ClosingPatterns;
use denylist_tracker::poll::Poller;
use denylist_tracker::reports::ReportGenerator;
use denylist_tracker::testing::{
    github_issue, github_pull, github_pull_item, hotspot_details, inventory_row, t0,
    FailingTelemetry, MockIssueSource, MockRepository, MockTelemetry,
};
use denylist_tracker::traits::DenylistRepository;

const BLOCK_WINDOW: i64 = 43_200;

fn closing() -> ClosingPatterns {
    ClosingPatterns::new("helium", "denylist").unwrap()
}

fn addresses_body(addresses: &[&str]) -> String {
    format!("### Hotspot B58 Address(es)\n\n{}\n", addresses.join("\n"))
}

fn telemetry() -> MockTelemetry {
    MockTelemetry::new()
        .with_inventory(vec![
            inventory_row("11aaa", "angry-purple-tiger", 1_000),
            inventory_row("11bbb", "silly-blue-fox", 1_100),
            inventory_row("11ccc", "odd-green-owl", 1_200),
        ])
        .with_block(t0() - Duration::hours(2), 1_499_000)
        .with_block(t0() - Duration::minutes(1), 1_500_000)
        .with_block(t0() + Duration::minutes(1), 1_500_001)
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_submitted_address_becomes_one_entry() {
    let body = addresses_body(&["11aaa", "11bbb", "11ccc"]);
    let source = MockIssueSource::new().with_issues(vec![github_issue(1, &["addition"], Some(&body))]);
    let repo = MockRepository::new();
    let telemetry = telemetry();

    let stats = Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    assert_eq!(stats.issues_fetched, 1);
    assert_eq!(stats.entries_found, 3);
    assert_eq!(stats.entries_inserted, 3);

    let entries = repo.entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.issue_number == 1));
    assert_eq!(entries[0].name.as_deref(), Some("angry-purple-tiger"));
    assert_eq!(entries[0].first_block, Some(1_000));
}

#[tokio::test]
async fn unknown_name_stores_issue_without_entries() {
    let body = "### Hotspot Name\n\nNonexistent Hotspot Name\n";
    let source = MockIssueSource::new().with_issues(vec![github_issue(2, &["addition"], Some(body))]);
    let repo = MockRepository::new();
    let telemetry = telemetry();

    let stats = Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    assert_eq!(stats.entries_inserted, 0);
    assert_eq!(repo.issue_count(), 1);
    assert!(repo.entries().is_empty());
}

#[tokio::test]
async fn repeated_poll_changes_nothing_and_resumes_from_latest_update() {
    let body = addresses_body(&["11aaa", "11bbb"]);
    let source = MockIssueSource::new()
        .with_issues(vec![github_issue(3, &["addition"], Some(&body))])
        .with_pulls(vec![github_pull(100, "open", Some("Closes #3"))]);
    let repo = MockRepository::new();
    let telemetry = telemetry();
    let poller = Poller::new(&source, &repo, &telemetry, closing());

    let first = poller.run().await.unwrap();
    let second = poller.run().await.unwrap();

    assert_eq!(first.entries_inserted, 2);
    assert_eq!(first.links_inserted, 1);
    assert_eq!(second.entries_inserted, 0);
    assert_eq!(second.links_inserted, 0);
    assert_eq!(repo.issue_count(), 1);
    assert_eq!(repo.entries().len(), 2);
    assert_eq!(repo.links().len(), 1);
    assert_eq!(source.since_calls(), vec![None, Some(t0())]);
}

#[tokio::test]
async fn updated_issue_replaces_stored_row() {
    let source = MockIssueSource::new().with_issues(vec![github_issue(4, &["addition"], None)]);
    let repo = MockRepository::new();
    let telemetry = telemetry();
    let poller = Poller::new(&source, &repo, &telemetry, closing());
    poller.run().await.unwrap();

    let mut closed = github_issue(4, &["removal"], None);
    closed.state = "closed".to_string();
    closed.updated_at = t0() + Duration::days(1);
    closed.closed_at = Some(closed.updated_at);
    source.update_issue(closed);
    poller.run().await.unwrap();

    let stored = repo.issue(4).unwrap();
    assert_eq!(stored.state, IssueState::Closed);
    assert_eq!(stored.labels, vec!["removal".to_string()]);
    assert_eq!(repo.issue_count(), 1);
}

#[tokio::test]
async fn pull_request_items_are_not_stored_as_issues() {
    let source = MockIssueSource::new().with_issues(vec![
        github_issue(5, &["addition"], Some(&addresses_body(&["11aaa"]))),
        github_pull_item(6),
    ]);
    let repo = MockRepository::new();
    let telemetry = telemetry();

    let stats = Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    assert_eq!(stats.pull_requests_skipped, 1);
    assert_eq!(stats.issues_fetched, 1);
    assert!(repo.issue(6).is_none());
}

#[tokio::test]
async fn closing_references_link_pulls_to_known_issues() {
    let source = MockIssueSource::new()
        .with_issues(vec![
            github_issue(42, &["addition"], None),
            github_issue(43, &["removal"], None),
        ])
        .with_pulls(vec![
            github_pull(
                100,
                "open",
                Some("Closes #42\nCloses https://github.com/helium/denylist/issues/43\nCloses #99"),
            ),
            github_pull(101, "closed", None),
        ]);
    let repo = MockRepository::new();
    let telemetry = telemetry();

    let stats = Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    assert_eq!(stats.pulls_fetched, 2);
    assert_eq!(stats.links_found, 3);
    assert_eq!(stats.links_inserted, 2);
    assert_eq!(repo.pull_count(), 2);

    let linked: Vec<(i64, i64)> = repo.links().iter().map(|l| (l.pull, l.issue)).collect();
    assert_eq!(linked, vec![(100, 42), (100, 43)]);

    let details = repo.issue_details(42).await.unwrap().unwrap();
    assert_eq!(details.open_pulls, vec![100]);
    assert!(details.closed_pulls.is_empty());
}

#[tokio::test]
async fn warehouse_failure_aborts_before_any_write() {
    let source = MockIssueSource::new().with_issues(vec![github_issue(7, &["addition"], None)]);
    let repo = MockRepository::new();

    let result = Poller::new(&source, &repo, &FailingTelemetry, closing()).run().await;

    assert!(result.is_err());
    assert_eq!(repo.issue_count(), 0);
}

#[tokio::test]
async fn reparse_resolves_issues_once_inventory_catches_up() {
    let body = "### Hotspot Name\n\nBrave Red Lynx\n";
    let source = MockIssueSource::new().with_issues(vec![github_issue(8, &["addition"], Some(body))]);
    let repo = MockRepository::new();
    Poller::new(&source, &repo, &telemetry(), closing()).run().await.unwrap();
    assert!(repo.entries().is_empty());

    let newer = telemetry().with_inventory(vec![inventory_row("11ddd", "brave-red-lynx", 2_000)]);
    let stats = Poller::new(&source, &repo, &newer, closing()).reparse().await.unwrap();

    assert_eq!(stats.issues_checked, 1);
    assert_eq!(stats.entries_inserted, 1);
    assert_eq!(repo.entries()[0].address, "11ddd");
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reports_skip_addresses_missing_from_warehouse() {
    let source = MockIssueSource::new().with_issues(vec![github_issue(
        50,
        &["addition"],
        Some(&addresses_body(&["11aaa", "11bbb"])),
    )]);
    let repo = MockRepository::new();
    let telemetry = telemetry().with_hotspot("11aaa", hotspot_details("angry-purple-tiger"));
    Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    let artifacts = ArtifactStore::in_memory();
    let generator = ReportGenerator::new(&repo, &telemetry, &artifacts, 14, BLOCK_WINDOW);
    let stats = generator.run(t0() + Duration::days(1)).await.unwrap();

    assert_eq!(stats.issues_completed, 1);
    assert_eq!(stats.entries_reported, 1);
    assert_eq!(stats.entries_skipped, 1);

    assert!(artifacts.exists(&issue_details_key(50)).await.unwrap());
    for dataset in ENTRY_DATASETS {
        assert!(artifacts.exists(&entry_dataset_key(50, "11aaa", dataset)).await.unwrap());
        assert!(!artifacts.exists(&entry_dataset_key(50, "11bbb", dataset)).await.unwrap());
    }

    assert!(repo.issue_reported(50));
    assert!(repo.entry_reported("11aaa", 50));
    assert!(!repo.entry_reported("11bbb", 50));

    // The report window ends at the last block before the issue was created.
    let windows = telemetry.queried_windows();
    assert_eq!(windows.len(), 4);
    assert!(windows
        .iter()
        .all(|w| *w == ("11aaa".to_string(), 1_500_000, BLOCK_WINDOW)));

    let details: serde_json::Value = artifacts.get_json(&issue_details_key(50)).await.unwrap();
    assert_eq!(details["number"], 50);
    assert!(details["body"].is_null());

    let rerun = generator.run(t0() + Duration::days(1)).await.unwrap();
    assert_eq!(rerun.issues_completed, 0);
}

#[tokio::test]
async fn issues_outside_window_are_not_reported() {
    let source = MockIssueSource::new().with_issues(vec![github_issue(
        51,
        &["addition"],
        Some(&addresses_body(&["11aaa"])),
    )]);
    let repo = MockRepository::new();
    let telemetry = telemetry().with_hotspot("11aaa", hotspot_details("angry-purple-tiger"));
    Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    let artifacts = ArtifactStore::in_memory();
    let stats = ReportGenerator::new(&repo, &telemetry, &artifacts, 14, BLOCK_WINDOW)
        .run(t0() + Duration::days(30))
        .await
        .unwrap();

    assert_eq!(stats.issues_completed, 0);
    assert!(!repo.issue_reported(51));
    assert!(!artifacts.exists(&issue_details_key(51)).await.unwrap());
}

#[tokio::test]
async fn issue_without_earlier_block_stays_pending() {
    let source = MockIssueSource::new().with_issues(vec![github_issue(
        52,
        &["addition"],
        Some(&addresses_body(&["11aaa"])),
    )]);
    let repo = MockRepository::new();
    let telemetry = MockTelemetry::new()
        .with_inventory(vec![inventory_row("11aaa", "angry-purple-tiger", 1_000)])
        .with_hotspot("11aaa", hotspot_details("angry-purple-tiger"));
    Poller::new(&source, &repo, &telemetry, closing()).run().await.unwrap();

    let artifacts = ArtifactStore::in_memory();
    let result = ReportGenerator::new(&repo, &telemetry, &artifacts, 14, BLOCK_WINDOW)
        .generate_issue(52)
        .await;

    assert!(result.is_err());
    assert!(!repo.issue_reported(52));
    assert!(!repo.entry_reported("11aaa", 52));
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_applies_accepted_additions_and_removals() {
    let mut closed = github_issue(62, &["addition"], Some(&addresses_body(&["11ccc"])));
    closed.state = "closed".to_string();
    let source = MockIssueSource::new().with_issues(vec![
        github_issue(60, &["addition"], Some(&addresses_body(&["11aaa", "11bbb"]))),
        github_issue(61, &["removal"], Some(&addresses_body(&["11ccc"]))),
        closed,
    ]);
    let repo = MockRepository::new();
    Poller::new(&source, &repo, &telemetry(), closing()).run().await.unwrap();

    repo.set_review_status("11aaa", 60, ReviewStatus::Valid);
    repo.set_review_status("11bbb", 60, ReviewStatus::Invalid);
    repo.set_review_status("11ccc", 61, ReviewStatus::Valid);
    repo.set_review_status("11ccc", 62, ReviewStatus::Valid);

    let accepted = repo.accepted_entries().await.unwrap();
    assert_eq!(accepted.len(), 2);

    let current = vec!["11ccc".to_string(), "11zzz".to_string()];
    let full = export(ExportKind::Full, &current, &accepted);
    assert_eq!(full.denylist, "11zzz\n11aaa\n");
    assert_eq!(full.pr_message, "Closes #60\nCloses #61\n");

    let removals = export(ExportKind::Removals, &current, &accepted);
    assert_eq!(removals.denylist, "11ccc");
    assert_eq!(removals.pr_message, "Closes #61\n");
}
