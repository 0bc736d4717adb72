// Postgres persistence for issues, entries, pulls and their links.
//
// Natural keys: issues(number), pulls(number), entries(address, issue_number),
// pull_issues(pull, issue). Issues and pulls are latest-wins on conflict;
// entries and links are insert-once.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use denylist_common::{
    AcceptedEntry, Entry, EntryRecord, Issue, IssueDetails, IssueSummary, IssueType, Pull,
    PullIssueLink, ReviewStatus, UserStats,
};

use crate::error::Result;
use crate::rows::{EntryRow, IssueDetailsRow, IssueSummaryRow, UserRow};

/// An issue with no entries, kept for re-parsing against a newer inventory.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UnparsedIssue {
    pub number: i64,
    pub body: Option<String>,
}

#[derive(Clone)]
pub struct DenylistStore {
    pool: PgPool,
}

impl DenylistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Polling writes ---

    /// Most recent `updated_at` across stored issues; `None` on an empty store.
    pub async fn latest_issue_update(&self) -> Result<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(updated_at) FROM issues",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    /// Insert or replace issues by number. `reports_generated` is never touched.
    pub async fn upsert_issues(&self, issues: &[Issue]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for issue in issues {
            let result = sqlx::query(
                r#"
                INSERT INTO issues
                    (number, title, author, labels, issue_type, state,
                     created_at, updated_at, closed_at, comments, body, reactions)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (number) DO UPDATE SET
                    title      = EXCLUDED.title,
                    author     = EXCLUDED.author,
                    labels     = EXCLUDED.labels,
                    issue_type = EXCLUDED.issue_type,
                    state      = EXCLUDED.state,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at,
                    closed_at  = EXCLUDED.closed_at,
                    comments   = EXCLUDED.comments,
                    body       = EXCLUDED.body,
                    reactions  = EXCLUDED.reactions
                "#,
            )
            .bind(issue.number)
            .bind(&issue.title)
            .bind(&issue.user)
            .bind(&issue.labels)
            .bind(issue.issue_type.as_str())
            .bind(issue.state.as_str())
            .bind(issue.created_at)
            .bind(issue.updated_at)
            .bind(issue.closed_at)
            .bind(issue.comments)
            .bind(&issue.body)
            .bind(&issue.reactions)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!(written, "Upserted issues");
        Ok(written)
    }

    /// Insert entries, leaving existing (address, issue) rows untouched so
    /// review status and report flags survive re-polling. Returns rows inserted.
    pub async fn insert_entries(&self, entries: &[Entry]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO entries
                    (address, issue_number, name, location, owner, payer, maker,
                     long_country, long_state, long_city, first_block)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (address, issue_number) DO NOTHING
                "#,
            )
            .bind(&entry.address)
            .bind(entry.issue_number)
            .bind(&entry.name)
            .bind(&entry.location)
            .bind(&entry.owner)
            .bind(&entry.payer)
            .bind(&entry.maker)
            .bind(&entry.long_country)
            .bind(&entry.long_state)
            .bind(&entry.long_city)
            .bind(entry.first_block)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(inserted, attempted = entries.len(), "Inserted entries");
        Ok(inserted)
    }

    /// Insert or replace pulls by number.
    pub async fn upsert_pulls(&self, pulls: &[Pull]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for pull in pulls {
            let result = sqlx::query(
                r#"
                INSERT INTO pulls
                    (number, title, author, state, created_at, updated_at, closed_at, body)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (number) DO UPDATE SET
                    title      = EXCLUDED.title,
                    author     = EXCLUDED.author,
                    state      = EXCLUDED.state,
                    created_at = EXCLUDED.created_at,
                    updated_at = EXCLUDED.updated_at,
                    closed_at  = EXCLUDED.closed_at,
                    body       = EXCLUDED.body
                "#,
            )
            .bind(pull.number)
            .bind(&pull.title)
            .bind(&pull.user)
            .bind(pull.state.as_str())
            .bind(pull.created_at)
            .bind(pull.updated_at)
            .bind(pull.closed_at)
            .bind(&pull.body)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!(written, "Upserted pulls");
        Ok(written)
    }

    /// Insert pull → issue links. Links to an issue or pull that is not
    /// stored (e.g. deleted upstream) are skipped. Returns rows inserted.
    pub async fn insert_pull_links(&self, links: &[PullIssueLink]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for link in links {
            let result = sqlx::query(
                r#"
                INSERT INTO pull_issues (pull, issue)
                SELECT $1, $2
                WHERE EXISTS (SELECT 1 FROM pulls WHERE number = $1)
                  AND EXISTS (SELECT 1 FROM issues WHERE number = $2)
                ON CONFLICT (pull, issue) DO NOTHING
                "#,
            )
            .bind(link.pull)
            .bind(link.issue)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(pull = link.pull, issue = link.issue, "Link not inserted");
            }
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    // --- Report bookkeeping ---

    /// Issues created after `since` whose reports are not yet generated.
    pub async fn issues_without_reports(&self, since: DateTime<Utc>) -> Result<Vec<i64>> {
        let rows = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT number FROM issues
            WHERE reports_generated IS NOT TRUE
              AND created_at > $1
            ORDER BY number ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Addresses recorded under an issue, in address order.
    pub async fn entry_addresses(&self, issue_number: i64) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT address FROM entries WHERE issue_number = $1 ORDER BY address",
        )
        .bind(issue_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn mark_entry_reported(&self, address: &str, issue_number: i64) -> Result<()> {
        sqlx::query(
            "UPDATE entries SET reports_generated = true WHERE address = $1 AND issue_number = $2",
        )
        .bind(address)
        .bind(issue_number)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_issue_reported(&self, issue_number: i64) -> Result<()> {
        sqlx::query("UPDATE issues SET reports_generated = true WHERE number = $1")
            .bind(issue_number)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Issues that produced no entries at all.
    pub async fn unparsed_issues(&self) -> Result<Vec<UnparsedIssue>> {
        let rows = sqlx::query_as::<_, UnparsedIssue>(
            r#"
            SELECT i.number, i.body
            FROM issues i
            WHERE NOT EXISTS (SELECT 1 FROM entries e WHERE e.issue_number = i.number)
            ORDER BY i.number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // --- Reads ---

    pub async fn issue_details(
        &self,
        number: i64,
        with_body: bool,
    ) -> Result<Option<IssueDetails>> {
        let row = sqlx::query_as::<_, IssueDetailsRow>(
            r#"
            SELECT
                i.number, i.title, i.author, i.labels, i.issue_type, i.state,
                i.created_at, i.updated_at, i.closed_at, i.comments,
                CASE WHEN $2 THEN i.body ELSE NULL END AS body,
                i.reactions,
                COALESCE((SELECT array_agg(pi.pull ORDER BY pi.pull)
                          FROM pull_issues pi JOIN pulls p ON p.number = pi.pull
                          WHERE p.state = 'open' AND pi.issue = i.number), '{}') AS open_pulls,
                COALESCE((SELECT array_agg(pi.pull ORDER BY pi.pull)
                          FROM pull_issues pi JOIN pulls p ON p.number = pi.pull
                          WHERE p.state = 'closed' AND pi.issue = i.number), '{}') AS closed_pulls
            FROM issues i
            WHERE i.number = $1
            "#,
        )
        .bind(number)
        .bind(with_body)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IssueDetails::try_from).transpose()
    }

    /// Entries with cross-references, optionally limited to one issue.
    pub async fn entries_table(&self, issue_number: Option<i64>) -> Result<Vec<EntryRecord>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT
                e.address, e.issue_number, e.reports_generated, e.review_status,
                e.name, e.location, e.owner, e.payer, e.maker,
                e.long_country, e.long_state, e.long_city, e.first_block,
                COALESCE((SELECT array_agg(DISTINCT e2.issue_number)
                          FROM entries e2
                          WHERE e2.issue_number <> e.issue_number
                            AND e2.address = e.address), '{}') AS other_mentioned_issues,
                COALESCE((SELECT array_agg(DISTINCT p.number)
                          FROM pulls p
                          JOIN pull_issues pi ON pi.pull = p.number
                          JOIN entries e2 ON e2.issue_number = pi.issue
                          WHERE e2.address = e.address AND p.state = 'open'), '{}') AS open_pulls,
                COALESCE((SELECT array_agg(DISTINCT p.number)
                          FROM pulls p
                          JOIN pull_issues pi ON pi.pull = p.number
                          JOIN entries e2 ON e2.issue_number = pi.issue
                          WHERE e2.address = e.address AND p.state = 'closed'), '{}') AS closed_pulls
            FROM entries e
            WHERE $1::BIGINT IS NULL OR e.issue_number = $1
            ORDER BY e.issue_number, e.address
            "#,
        )
        .bind(issue_number)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntryRecord::try_from).collect()
    }

    /// Issues with generated reports, newest first. `None` returns all.
    pub async fn issues_summary(&self, limit: Option<i64>) -> Result<Vec<IssueSummary>> {
        let rows = sqlx::query_as::<_, IssueSummaryRow>(
            r#"
            SELECT
                i.number, i.title, i.author, i.created_at, i.issue_type,
                (SELECT count(*) FROM entries e WHERE e.issue_number = i.number) AS n_entries,
                COALESCE((SELECT array_agg(pi.pull ORDER BY pi.pull)
                          FROM pull_issues pi JOIN pulls p ON p.number = pi.pull
                          WHERE p.state = 'open' AND pi.issue = i.number), '{}') AS open_pulls,
                COALESCE((SELECT array_agg(pi.pull ORDER BY pi.pull)
                          FROM pull_issues pi JOIN pulls p ON p.number = pi.pull
                          WHERE p.state = 'closed' AND pi.issue = i.number), '{}') AS closed_pulls
            FROM issues i
            WHERE i.reports_generated = true
            ORDER BY i.number DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IssueSummary::try_from).collect()
    }

    pub async fn user_stats(&self, login: &str) -> Result<Option<UserStats>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT login, last_issue, last_created_at, first_issue, first_created_at,
                   n_issues, n_closed_issues, n_additions_submitted, n_additions_closed,
                   n_removals_submitted, n_removals_closed
            FROM users
            WHERE login = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserStats::from))
    }

    // --- Operator edits ---

    /// Set an entry's review status. Returns false when no such entry exists.
    pub async fn update_review_status(
        &self,
        issue_number: i64,
        address: &str,
        status: ReviewStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entries SET review_status = $1 WHERE address = $2 AND issue_number = $3",
        )
        .bind(status.as_str())
        .bind(address)
        .bind(issue_number)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(issue = issue_number, address, status = %status, "Review status updated");
        }
        Ok(updated)
    }

    /// Entries reviewed as valid on open addition/removal issues.
    pub async fn accepted_entries(&self) -> Result<Vec<AcceptedEntry>> {
        let rows = sqlx::query_as::<_, (String, i64, String)>(
            r#"
            SELECT e.address, e.issue_number, i.issue_type
            FROM entries e
            JOIN issues i ON i.number = e.issue_number
            WHERE e.review_status = 'valid'
              AND i.state = 'open'
              AND i.issue_type IN ('addition', 'removal')
            ORDER BY e.issue_number, e.address
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(address, issue, issue_type)| -> Result<AcceptedEntry> {
                Ok(AcceptedEntry {
                    address,
                    issue,
                    issue_type: issue_type.parse::<IssueType>()?,
                })
            })
            .collect()
    }
}
