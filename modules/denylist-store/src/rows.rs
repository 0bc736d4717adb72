// Raw row shapes as Postgres returns them. Enum columns are TEXT and are
// parsed into the shared domain types on the way out.

use chrono::{DateTime, Utc};

use denylist_common::{
    Entry, EntryRecord, IssueDetails, IssueSummary, IssueState, IssueType, ReviewStatus, UserStats,
};

use crate::error::{Result, StoreError};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct IssueDetailsRow {
    pub number: i64,
    pub title: String,
    pub author: String,
    pub labels: Vec<String>,
    pub issue_type: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub comments: i32,
    pub body: Option<String>,
    pub reactions: serde_json::Value,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

impl TryFrom<IssueDetailsRow> for IssueDetails {
    type Error = StoreError;

    fn try_from(r: IssueDetailsRow) -> Result<Self> {
        Ok(IssueDetails {
            number: r.number,
            title: r.title,
            user: r.author,
            labels: r.labels,
            issue_type: r.issue_type.parse::<IssueType>()?,
            state: r.state.parse::<IssueState>()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
            closed_at: r.closed_at,
            comments: r.comments,
            body: r.body,
            reactions: r.reactions,
            open_pulls: r.open_pulls,
            closed_pulls: r.closed_pulls,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub address: String,
    pub issue_number: i64,
    pub reports_generated: bool,
    pub review_status: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub payer: Option<String>,
    pub maker: Option<String>,
    pub long_country: Option<String>,
    pub long_state: Option<String>,
    pub long_city: Option<String>,
    pub first_block: Option<i64>,
    pub other_mentioned_issues: Vec<i64>,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

impl TryFrom<EntryRow> for EntryRecord {
    type Error = StoreError;

    fn try_from(r: EntryRow) -> Result<Self> {
        Ok(EntryRecord {
            review_status: r.review_status.parse::<ReviewStatus>()?,
            reports_generated: r.reports_generated,
            other_mentioned_issues: r.other_mentioned_issues,
            open_pulls: r.open_pulls,
            closed_pulls: r.closed_pulls,
            entry: Entry {
                address: r.address,
                issue_number: r.issue_number,
                name: r.name,
                location: r.location,
                owner: r.owner,
                payer: r.payer,
                maker: r.maker,
                long_country: r.long_country,
                long_state: r.long_state,
                long_city: r.long_city,
                first_block: r.first_block,
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct IssueSummaryRow {
    pub number: i64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub issue_type: String,
    pub n_entries: i64,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

impl TryFrom<IssueSummaryRow> for IssueSummary {
    type Error = StoreError;

    fn try_from(r: IssueSummaryRow) -> Result<Self> {
        Ok(IssueSummary {
            number: r.number,
            title: r.title,
            user: r.author,
            created_at: r.created_at,
            issue_type: r.issue_type.parse::<IssueType>()?,
            n_entries: r.n_entries,
            open_pulls: r.open_pulls,
            closed_pulls: r.closed_pulls,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub login: String,
    pub last_issue: i64,
    pub last_created_at: DateTime<Utc>,
    pub first_issue: i64,
    pub first_created_at: DateTime<Utc>,
    pub n_issues: i64,
    pub n_closed_issues: i64,
    pub n_additions_submitted: i64,
    pub n_additions_closed: i64,
    pub n_removals_submitted: i64,
    pub n_removals_closed: i64,
}

impl From<UserRow> for UserStats {
    fn from(r: UserRow) -> Self {
        UserStats {
            user: r.login,
            last_issue: r.last_issue,
            last_created_at: r.last_created_at,
            first_issue: r.first_issue,
            first_created_at: r.first_created_at,
            n_issues: r.n_issues,
            n_closed_issues: r.n_closed_issues,
            n_additions_submitted: r.n_additions_submitted,
            n_additions_closed: r.n_additions_closed,
            n_removals_submitted: r.n_removals_submitted,
            n_removals_closed: r.n_removals_closed,
        }
    }
}
