use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DenylistError;

// --- Enumerations ---

/// Kind of denylist change an issue requests, derived from its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Addition,
    Removal,
    Other,
}

impl IssueType {
    /// `addition` wins over `removal` when both labels are present.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        if labels.iter().any(|l| l.as_ref() == "addition") {
            IssueType::Addition
        } else if labels.iter().any(|l| l.as_ref() == "removal") {
            IssueType::Removal
        } else {
            IssueType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Addition => "addition",
            IssueType::Removal => "removal",
            IssueType::Other => "other",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = DenylistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "addition" => Ok(IssueType::Addition),
            "removal" => Ok(IssueType::Removal),
            "other" => Ok(IssueType::Other),
            other => Err(DenylistError::Validation(format!("unknown issue type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueState {
    type Err = DenylistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(IssueState::Open),
            "closed" => Ok(IssueState::Closed),
            other => Err(DenylistError::Validation(format!("unknown state: {other}"))),
        }
    }
}

/// Operator review outcome for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    NotReviewed,
    Valid,
    Invalid,
    Unknown,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::NotReviewed => "not_reviewed",
            ReviewStatus::Valid => "valid",
            ReviewStatus::Invalid => "invalid",
            ReviewStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = DenylistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_reviewed" => Ok(ReviewStatus::NotReviewed),
            "valid" => Ok(ReviewStatus::Valid),
            "invalid" => Ok(ReviewStatus::Invalid),
            "unknown" => Ok(ReviewStatus::Unknown),
            other => Err(DenylistError::Validation(format!("unknown review status: {other}"))),
        }
    }
}

// --- Tracker records ---

/// A denylist change request as polled from the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub title: String,
    pub user: String,
    pub labels: Vec<String>,
    pub issue_type: IssueType,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub comments: i32,
    pub body: Option<String>,
    pub reactions: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pull {
    pub number: i64,
    pub title: String,
    pub user: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
}

/// Pull request → issue edge extracted from a closing reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PullIssueLink {
    pub pull: i64,
    pub issue: i64,
}

// --- Inventory ---

/// One row of the external hotspot inventory, keyed by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub address: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub payer: Option<String>,
    pub maker: Option<String>,
    pub long_country: Option<String>,
    pub long_state: Option<String>,
    pub long_city: Option<String>,
    pub first_block: Option<i64>,
}

/// A resolved hotspot submission: point-in-time copy of the inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub address: String,
    pub issue_number: i64,
    pub name: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub payer: Option<String>,
    pub maker: Option<String>,
    pub long_country: Option<String>,
    pub long_state: Option<String>,
    pub long_city: Option<String>,
    pub first_block: Option<i64>,
}

impl Entry {
    pub fn from_inventory(issue_number: i64, row: &InventoryRow) -> Self {
        Self {
            address: row.address.clone(),
            issue_number,
            name: row.name.clone(),
            location: row.location.clone(),
            owner: row.owner.clone(),
            payer: row.payer.clone(),
            maker: row.maker.clone(),
            long_country: row.long_country.clone(),
            long_state: row.long_state.clone(),
            long_city: row.long_city.clone(),
            first_block: row.first_block,
        }
    }
}

// --- Read models ---

/// Issue row as served to reports and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub number: i64,
    pub title: String,
    pub user: String,
    pub labels: Vec<String>,
    pub issue_type: IssueType,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub comments: i32,
    pub body: Option<String>,
    pub reactions: serde_json::Value,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

/// Stored entry plus cross-references to other issues and linked pulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(flatten)]
    pub entry: Entry,
    pub review_status: ReviewStatus,
    pub reports_generated: bool,
    pub other_mentioned_issues: Vec<i64>,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: i64,
    pub title: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub issue_type: IssueType,
    pub n_entries: i64,
    pub open_pulls: Vec<i64>,
    pub closed_pulls: Vec<i64>,
}

/// Per-submitter counts from the `users` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user: String,
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

/// An entry the operator accepted for the next denylist pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedEntry {
    pub address: String,
    pub issue: i64,
    pub issue_type: IssueType,
}
