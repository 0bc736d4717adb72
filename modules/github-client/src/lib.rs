pub mod error;
pub mod types;

pub use error::{GithubError, Result};
pub use types::{Issue, Label, PullRequest, User};

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.github.com";

/// Fixed page size for list endpoints (the API maximum).
pub const PER_PAGE: u32 = 100;

const USER_AGENT: &str = "denylist-tracker";

#[derive(Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    owner: String,
    repo: String,
}

impl GithubClient {
    /// `repository` is the `owner/name` slug, e.g. `helium/denylist`.
    pub fn new(token: String, repository: &str) -> Result<Self> {
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| GithubError::InvalidRepository(repository.to_string()))?;

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            token,
            base_url: BASE_URL.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// All issues in any state, optionally only those updated at or after `since`.
    /// Pull requests are included in the response, as the API returns them.
    pub async fn list_issues(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Issue>> {
        let since = since.map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true));
        tracing::info!(since = since.as_deref().unwrap_or("<all>"), "Listing issues");

        let issues = collect_pages(|page| self.get_page::<Issue>("issues", page, since.as_deref()))
            .await?;
        tracing::info!(count = issues.len(), "Fetched issues");
        Ok(issues)
    }

    /// All pull requests in any state. The pulls endpoint has no `since` filter.
    pub async fn list_pulls(&self) -> Result<Vec<PullRequest>> {
        tracing::info!("Listing pull requests");
        let pulls = collect_pages(|page| self.get_page::<PullRequest>("pulls", page, None)).await?;
        tracing::info!(count = pulls.len(), "Fetched pull requests");
        Ok(pulls)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        page: u32,
        since: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = format!(
            "{}/repos/{}/{}/{}",
            self.base_url, self.owner, self.repo, resource
        );

        let mut query: Vec<(&str, String)> = vec![
            ("state", "all".to_string()),
            ("page", page.to_string()),
            ("per_page", PER_PAGE.to_string()),
        ];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        tracing::debug!(resource, page, count = items.len(), "Fetched page");
        Ok(items)
    }
}

/// Request pages 1, 2, 3, ... until one comes back empty.
///
/// No upper bound on the total is assumed; a short page does not stop the
/// loop because the provider may still return items on the next page.
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch_page(page).await?;
        if batch.is_empty() {
            break;
        }
        items.extend(batch);
        page += 1;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn repository_slug_is_split() {
        let client = GithubClient::new("t".into(), "helium/denylist").unwrap();
        assert_eq!(client.owner(), "helium");
        assert_eq!(client.repo(), "denylist");
    }

    #[test]
    fn malformed_repository_is_rejected() {
        for slug in ["helium", "/denylist", "helium/", "a/b/c"] {
            assert!(
                matches!(
                    GithubClient::new("t".into(), slug),
                    Err(GithubError::InvalidRepository(_))
                ),
                "{slug} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn pagination_stops_at_first_empty_page() {
        let requested = RefCell::new(Vec::new());
        let items = collect_pages(|page| {
            requested.borrow_mut().push(page);
            async move {
                Ok(match page {
                    1 => vec![1, 2, 3],
                    2 => vec![4],
                    3 => vec![5, 6],
                    _ => vec![],
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(*requested.borrow(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn pagination_propagates_errors() {
        let result: Result<Vec<u8>> = collect_pages(|page| async move {
            if page == 2 {
                Err(GithubError::Api {
                    status: 502,
                    message: "bad gateway".into(),
                })
            } else {
                Ok(vec![1])
            }
        })
        .await;

        assert!(matches!(result, Err(GithubError::Api { status: 502, .. })));
    }

    #[test]
    fn issue_payload_deserializes() {
        let json = r####"{
            "number": 12,
            "title": "Add hotspots",
            "user": {"login": "alice"},
            "labels": [{"name": "addition"}, {"name": "triage"}],
            "state": "open",
            "created_at": "2022-08-01T10:00:00Z",
            "updated_at": "2022-08-02T10:00:00Z",
            "closed_at": null,
            "comments": 3,
            "body": "### Hotspot Name\n\nfoo",
            "reactions": {"+1": 2, "total_count": 2}
        }"####;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.number, 12);
        assert_eq!(issue.label_names(), vec!["addition", "triage"]);
        assert!(!issue.is_pull_request());
        assert_eq!(issue.reactions["+1"], 2);
    }

    #[test]
    fn pull_request_items_in_issue_listing_are_detected() {
        let json = r#"{
            "number": 13,
            "title": "Update denylist",
            "user": {"login": "bob"},
            "state": "closed",
            "created_at": "2022-08-01T10:00:00Z",
            "updated_at": "2022-08-02T10:00:00Z",
            "closed_at": "2022-08-02T10:00:00Z",
            "body": null,
            "pull_request": {"url": "https://api.github.com/repos/helium/denylist/pulls/13"}
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.is_pull_request());
        assert!(issue.labels.is_empty());
    }
}
