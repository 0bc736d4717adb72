// Denylist export: the updated list file plus a pull request message that
// closes the accepted issues.

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use denylist_common::{AcceptedEntry, IssueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    #[default]
    Full,
    Additions,
    Removals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenylistExport {
    pub kind: ExportKind,
    pub denylist: String,
    pub pr_message: String,
}

/// Addresses from the published denylist file. Entries are separated by
/// commas, newlines or both.
pub fn parse_denylist_csv(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn fetch_current_denylist(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let addresses = parse_denylist_csv(&text);
    info!(url, addresses = addresses.len(), "Fetched current denylist");
    Ok(addresses)
}

/// `(current ∪ additions) \ removals` without duplicates. Current order is
/// kept, new additions follow in acceptance order.
pub fn updated_denylist(current: &[String], accepted: &[AcceptedEntry]) -> Vec<String> {
    let removals: HashSet<&str> = addresses_of(accepted, IssueType::Removal).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    current
        .iter()
        .map(String::as_str)
        .chain(addresses_of(accepted, IssueType::Addition))
        .filter(|a| !removals.contains(a) && seen.insert(*a))
        .map(str::to_string)
        .collect()
}

/// `Closes #N` once per distinct issue, ascending.
pub fn pr_message(issues: impl IntoIterator<Item = i64>) -> String {
    issues
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|issue| format!("Closes #{issue}\n"))
        .collect()
}

pub fn export(kind: ExportKind, current: &[String], accepted: &[AcceptedEntry]) -> DenylistExport {
    match kind {
        ExportKind::Full => full_export(current, accepted),
        ExportKind::Additions => partial_export(ExportKind::Additions, IssueType::Addition, accepted),
        ExportKind::Removals => partial_export(ExportKind::Removals, IssueType::Removal, accepted),
    }
}

/// The complete updated list, one address per line.
pub fn full_export(current: &[String], accepted: &[AcceptedEntry]) -> DenylistExport {
    let denylist = updated_denylist(current, accepted)
        .into_iter()
        .map(|a| a + "\n")
        .collect();
    DenylistExport {
        kind: ExportKind::Full,
        denylist,
        pr_message: pr_message(accepted.iter().map(|e| e.issue)),
    }
}

// Only the addresses of one kind, joined with ",\n", for pasting into the
// published file.
fn partial_export(kind: ExportKind, issue_type: IssueType, accepted: &[AcceptedEntry]) -> DenylistExport {
    let addresses: Vec<&str> = addresses_of(accepted, issue_type).collect();
    DenylistExport {
        kind,
        denylist: addresses.join(",\n"),
        pr_message: pr_message(
            accepted
                .iter()
                .filter(|e| e.issue_type == issue_type)
                .map(|e| e.issue),
        ),
    }
}

fn addresses_of(accepted: &[AcceptedEntry], issue_type: IssueType) -> impl Iterator<Item = &str> {
    accepted
        .iter()
        .filter(move |e| e.issue_type == issue_type)
        .map(|e| e.address.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(address: &str, issue: i64, issue_type: IssueType) -> AcceptedEntry {
        AcceptedEntry {
            address: address.to_string(),
            issue,
            issue_type,
        }
    }

    fn current() -> Vec<String> {
        parse_denylist_csv("11aaa,\n11bbb,\n11ccc,\n")
    }

    #[test]
    fn csv_parsing_accepts_commas_and_newlines() {
        assert_eq!(current(), vec!["11aaa", "11bbb", "11ccc"]);
        assert_eq!(parse_denylist_csv("11a\n11b\r\n11c,11d"), vec!["11a", "11b", "11c", "11d"]);
        assert!(parse_denylist_csv("").is_empty());
    }

    #[test]
    fn update_is_union_minus_removals_without_duplicates() {
        let accepted = vec![
            accepted("11ddd", 20, IssueType::Addition),
            accepted("11aaa", 21, IssueType::Addition),
            accepted("11bbb", 22, IssueType::Removal),
            accepted("11ddd", 23, IssueType::Addition),
            accepted("11eee", 24, IssueType::Removal),
        ];
        assert_eq!(
            updated_denylist(&current(), &accepted),
            vec!["11aaa", "11ccc", "11ddd"]
        );
    }

    #[test]
    fn removal_wins_over_addition_of_same_address() {
        let accepted = vec![
            accepted("11zzz", 1, IssueType::Addition),
            accepted("11zzz", 2, IssueType::Removal),
        ];
        assert_eq!(updated_denylist(&current(), &accepted), vec!["11aaa", "11bbb", "11ccc"]);
    }

    #[test]
    fn full_export_lists_one_address_per_line() {
        let accepted = vec![
            accepted("11ddd", 31, IssueType::Addition),
            accepted("11ccc", 30, IssueType::Removal),
            accepted("11fff", 31, IssueType::Addition),
        ];
        let out = full_export(&current(), &accepted);
        assert_eq!(out.denylist, "11aaa\n11bbb\n11ddd\n11fff\n");
        assert_eq!(out.pr_message, "Closes #30\nCloses #31\n");
    }

    #[test]
    fn partial_exports_cover_one_kind() {
        let accepted = vec![
            accepted("11ddd", 40, IssueType::Addition),
            accepted("11ccc", 41, IssueType::Removal),
            accepted("11eee", 42, IssueType::Addition),
        ];
        let additions = export(ExportKind::Additions, &current(), &accepted);
        assert_eq!(additions.denylist, "11ddd,\n11eee");
        assert_eq!(additions.pr_message, "Closes #40\nCloses #42\n");

        let removals = export(ExportKind::Removals, &current(), &accepted);
        assert_eq!(removals.denylist, "11ccc");
        assert_eq!(removals.pr_message, "Closes #41\n");
    }

    #[test]
    fn empty_acceptance_reproduces_current_list() {
        let out = full_export(&current(), &[]);
        assert_eq!(out.denylist, "11aaa\n11bbb\n11ccc\n");
        assert_eq!(out.pr_message, "");
    }
}
