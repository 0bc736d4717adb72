use std::collections::BTreeSet;

use regex::Regex;

use denylist_common::{Pull, PullIssueLink};

/// The two closing-reference forms maintainers use in pull bodies:
/// `Closes #42` and `Closes https://github.com/{owner}/{repo}/issues/42`.
#[derive(Debug, Clone)]
pub struct ClosingPatterns {
    short: Regex,
    long: Regex,
}

impl ClosingPatterns {
    pub fn new(owner: &str, repo: &str) -> Result<Self, regex::Error> {
        let short = Regex::new(r"Closes #(\d+)")?;
        // any single character may separate owner and repo
        let long = Regex::new(&format!(
            r"Closes https://github\.com/{}.{}/issues/(\d+)",
            regex::escape(owner),
            regex::escape(repo)
        ))?;
        Ok(Self { short, long })
    }

    /// Issue referenced by one line. The form with more matches on the line
    /// supplies its first match; ties go to the short form.
    pub fn issue_in_line(&self, line: &str) -> Option<i64> {
        let short = captured_numbers(&self.short, line);
        let long = captured_numbers(&self.long, line);
        let matches = if short.len() >= long.len() { short } else { long };
        matches.into_iter().next()
    }

    pub fn issues_in_body(&self, body: &str) -> Vec<i64> {
        body.lines().filter_map(|line| self.issue_in_line(line)).collect()
    }

    /// Distinct pull → issue links across all pulls, sorted.
    pub fn links(&self, pulls: &[Pull]) -> Vec<PullIssueLink> {
        let links: BTreeSet<PullIssueLink> = pulls
            .iter()
            .filter_map(|pull| pull.body.as_deref().map(|body| (pull.number, body)))
            .flat_map(|(pull, body)| {
                self.issues_in_body(body)
                    .into_iter()
                    .map(move |issue| PullIssueLink { pull, issue })
            })
            .collect();
        links.into_iter().collect()
    }
}

fn captured_numbers(pattern: &Regex, line: &str) -> Vec<i64> {
    pattern
        .captures_iter(line)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}
