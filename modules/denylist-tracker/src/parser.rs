// Issue-body parser.
//
// Submissions come from a GitHub issue form: a sequence of `### Heading`
// sections, each followed by the submitter's answer. Only two sections
// matter here; everything else in the body is ignored.

use std::collections::BTreeMap;

use tracing::debug;

use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd, TextMergeStream};

pub const ADDRESSES_KEY: &str = "hotspot_b58_addresses";
pub const NAMES_KEY: &str = "hotspot_name";

const COLLECTED_KEYS: [&str; 2] = [ADDRESSES_KEY, NAMES_KEY];

/// Normalized heading → canonical key. The issue form has shipped both the
/// singular and the plural address heading.
const HEADING_ALIASES: &[(&str, &str)] = &[("hotspot_b58_address", ADDRESSES_KEY)];

/// Values collected under the recognized headings of one issue body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody {
    sections: BTreeMap<String, Vec<String>>,
}

impl ParsedBody {
    pub fn addresses(&self) -> Option<&[String]> {
        self.get(ADDRESSES_KEY)
    }

    pub fn names(&self) -> Option<&[String]> {
        self.get(NAMES_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.sections.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Lower-case, spaces to underscores, drop everything outside `[a-z0-9_]`,
/// then resolve aliases.
pub fn normalize_heading(text: &str) -> String {
    let key: String = text
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    HEADING_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(key)
}

/// Extract the address and name sections from an issue body.
///
/// Returns `None` when the document is malformed (a heading with no text).
/// A body without any recognized section yields an empty `ParsedBody`.
///
/// Only plain text sitting directly in a top-level paragraph is collected.
/// Emphasis, links, code, lists and quotes under a heading are skipped.
pub fn parse_body(body: &str) -> Option<ParsedBody> {
    let mut parsed = ParsedBody::default();
    let mut current: Option<(String, Vec<String>)> = None;

    // nesting of open tags; 1 means directly inside a top-level block
    let mut depth = 0usize;
    let mut in_paragraph = false;
    let mut heading: Option<String> = None;

    for event in TextMergeStream::new(MdParser::new(body)) {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    match tag {
                        Tag::Heading { .. } => heading = Some(String::new()),
                        Tag::Paragraph => in_paragraph = true,
                        _ => {}
                    }
                }
                depth += 1;
            }
            Event::End(tag) => {
                depth = depth.saturating_sub(1);
                if depth > 0 {
                    continue;
                }
                match tag {
                    TagEnd::Heading(_) => {
                        let text = heading.take().unwrap_or_default();
                        if text.trim().is_empty() {
                            debug!("Heading without text, body not parseable");
                            return None;
                        }
                        close_section(current.take(), &mut parsed);
                        current = Some((normalize_heading(&text), Vec::new()));
                    }
                    TagEnd::Paragraph => in_paragraph = false,
                    _ => {}
                }
            }
            Event::Text(text) | Event::Code(text) if heading.is_some() => {
                if let Some(heading) = heading.as_mut() {
                    heading.push_str(&text);
                }
            }
            Event::Text(text) if in_paragraph && depth == 1 => {
                if let Some((key, values)) = current.as_mut() {
                    if COLLECTED_KEYS.contains(&key.as_str()) {
                        collect_lines(&text, values);
                    }
                }
            }
            _ => {}
        }
    }
    close_section(current, &mut parsed);

    Some(parsed)
}

fn collect_lines(text: &str, values: &mut Vec<String>) {
    values.extend(
        text.lines()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    );
}

// A repeated heading replaces the earlier section.
fn close_section(section: Option<(String, Vec<String>)>, parsed: &mut ParsedBody) {
    if let Some((key, values)) = section {
        if COLLECTED_KEYS.contains(&key.as_str()) && !values.is_empty() {
            parsed.sections.insert(key, values);
        }
    }
}
