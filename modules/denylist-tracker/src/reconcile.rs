// Entry reconciliation: parsed submissions → inventory-backed entries.

use tracing::debug;

use denylist_common::Entry;

use crate::inventory::{normalize_name, Inventory};
use crate::parser::{parse_body, ParsedBody};

/// One entry per resolvable value. The address section, when present, wins
/// over the name section. Duplicates are kept; the store ignores them.
pub fn reconcile(issue_number: i64, parsed: &ParsedBody, inventory: &Inventory) -> Vec<Entry> {
    if let Some(addresses) = parsed.addresses() {
        return addresses
            .iter()
            .filter_map(|address| match inventory.by_address(address) {
                Some(row) => Some(Entry::from_inventory(issue_number, row)),
                None => {
                    debug!(issue = issue_number, address = address.as_str(), "Address not in inventory");
                    None
                }
            })
            .collect();
    }

    if let Some(names) = parsed.names() {
        return names
            .iter()
            .filter_map(|name| {
                let normalized = normalize_name(name);
                match inventory.by_name(&normalized) {
                    Some(row) => Some(Entry::from_inventory(issue_number, row)),
                    None => {
                        debug!(issue = issue_number, name = normalized.as_str(), "Name not in inventory");
                        None
                    }
                }
            })
            .collect();
    }

    Vec::new()
}

/// Parse an issue body and reconcile it. Missing or unparseable bodies
/// produce no entries.
pub fn entries_from_body(issue_number: i64, body: Option<&str>, inventory: &Inventory) -> Vec<Entry> {
    let Some(body) = body else {
        return Vec::new();
    };
    match parse_body(body) {
        Some(parsed) => reconcile(issue_number, &parsed, inventory),
        None => {
            debug!(issue = issue_number, "Issue body could not be parsed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use denylist_common::InventoryRow;

    fn row(address: &str, name: &str) -> InventoryRow {
        InventoryRow {
            address: address.to_string(),
            name: Some(name.to_string()),
            location: Some("8c2ab38f1ee21ff".to_string()),
            owner: Some(format!("owner-{address}")),
            payer: Some("payer".to_string()),
            maker: Some("Nebra Ltd".to_string()),
            long_country: Some("United Kingdom".to_string()),
            long_state: Some("England".to_string()),
            long_city: Some("London".to_string()),
            first_block: Some(1_200_000),
        }
    }

    fn inventory() -> Inventory {
        Inventory::new(vec![
            row("11aaa", "angry-purple-tiger"),
            row("11bbb", "silly-blue-fox"),
            row("11ccc", "odd-green-owl"),
        ])
    }

    #[test]
    fn each_known_address_yields_one_entry_with_inventory_fields() {
        let body = "### Hotspot B58 Address(es)\n\n11aaa\n11ccc\n";
        let entries = entries_from_body(7, Some(body), &inventory());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, "11aaa");
        assert_eq!(entries[0].issue_number, 7);
        assert_eq!(entries[0].name.as_deref(), Some("angry-purple-tiger"));
        assert_eq!(entries[0].owner.as_deref(), Some("owner-11aaa"));
        assert_eq!(entries[1], Entry::from_inventory(7, &row("11ccc", "odd-green-owl")));
    }

    #[test]
    fn unknown_addresses_are_skipped() {
        let body = "### Hotspot B58 Address(es)\n\n11aaa\n11zzz\n";
        let entries = entries_from_body(7, Some(body), &inventory());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn names_are_normalized_before_lookup() {
        let body = "### Hotspot Name\n\nAngry Purple Tiger\nsilly blue fox\n";
        let entries = entries_from_body(8, Some(body), &inventory());
        let addresses: Vec<&str> = entries.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, vec!["11aaa", "11bbb"]);
    }

    #[test]
    fn unknown_name_yields_nothing() {
        let body = "### Hotspot Name\n\nNonexistent Hotspot Name\n";
        assert!(entries_from_body(9, Some(body), &inventory()).is_empty());
    }

    #[test]
    fn address_section_takes_precedence_over_names() {
        let body = "### Hotspot B58 Address(es)\n\n11ccc\n\n### Hotspot Name\n\nAngry Purple Tiger\n";
        let entries = entries_from_body(10, Some(body), &inventory());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].address, "11ccc");
    }

    #[test]
    fn duplicate_addresses_are_emitted_twice() {
        let body = "### Hotspot B58 Address(es)\n\n11aaa\n11aaa\n";
        assert_eq!(entries_from_body(11, Some(body), &inventory()).len(), 2);
    }

    #[test]
    fn missing_or_malformed_bodies_yield_nothing() {
        assert!(entries_from_body(12, None, &inventory()).is_empty());
        assert!(entries_from_body(12, Some("#\n\n11aaa"), &inventory()).is_empty());
    }
}
