use std::collections::HashMap;

use denylist_common::InventoryRow;

/// In-memory snapshot of the hotspot inventory, indexed by address and name.
#[derive(Debug, Default)]
pub struct Inventory {
    rows: Vec<InventoryRow>,
    by_address: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Inventory {
    /// Build the indexes. When several hotspots share a name the one with the
    /// lowest `first_block` (then lowest address) answers name lookups.
    pub fn new(rows: Vec<InventoryRow>) -> Self {
        let mut by_address = HashMap::with_capacity(rows.len());
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            by_address.insert(row.address.clone(), idx);

            let Some(name) = row.name.as_deref() else {
                continue;
            };
            by_name
                .entry(name.to_string())
                .and_modify(|existing| {
                    if name_rank(row) < name_rank(&rows[*existing]) {
                        *existing = idx;
                    }
                })
                .or_insert(idx);
        }

        Self {
            rows,
            by_address,
            by_name,
        }
    }

    pub fn by_address(&self, address: &str) -> Option<&InventoryRow> {
        self.by_address.get(address).map(|&idx| &self.rows[idx])
    }

    /// Exact lookup on the inventory's (already normalized) name column.
    pub fn by_name(&self, name: &str) -> Option<&InventoryRow> {
        self.by_name.get(name).map(|&idx| &self.rows[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn name_rank(row: &InventoryRow) -> (i64, &str) {
    (row.first_block.unwrap_or(i64::MAX), row.address.as_str())
}

/// Submitted names are free text ("Angry Purple Tiger"); inventory names are
/// lower-case and hyphenated ("angry-purple-tiger").
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: &str, name: &str, first_block: Option<i64>) -> InventoryRow {
        InventoryRow {
            address: address.to_string(),
            name: Some(name.to_string()),
            location: None,
            owner: None,
            payer: None,
            maker: None,
            long_country: None,
            long_state: None,
            long_city: None,
            first_block,
        }
    }

    #[test]
    fn duplicate_names_resolve_to_oldest_hotspot() {
        let inventory = Inventory::new(vec![
            row("11newer", "angry-purple-tiger", Some(900)),
            row("11older", "angry-purple-tiger", Some(100)),
            row("11unknown", "angry-purple-tiger", None),
        ]);
        assert_eq!(inventory.by_name("angry-purple-tiger").unwrap().address, "11older");
        assert_eq!(inventory.by_address("11newer").unwrap().first_block, Some(900));
        assert_eq!(inventory.len(), 3);
    }

    #[test]
    fn equal_first_block_breaks_tie_on_address() {
        let inventory = Inventory::new(vec![
            row("11b", "same-name", Some(5)),
            row("11a", "same-name", Some(5)),
        ]);
        assert_eq!(inventory.by_name("same-name").unwrap().address, "11a");
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_name("Angry Purple Tiger"), "angry-purple-tiger");
        assert_eq!(normalize_name("angry-purple-tiger"), "angry-purple-tiger");
    }

    #[test]
    fn missing_keys() {
        let inventory = Inventory::default();
        assert!(inventory.is_empty());
        assert!(inventory.by_address("11x").is_none());
        assert!(inventory.by_name("x").is_none());
    }
}
