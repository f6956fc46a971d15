use openai_balance_protocol::{balance_text, Row};

/// Ordered balance table, at most one row per key.
///
/// The store only mutates memory. Callers persist the whole collection after
/// each change that reports `true`.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: Vec<Row>,
    /// Rows created by this store so far; names new rows `Key N`.
    created: u32,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    /// Swap in a rehydrated collection. The name counter moves past the
    /// highest `Key N` already present so new rows never reuse a name.
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        let highest = rows
            .iter()
            .filter_map(|row| default_name_number(&row.name))
            .max()
            .unwrap_or(0);
        self.created = self.created.max(highest);
        self.rows = rows;
    }

    /// Record a fetched usage total for `key`.
    ///
    /// An existing row always takes the new value, a missing total showing as
    /// zero. An unseen key only gets a row when the total is non-zero.
    pub fn upsert(&mut self, key: &str, total_usage: Option<f64>) -> bool {
        if let Some(index) = self.position(key) {
            self.rows[index].usage = balance_text(total_usage.unwrap_or(0.0));
            return true;
        }

        match total_usage {
            Some(total) if is_truthy(total) => {
                self.created += 1;
                self.rows.push(Row {
                    name: format!("Key {}", self.created),
                    key: key.to_string(),
                    usage: balance_text(total),
                });
                true
            }
            _ => false,
        }
    }

    /// Out-of-range indexes are ignored.
    pub fn rename(&mut self, index: usize, name: &str) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.name = name.to_string();
                true
            }
            None => false,
        }
    }
}

fn default_name_number(name: &str) -> Option<u32> {
    name.strip_prefix("Key ")?.parse().ok()
}

fn is_truthy(total: f64) -> bool {
    total != 0.0 && !total.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, key: &str, usage: &str) -> Row {
        Row {
            name: name.into(),
            key: key.into(),
            usage: usage.into(),
        }
    }

    #[test]
    fn test_zero_usage_for_new_key_adds_nothing() {
        let mut store = RowStore::new();
        assert!(!store.upsert("sk-a", Some(0.0)));
        assert!(!store.upsert("sk-a", None));
        assert!(!store.upsert("sk-a", Some(f64::NAN)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_new_key_appends_named_row() {
        let mut store = RowStore::new();
        assert!(store.upsert("sk-a", Some(12345.0)));
        assert!(store.upsert("sk-b", Some(50.0)));

        assert_eq!(
            store.rows(),
            &[row("Key 1", "sk-a", "$123.45"), row("Key 2", "sk-b", "$0.5")]
        );
    }

    #[test]
    fn test_existing_key_updates_in_place() {
        let mut store = RowStore::new();
        store.upsert("sk-a", Some(100.0));
        store.upsert("sk-b", Some(200.0));
        store.rename(0, "work");

        assert!(store.upsert("sk-a", Some(999.0)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0), Some(&row("work", "sk-a", "$9.99")));
        assert_eq!(store.get(1).map(|r| r.key.as_str()), Some("sk-b"));
    }

    #[test]
    fn test_zero_usage_overwrites_existing_key() {
        let mut store = RowStore::new();
        store.upsert("sk-a", Some(100.0));

        assert!(store.upsert("sk-a", Some(0.0)));
        assert_eq!(store.get(0).map(|r| r.usage.as_str()), Some("$0"));

        store.upsert("sk-a", Some(100.0));
        assert!(store.upsert("sk-a", None));
        assert_eq!(store.get(0).map(|r| r.usage.as_str()), Some("$0"));
    }

    #[test]
    fn test_rename_out_of_range_is_noop() {
        let mut store = RowStore::new();
        store.upsert("sk-a", Some(100.0));
        let before = store.rows().to_vec();

        assert!(!store.rename(1, "nope"));
        assert!(!store.rename(usize::MAX, "nope"));
        assert_eq!(store.rows(), before.as_slice());
    }

    #[test]
    fn test_counter_is_per_store() {
        let mut first = RowStore::new();
        first.upsert("sk-a", Some(1.0));
        first.upsert("sk-b", Some(1.0));

        let mut second = RowStore::new();
        second.upsert("sk-c", Some(1.0));
        assert_eq!(second.get(0).map(|r| r.name.as_str()), Some("Key 1"));
    }

    #[test]
    fn test_replace_all_seeds_counter_from_names() {
        let mut store = RowStore::new();
        store.replace_all(vec![
            row("Key 3", "sk-a", "$1"),
            row("work", "sk-b", "$2"),
            row("Key 1", "sk-c", "$3"),
            row("Key x", "sk-d", "$4"),
        ]);
        store.upsert("sk-new", Some(100.0));

        assert_eq!(store.get(4).map(|r| r.name.as_str()), Some("Key 4"));
        assert_eq!(store.position("sk-new"), Some(4));
    }

    #[test]
    fn test_replace_all_without_default_names() {
        let mut store = RowStore::new();
        store.replace_all(vec![row("work", "sk-a", "$1")]);
        store.upsert("sk-new", Some(100.0));

        assert_eq!(store.get(1).map(|r| r.name.as_str()), Some("Key 1"));
    }
}
