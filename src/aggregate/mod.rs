use serde::Serialize;

use crate::data::{category_label, Dataset};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

/// Row counts per category of one column, in presentation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub column: String,
    pub entries: Vec<CategoryCount>,
}

impl AggregationResult {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn max_count(&self) -> usize {
        self.entries.iter().map(|e| e.count).max().unwrap_or(0)
    }

    /// Entries as `(label, count)` pairs
    pub fn pairs(&self) -> Vec<(&str, usize)> {
        self.entries.iter().map(|e| (e.label.as_str(), e.count)).collect()
    }
}

/// Count rows per label of `column`, one entry per label of `order` in that
/// order. Labels missing from the data get a zero count; values outside
/// `order` are not reported.
pub fn count_by_canonical(dataset: &Dataset, column: &str, order: &[&str]) -> AggregationResult {
    let mut counts = vec![0usize; order.len()];
    for label in dataset.column_values(column).flatten().filter_map(category_label) {
        if let Some(position) = order.iter().position(|o| *o == label) {
            counts[position] += 1;
        }
    }

    AggregationResult {
        column: column.to_string(),
        entries: order
            .iter()
            .zip(counts)
            .map(|(label, count)| CategoryCount {
                label: (*label).to_string(),
                count,
            })
            .collect(),
    }
}

/// Count rows per distinct label of `column`, in first-seen order.
/// Null and missing values are skipped.
pub fn count_by_discovered(dataset: &Dataset, column: &str) -> AggregationResult {
    let mut entries: Vec<CategoryCount> = Vec::new();
    for label in dataset.column_values(column).flatten().filter_map(category_label) {
        match entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.count += 1,
            None => entries.push(CategoryCount { label, count: 1 }),
        }
    }

    AggregationResult {
        column: column.to_string(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{DAY_ORDER, MONTH_ORDER};
    use serde_json::{json, Value};

    fn dataset(column: &str, values: Vec<Value>) -> Dataset {
        Dataset::from_records(
            values
                .into_iter()
                .map(|v| {
                    let mut row = serde_json::Map::new();
                    row.insert(column.to_string(), v);
                    row
                })
                .collect(),
        )
    }

    #[test]
    fn test_canonical_order_zero_fills_missing_months() {
        let data = dataset("month_name", vec![json!("Mar"), json!("Jan"), json!("Mar")]);

        let result = count_by_canonical(&data, "month_name", &MONTH_ORDER);

        assert_eq!(result.entries.len(), 12);
        assert_eq!(result.pairs()[0], ("Jan", 1));
        assert_eq!(result.pairs()[1], ("Feb", 0));
        assert_eq!(result.pairs()[2], ("Mar", 2));
        assert_eq!(result.pairs()[11], ("Dec", 0));
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn test_canonical_order_ignores_unknown_labels() {
        let data = dataset("day_name", vec![json!("Monday"), json!("Funday"), Value::Null]);

        let result = count_by_canonical(&data, "day_name", &DAY_ORDER);

        assert_eq!(result.total(), 1);
        assert_eq!(result.entries.iter().map(|e| e.label.as_str()).collect::<Vec<_>>(), DAY_ORDER);
    }

    #[test]
    fn test_canonical_on_empty_dataset_is_all_zeros() {
        let result = count_by_canonical(&Dataset::new(), "month_name", &MONTH_ORDER);

        assert_eq!(result.entries.len(), 12);
        assert_eq!(result.max_count(), 0);
    }

    #[test]
    fn test_discovered_order_is_first_seen() {
        let data = dataset("marketplace", vec![json!("B"), json!("A"), json!("B"), Value::Null, json!("C")]);

        let result = count_by_discovered(&data, "marketplace");

        assert_eq!(result.pairs(), vec![("B", 2), ("A", 1), ("C", 1)]);
        assert_eq!(result.column, "marketplace");
    }

    #[test]
    fn test_discovered_on_empty_dataset_has_no_entries() {
        assert!(count_by_discovered(&Dataset::new(), "marketplace").entries.is_empty());
    }
}
