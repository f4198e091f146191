use serde::Serialize;
use serde_json::{Map, Value};

/// One row of the dataset, keyed by column name in column order
pub type Record = Map<String, Value>;

/// Ordered, row-oriented table as handed between pipeline stages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    index: Vec<Value>,
    rows: Vec<Record>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from records, numbering rows from zero.
    /// Columns are the union of record keys in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut dataset = Self::new();
        for record in records {
            dataset.push(record);
        }
        dataset
    }

    /// Build a dataset with explicit row keys and column list
    pub fn with_index(columns: Vec<String>, index: Vec<Value>, rows: Vec<Record>) -> Self {
        debug_assert_eq!(index.len(), rows.len());
        Self { columns, index, rows }
    }

    /// Append a record, keyed by its position
    pub fn push(&mut self, record: Record) {
        for key in record.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.index.push(Value::from(self.rows.len()));
        self.rows.push(record);
    }

    /// Append every row of `other`, renumbering the index the way
    /// a concatenation with a fresh index does
    pub fn append(&mut self, other: Dataset) {
        for record in other.rows {
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn index(&self) -> &[Value] {
        &self.index
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Record)> {
        self.index.iter().zip(self.rows.iter())
    }

    /// Values of one column, `None` where a row lacks the field
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| row.get(name))
    }

    /// Keep only the rows for which `keep` holds, preserving keys and order
    pub fn select<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        let (index, rows) = self
            .iter()
            .filter(|(_, row)| keep(row))
            .map(|(key, row)| (key.clone(), row.clone()))
            .unzip();
        Dataset {
            columns: self.columns.clone(),
            index,
            rows,
        }
    }

    /// Produce a new dataset with `extra` columns added after the existing ones
    /// and every row rewritten by `derive`
    pub(crate) fn map_rows<F, E>(&self, extra: &[&str], mut derive: F) -> Result<Dataset, E>
    where
        F: FnMut(usize, &Record) -> Result<Record, E>,
    {
        let mut columns = self.columns.clone();
        for name in extra {
            if !columns.iter().any(|c| c == name) {
                columns.push((*name).to_string());
            }
        }
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| derive(i, row))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Dataset {
            columns,
            index: self.index.clone(),
            rows,
        })
    }
}

/// Label used to compare and group categorical values.
/// Strings compare by content, other scalars by their JSON text, null has no label.
pub fn category_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_records_collects_columns_in_first_seen_order() {
        let dataset = Dataset::from_records(vec![
            record(json!({"id": 1, "marketplace": "A"})),
            record(json!({"id": 2, "price": 9.5})),
        ]);

        assert_eq!(dataset.columns(), &["id", "marketplace", "price"]);
        assert_eq!(dataset.index(), &[json!(0), json!(1)]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_append_renumbers_index() {
        let mut first = Dataset::from_records(vec![record(json!({"id": 1}))]);
        let second = Dataset::from_records(vec![record(json!({"id": 2})), record(json!({"id": 3}))]);
        first.append(second);

        assert_eq!(first.index(), &[json!(0), json!(1), json!(2)]);
        let ids: Vec<_> = first.column_values("id").map(|v| v.cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
    }

    #[test]
    fn test_select_keeps_keys_of_surviving_rows() {
        let dataset = Dataset::with_index(
            vec!["id".to_string()],
            vec![json!("a"), json!("b"), json!("c")],
            vec![
                record(json!({"id": 1})),
                record(json!({"id": 2})),
                record(json!({"id": 3})),
            ],
        );
        let odd = dataset.select(|row| row["id"].as_i64().unwrap_or(0) % 2 == 1);

        assert_eq!(odd.index(), &[json!("a"), json!("c")]);
        assert_eq!(odd.columns(), dataset.columns());
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label(&json!("normal")), Some("normal".to_string()));
        assert_eq!(category_label(&json!(1)), Some("1".to_string()));
        assert_eq!(category_label(&json!(true)), Some("true".to_string()));
        assert_eq!(category_label(&Value::Null), None);
    }
}
