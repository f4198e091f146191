use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::data::{category_label, Dataset, Record};
use crate::enrich::{DAY_OF_WEEK, MONTH};

pub const OUTLIER: &str = "outlier";
pub const OUTLIER_KNN: &str = "outlier_knn";
pub const MARKETPLACE: &str = "marketplace";

/// User selection over the five filter dimensions.
///
/// `outlier` and `outlier_knn` are single-value selections; the other
/// three are sets of allowed values. An empty set matches no row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub outlier: String,
    pub outlier_knn: String,
    pub months: BTreeSet<u32>,
    pub marketplaces: BTreeSet<String>,
    pub days_of_week: BTreeSet<u32>,
}

impl FilterSpec {
    /// Default selection: the first discovered value for each single-value
    /// dimension and every discovered value for each set
    pub fn defaults_for(options: &FilterOptions) -> Self {
        Self {
            outlier: options.outliers.first().cloned().unwrap_or_default(),
            outlier_knn: options.outlier_knns.first().cloned().unwrap_or_default(),
            months: options.months.iter().copied().collect(),
            marketplaces: options.marketplaces.iter().cloned().collect(),
            days_of_week: options.days_of_week.iter().copied().collect(),
        }
    }

    /// Whether a row satisfies all five constraints
    pub fn matches(&self, row: &Record) -> bool {
        label_of(row, OUTLIER).as_deref() == Some(self.outlier.as_str())
            && label_of(row, OUTLIER_KNN).as_deref() == Some(self.outlier_knn.as_str())
            && number_of(row, MONTH).is_some_and(|m| self.months.contains(&m))
            && label_of(row, MARKETPLACE).is_some_and(|m| self.marketplaces.contains(&m))
            && number_of(row, DAY_OF_WEEK).is_some_and(|d| self.days_of_week.contains(&d))
    }
}

/// Keep the rows matching `spec`, in their original order
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> Dataset {
    let filtered = dataset.select(|row| spec.matches(row));
    debug!("Filter kept {} of {} rows", filtered.len(), dataset.len());
    filtered
}

/// Distinct values available for each filter dimension, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub outliers: Vec<String>,
    pub outlier_knns: Vec<String>,
    pub months: Vec<u32>,
    pub marketplaces: Vec<String>,
    pub days_of_week: Vec<u32>,
}

impl FilterOptions {
    pub fn discover(dataset: &Dataset) -> Self {
        let mut options = Self::default();
        for row in dataset.rows() {
            push_unique(&mut options.outliers, label_of(row, OUTLIER));
            push_unique(&mut options.outlier_knns, label_of(row, OUTLIER_KNN));
            push_unique(&mut options.months, number_of(row, MONTH));
            push_unique(&mut options.marketplaces, label_of(row, MARKETPLACE));
            push_unique(&mut options.days_of_week, number_of(row, DAY_OF_WEEK));
        }
        options
    }
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: Option<T>) {
    if let Some(value) = value {
        if !values.contains(&value) {
            values.push(value);
        }
    }
}

fn label_of(row: &Record, column: &str) -> Option<String> {
    row.get(column).and_then(category_label)
}

fn number_of(row: &Record, column: &str) -> Option<u32> {
    row.get(column)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}
