use serde_json::Value;

use crate::aggregate::AggregationResult;
use crate::data::Dataset;
use crate::pipeline::DashboardView;

pub const MONTH_TITLE: &str = "Distribution of Outliers by Month";
pub const WEEKDAY_TITLE: &str = "Distribution of Outliers by Day of the Week";
pub const MARKETPLACE_TITLE: &str = "Distribution of Outliers by Market";

const MAX_CELL_WIDTH: usize = 18;

/// Text rendering of the dashboard for a terminal
pub struct ChartRenderer {
    width: usize,
}

impl ChartRenderer {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(40) }
    }

    /// Size charts to the terminal, falling back to 80 columns
    pub fn for_terminal() -> Self {
        match crossterm::terminal::size() {
            Ok((cols, _)) => Self::new((cols as usize).min(120)),
            Err(_) => Self::new(80),
        }
    }

    /// Full dashboard: preview table followed by the three charts
    pub fn render_view(&self, view: &DashboardView, preview_rows: usize) -> String {
        let mut output = String::new();
        output.push_str("🛒 Ecommerce Data Exploration\n");
        output.push_str(&self.render_table(&view.filtered, preview_rows));
        output.push('\n');
        output.push_str(&self.render_bar_chart(&view.by_month, MONTH_TITLE));
        output.push('\n');
        output.push_str(&self.render_bar_chart(&view.by_weekday, WEEKDAY_TITLE));
        output.push('\n');
        output.push_str(&self.render_bar_chart(&view.by_marketplace, MARKETPLACE_TITLE));
        output
    }

    /// Horizontal bar chart, one bar per entry in the given order
    pub fn render_bar_chart(&self, result: &AggregationResult, title: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("📊 {}\n", title));
        output.push_str(&"─".repeat(self.width));
        output.push('\n');

        if result.entries.is_empty() {
            output.push_str(&format!("  No data available for '{}'\n", result.column));
            return output;
        }

        let label_width = result.entries.iter().map(|e| e.label.chars().count()).max().unwrap_or(0);
        let count_width = result.max_count().to_string().len();
        let bar_space = self.width.saturating_sub(label_width + count_width + 6).max(1);
        let max_count = result.max_count();

        for entry in &result.entries {
            let bar_length = if max_count > 0 {
                entry.count * bar_space / max_count
            } else {
                0
            };
            output.push_str(&format!(
                "  {:<lw$} │{} {:>cw$}\n",
                entry.label,
                "█".repeat(bar_length),
                entry.count,
                lw = label_width,
                cw = count_width,
            ));
        }
        output
    }

    /// First `max_rows` rows of the filtered dataset as a fixed-width table
    pub fn render_table(&self, dataset: &Dataset, max_rows: usize) -> String {
        let mut output = format!("📋 {} rows selected\n", dataset.len());
        if dataset.is_empty() || max_rows == 0 {
            return output;
        }

        let columns = dataset.columns();
        let shown: Vec<(&Value, Vec<String>)> = dataset
            .iter()
            .take(max_rows)
            .map(|(key, row)| {
                let cells = columns.iter().map(|c| cell(row.get(c))).collect();
                (key, cells)
            })
            .collect();

        let key_width = shown.iter().map(|(k, _)| cell(Some(*k)).chars().count()).max().unwrap_or(0);
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                shown
                    .iter()
                    .map(|(_, cells)| cells[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(MAX_CELL_WIDTH)
            })
            .collect();

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(name, w)| format!("{:<w$}", truncate(name, *w), w = *w))
            .collect();
        output.push_str(&format!("{:<kw$}  {}\n", "", header.join("  "), kw = key_width));

        for (key, cells) in &shown {
            let line: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(value, w)| format!("{:<w$}", truncate(value, *w), w = *w))
                .collect();
            output.push_str(&format!("{:<kw$}  {}\n", cell(Some(*key)), line.join("  "), kw = key_width));
        }

        if dataset.len() > shown.len() {
            output.push_str(&format!("… {} more rows\n", dataset.len() - shown.len()));
        }
        output
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}
