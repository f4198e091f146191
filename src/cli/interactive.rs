use anyhow::{Context, Result};
use clap::Args;
use inquire::{Confirm, MultiSelect, Select};
use std::fmt;
use tracing::{debug, info};

use crate::cli::commands::{build_dashboard, SourceArgs};
use crate::enrich::{DAY_ORDER, MONTH_ORDER};
use crate::filter::{FilterOptions, FilterSpec};
use crate::plotting::ChartRenderer;

#[derive(Args)]
pub struct ExploreCommand {
    #[command(flatten)]
    pub source: SourceArgs,
}

/// A prompt option showing a friendly label for a filter value
#[derive(Debug, Clone, PartialEq)]
struct Choice<T> {
    value: T,
    label: String,
}

impl<T> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn month_choices(months: &[u32]) -> Vec<Choice<u32>> {
    months
        .iter()
        .map(|&m| Choice {
            value: m,
            label: match MONTH_ORDER.get((m as usize).wrapping_sub(1)) {
                Some(name) => format!("{} ({})", m, name),
                None => m.to_string(),
            },
        })
        .collect()
}

fn day_choices(days: &[u32]) -> Vec<Choice<u32>> {
    days.iter()
        .map(|&d| Choice {
            value: d,
            label: match DAY_ORDER.get(d as usize) {
                Some(name) => format!("{} ({})", d, name),
                None => d.to_string(),
            },
        })
        .collect()
}

impl ExploreCommand {
    pub async fn execute(self) -> Result<()> {
        let config = self.source.resolve()?;
        let mut dashboard = build_dashboard(&config);
        let renderer = ChartRenderer::for_terminal();

        let enriched = dashboard
            .load()
            .await
            .context("Cannot derive calendar fields from the fetched data")?;
        if enriched.is_empty() {
            println!("📭 The data source returned no rows; nothing to explore.");
            return Ok(());
        }
        let options = FilterOptions::discover(&enriched);
        info!("🔎 {} rows loaded, {} marketplaces", enriched.len(), options.marketplaces.len());

        loop {
            let selection = prompt_selection(&options)?;
            debug!("Selection: {:?}", selection);

            let view = dashboard.render_cycle(&selection).await?;
            println!("{}", renderer.render_view(&view, config.preview_rows));

            let again = Confirm::new("Change filters?").with_default(true).prompt()?;
            if !again {
                break;
            }
        }

        Ok(())
    }
}

/// Sidebar equivalent: single choice for the outlier flags,
/// multi-choice with everything preselected for the rest
fn prompt_selection(options: &FilterOptions) -> Result<FilterSpec> {
    let mut selection = FilterSpec::defaults_for(options);

    if !options.outliers.is_empty() {
        selection.outlier = Select::new("Outliers", options.outliers.clone()).prompt()?;
    }
    if !options.outlier_knns.is_empty() {
        selection.outlier_knn = Select::new("KNN Outliers", options.outlier_knns.clone()).prompt()?;
    }
    if !options.months.is_empty() {
        selection.months = MultiSelect::new("Select months", month_choices(&options.months))
            .with_all_selected_by_default()
            .prompt()?
            .into_iter()
            .map(|c| c.value)
            .collect();
    }
    if !options.marketplaces.is_empty() {
        selection.marketplaces = MultiSelect::new("Select marketplace", options.marketplaces.clone())
            .with_all_selected_by_default()
            .prompt()?
            .into_iter()
            .collect();
    }
    if !options.days_of_week.is_empty() {
        selection.days_of_week = MultiSelect::new("Select days of the week", day_choices(&options.days_of_week))
            .with_all_selected_by_default()
            .prompt()?
            .into_iter()
            .map(|c| c.value)
            .collect();
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_choices_show_names() {
        let choices = month_choices(&[1, 12]);
        assert_eq!(choices[0].to_string(), "1 (Jan)");
        assert_eq!(choices[1].to_string(), "12 (Dec)");
        assert_eq!(choices[1].value, 12);
    }

    #[test]
    fn test_day_choices_start_on_monday() {
        let choices = day_choices(&[0, 6]);
        assert_eq!(choices[0].to_string(), "0 (Monday)");
        assert_eq!(choices[1].to_string(), "6 (Sunday)");
    }

    #[test]
    fn test_out_of_range_values_fall_back_to_numbers() {
        assert_eq!(month_choices(&[0])[0].to_string(), "0");
        assert_eq!(day_choices(&[9])[0].to_string(), "9");
    }
}
