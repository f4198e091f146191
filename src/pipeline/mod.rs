use serde::Serialize;
use tracing::info;

use crate::aggregate::{count_by_canonical, count_by_discovered, AggregationResult};
use crate::data::Dataset;
use crate::enrich::{enrich, EnrichError, DAY_NAME, DAY_ORDER, MONTH_NAME, MONTH_ORDER};
use crate::filter::{self, FilterSpec, MARKETPLACE};
use crate::source::{CachedSource, FetchSpec, Transport};

/// Everything the rendering layer needs for one render cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filtered: Dataset,
    pub by_month: AggregationResult,
    pub by_weekday: AggregationResult,
    pub by_marketplace: AggregationResult,
}

/// Filter an enriched dataset and compute the three chart aggregates
pub fn build_view(enriched: &Dataset, spec: &FilterSpec) -> DashboardView {
    let filtered = filter::apply(enriched, spec);
    let by_month = count_by_canonical(&filtered, MONTH_NAME, &MONTH_ORDER);
    let by_weekday = count_by_canonical(&filtered, DAY_NAME, &DAY_ORDER);
    let by_marketplace = count_by_discovered(&filtered, MARKETPLACE);

    DashboardView {
        filtered,
        by_month,
        by_weekday,
        by_marketplace,
    }
}

/// Fetch, enrich, filter and aggregate, reusing the fetched rows across cycles
pub struct Dashboard<T> {
    source: CachedSource<T>,
    fetch: FetchSpec,
}

impl<T: Transport> Dashboard<T> {
    pub fn new(source: CachedSource<T>, fetch: FetchSpec) -> Self {
        Self { source, fetch }
    }

    /// Fetched rows with calendar fields derived
    pub async fn load(&mut self) -> Result<Dataset, EnrichError> {
        let raw = self.source.fetch(&self.fetch).await;
        enrich(raw)
    }

    /// One full render cycle for the given selection
    pub async fn render_cycle(&mut self, spec: &FilterSpec) -> Result<DashboardView, EnrichError> {
        let enriched = self.load().await?;
        let view = build_view(&enriched, spec);
        info!(
            "Render cycle: {} of {} rows selected",
            view.filtered.len(),
            enriched.len()
        );
        Ok(view)
    }
}
