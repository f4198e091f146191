use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::config::{DashboardConfig, StorageCredentials};
use crate::filter::{FilterOptions, FilterSpec};
use crate::pipeline::Dashboard;
use crate::plotting::ChartRenderer;
use crate::source::{CachedSource, DataSource, FetchMode, HttpTransport};
use crate::storage::StorageClient;

/// Where and how to fetch the dataset
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Data endpoint URL (overrides the config file)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Fetch everything in one request instead of in batches
    #[arg(long, conflicts_with = "batch_size")]
    pub bulk: bool,

    /// Rows per batch for paginated fetching
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl SourceArgs {
    /// Config file values with command-line overrides applied
    pub fn resolve(&self) -> Result<DashboardConfig> {
        let mut config = DashboardConfig::load(self.config.as_deref())?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if self.bulk {
            config.fetch = FetchMode::Bulk;
        } else if let Some(batch_size) = self.batch_size {
            config.fetch = FetchMode::Paginated { batch_size };
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Dashboard over HTTP with a progress spinner and session cache
pub fn build_dashboard(config: &DashboardConfig) -> Dashboard<HttpTransport> {
    let source = DataSource::new(HttpTransport::new(config.request_timeout())).with_progress();
    Dashboard::new(CachedSource::new(source), config.fetch_spec())
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
pub struct ShowCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Outlier flag to keep (default: first value found)
    #[arg(long)]
    pub outlier: Option<String>,

    /// KNN outlier flag to keep (default: first value found)
    #[arg(long)]
    pub outlier_knn: Option<String>,

    /// Months to keep, 1-12 (repeatable; default: all found)
    #[arg(long = "month", value_parser = clap::value_parser!(u32).range(1..=12))]
    pub months: Vec<u32>,

    /// Marketplaces to keep (repeatable; default: all found)
    #[arg(long = "marketplace")]
    pub marketplaces: Vec<String>,

    /// Days of the week to keep, 0 = Monday (repeatable; default: all found)
    #[arg(long = "day", value_parser = clap::value_parser!(u32).range(0..=6))]
    pub days_of_week: Vec<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Rows shown in the table preview (overrides the config file)
    #[arg(long)]
    pub rows: Option<usize>,
}

impl ShowCommand {
    pub async fn execute(self) -> Result<()> {
        let config = self.source.resolve()?;
        let mut dashboard = build_dashboard(&config);

        let enriched = dashboard
            .load()
            .await
            .context("Cannot derive calendar fields from the fetched data")?;
        let selection = self.selection(&FilterOptions::discover(&enriched));
        info!("Filters: {:?}", selection);

        let view = dashboard.render_cycle(&selection).await?;

        match self.format {
            OutputFormat::Table => {
                let renderer = ChartRenderer::for_terminal();
                println!("{}", renderer.render_view(&view, self.rows.unwrap_or(config.preview_rows)));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
        }

        Ok(())
    }

    /// Flags given on the command line, discovered defaults elsewhere
    fn selection(&self, options: &FilterOptions) -> FilterSpec {
        let mut selection = FilterSpec::defaults_for(options);
        if let Some(outlier) = &self.outlier {
            selection.outlier = outlier.clone();
        }
        if let Some(outlier_knn) = &self.outlier_knn {
            selection.outlier_knn = outlier_knn.clone();
        }
        if !self.months.is_empty() {
            selection.months = self.months.iter().copied().collect();
        }
        if !self.marketplaces.is_empty() {
            selection.marketplaces = self.marketplaces.iter().cloned().collect();
        }
        if !self.days_of_week.is_empty() {
            selection.days_of_week = self.days_of_week.iter().copied().collect();
        }
        selection
    }
}

#[derive(Args)]
pub struct ObjectsCommand {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// KEY=VALUE credentials file (overrides the config file)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Bucket name (overrides the config file)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Only list keys under this prefix
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Maximum number of keys to list
    #[arg(long)]
    pub max_keys: Option<usize>,
}

impl ObjectsCommand {
    pub async fn execute(self) -> Result<()> {
        let config = DashboardConfig::load(self.config.as_deref())?;

        let credentials_path = self
            .credentials
            .or(config.credentials_file)
            .context("No credentials file given (use --credentials or credentials_file)")?;
        let bucket = self
            .bucket
            .or(config.bucket)
            .context("No bucket given (use --bucket or bucket)")?;

        let credentials = StorageCredentials::from_file(&credentials_path)?;
        let client = StorageClient::new(credentials, bucket).await?;
        let objects = client.list_objects(&self.prefix, self.max_keys).await?;

        println!("\n🪣 Objects in {} ({} found):", client.bucket(), objects.len());
        println!("{:-<80}", "");
        for object in &objects {
            let modified = object
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("{:>12}  {:<16}  {}", object.size, modified, object.key);
        }

        Ok(())
    }
}
