use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{Dataset, Record};

/// Errors raised by a single request against the data endpoint.
/// They never leave this module: fetches degrade to empty or partial data instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// How rows are pulled from the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FetchMode {
    /// One request answering with `columns`, `index` and `data`
    Bulk,
    /// Fixed-size pages requested until one comes back empty
    Paginated { batch_size: usize },
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Paginated { batch_size: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSpec {
    pub endpoint: String,
    pub mode: FetchMode,
}

/// Minimal HTTP surface the data source needs
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport; without a timeout the client default applies
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        });
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Malformed(format!("body is not JSON: {}", e)))
    }
}

/// Remote dataset reader supporting both fetch strategies behind one call
pub struct DataSource<T> {
    transport: T,
    progress: Option<ProgressBar>,
}

impl<T: Transport> DataSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            progress: None,
        }
    }

    /// Report fetched batches on a terminal spinner
    pub fn with_progress(mut self) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.progress = Some(spinner);
        self
    }

    /// Fetch the whole dataset. Request failures are logged and degrade
    /// to whatever was read before the failure.
    pub async fn fetch(&self, spec: &FetchSpec) -> Dataset {
        info!("Fetching data from {} ({:?})", spec.endpoint, spec.mode);
        let dataset = match spec.mode {
            FetchMode::Bulk => self.fetch_bulk(&spec.endpoint).await,
            FetchMode::Paginated { batch_size } => {
                self.fetch_paginated(&spec.endpoint, batch_size).await
            }
        };
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!("Fetched {} rows with {} columns", dataset.len(), dataset.columns().len());
        dataset
    }

    async fn fetch_bulk(&self, url: &str) -> Dataset {
        if let Some(pb) = &self.progress {
            pb.set_message(format!("Downloading {}", url));
        }
        let body = match self.transport.get_json(url, &[]).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Bulk fetch failed, continuing with no data: {}", e);
                return Dataset::new();
            }
        };
        match split_to_dataset(&body) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("Bulk response rejected, continuing with no data: {}", e);
                Dataset::new()
            }
        }
    }

    async fn fetch_paginated(&self, url: &str, batch_size: usize) -> Dataset {
        let mut all_rows = Dataset::new();
        let mut batch_number: usize = 0;

        loop {
            let query = [
                ("batch_size", batch_size.to_string()),
                ("batch_number", batch_number.to_string()),
            ];
            let batch = match self.transport.get_json(url, &query).await {
                Ok(body) => records_to_dataset(&body),
                Err(e) => Err(e),
            };
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        "Batch {} failed, keeping {} rows fetched so far: {}",
                        batch_number,
                        all_rows.len(),
                        e
                    );
                    break;
                }
            };

            if batch.is_empty() {
                debug!("Batch {} is empty, end of data", batch_number);
                break;
            }

            debug!("Batch {} returned {} rows", batch_number, batch.len());
            all_rows.append(batch);
            batch_number += 1;

            if let Some(pb) = &self.progress {
                pb.set_message(format!("{} batches, {} rows", batch_number, all_rows.len()));
                pb.tick();
            }
        }

        all_rows
    }
}

/// Session cache over a data source, keyed by endpoint URL and never invalidated
pub struct CachedSource<T> {
    source: DataSource<T>,
    cache: HashMap<String, Dataset>,
}

impl<T: Transport> CachedSource<T> {
    pub fn new(source: DataSource<T>) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub async fn fetch(&mut self, spec: &FetchSpec) -> &Dataset {
        if !self.cache.contains_key(&spec.endpoint) {
            let dataset = self.source.fetch(spec).await;
            self.cache.insert(spec.endpoint.clone(), dataset);
        } else {
            debug!("Serving {} from session cache", spec.endpoint);
        }
        &self.cache[&spec.endpoint]
    }
}

/// Convert a column-oriented `{columns, index, data}` body into rows.
/// Missing or empty parts yield an empty dataset; misaligned parts are an error.
pub fn split_to_dataset(body: &Value) -> Result<Dataset, FetchError> {
    let obj = body
        .as_object()
        .ok_or_else(|| FetchError::Malformed("expected a JSON object".to_string()))?;

    let part = |name: &str| obj.get(name).and_then(Value::as_array).filter(|a| !a.is_empty());
    let (columns, index, data) = match (part("columns"), part("index"), part("data")) {
        (Some(c), Some(i), Some(d)) => (c, i, d),
        _ => {
            warn!("Response is missing columns, index or data; treating as empty");
            return Ok(Dataset::new());
        }
    };

    let columns: Vec<String> = columns
        .iter()
        .map(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    if data.len() != index.len() {
        return Err(FetchError::Malformed(format!(
            "{} index keys but {} data rows",
            index.len(),
            data.len()
        )));
    }

    let mut rows = Vec::with_capacity(data.len());
    for (i, values) in data.iter().enumerate() {
        let values = values
            .as_array()
            .ok_or_else(|| FetchError::Malformed(format!("data row {} is not an array", i)))?;
        if values.len() != columns.len() {
            return Err(FetchError::Malformed(format!(
                "data row {} has {} values for {} columns",
                i,
                values.len(),
                columns.len()
            )));
        }
        let row: Record = columns.iter().cloned().zip(values.iter().cloned()).collect();
        rows.push(row);
    }

    Ok(Dataset::with_index(columns, index.clone(), rows))
}

/// Convert a record-oriented page into rows. Accepts an array of objects,
/// an object of column arrays, or an object of columns keyed by row label.
pub fn records_to_dataset(body: &Value) -> Result<Dataset, FetchError> {
    match body {
        Value::Array(items) => {
            let records = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object()
                        .cloned()
                        .ok_or_else(|| FetchError::Malformed(format!("record {} is not an object", i)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Dataset::from_records(records))
        }
        Value::Object(columns) => columns_to_dataset(columns),
        other => Err(FetchError::Malformed(format!("unexpected page body: {}", type_name(other)))),
    }
}

fn columns_to_dataset(columns: &Map<String, Value>) -> Result<Dataset, FetchError> {
    let mut labels: Vec<String> = Vec::new();
    let mut rows: Vec<Record> = Vec::new();
    let mut shaped = false;

    for (column, values) in columns {
        match values {
            Value::Array(values) => {
                if !shaped {
                    rows = vec![Record::new(); values.len()];
                    labels = (0..values.len()).map(|i| i.to_string()).collect();
                    shaped = true;
                }
                if values.len() != rows.len() {
                    return Err(FetchError::Malformed(format!(
                        "column '{}' has {} values, expected {}",
                        column,
                        values.len(),
                        rows.len()
                    )));
                }
                for (row, value) in rows.iter_mut().zip(values) {
                    row.insert(column.clone(), value.clone());
                }
            }
            Value::Object(by_label) => {
                shaped = true;
                for (label, value) in by_label {
                    let position = match labels.iter().position(|l| l == label) {
                        Some(p) => p,
                        None => {
                            labels.push(label.clone());
                            rows.push(Record::new());
                            labels.len() - 1
                        }
                    };
                    rows[position].insert(column.clone(), value.clone());
                }
            }
            other => {
                return Err(FetchError::Malformed(format!(
                    "column '{}' holds {} instead of values",
                    column,
                    type_name(other)
                )))
            }
        }
    }

    // Every row carries every column, in the page's column order
    let records = rows
        .into_iter()
        .map(|row| {
            columns
                .keys()
                .map(|name| (name.clone(), row.get(name).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    Ok(Dataset::from_records(records))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use serde_json::json;

    const URL: &str = "http://data.test/get_processed_data";

    fn paginated(batch_size: usize) -> FetchSpec {
        FetchSpec {
            endpoint: URL.to_string(),
            mode: FetchMode::Paginated { batch_size },
        }
    }

    fn bulk() -> FetchSpec {
        FetchSpec {
            endpoint: URL.to_string(),
            mode: FetchMode::Bulk,
        }
    }

    fn ids(dataset: &Dataset) -> Vec<i64> {
        dataset
            .column_values("id")
            .map(|v| v.and_then(Value::as_i64).unwrap_or(-1))
            .collect()
    }

    #[tokio::test]
    async fn test_paginated_fetch_concatenates_until_empty_batch() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!([{"id": 1}, {"id": 2}])),
            Ok(json!([{"id": 3}])),
            Ok(json!([])),
        ]);
        let source = DataSource::new(&transport);

        let dataset = source.fetch(&paginated(2)).await;

        assert_eq!(ids(&dataset), vec![1, 2, 3]);
        assert_eq!(dataset.index(), &[json!(0), json!(1), json!(2)]);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_paginated_fetch_sends_batch_parameters() {
        let transport = ScriptedTransport::new(vec![Ok(json!([{"id": 1}])), Ok(json!([]))]);
        let source = DataSource::new(&transport);

        source.fetch(&paginated(10_000)).await;

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, URL);
        assert_eq!(
            calls[0].1,
            vec![
                ("batch_size".to_string(), "10000".to_string()),
                ("batch_number".to_string(), "0".to_string()),
            ]
        );
        assert_eq!(calls[1].1[1], ("batch_number".to_string(), "1".to_string()));
    }

    #[tokio::test]
    async fn test_paginated_fetch_makes_n_plus_one_requests() {
        let mut script: Vec<Result<Value, FetchError>> = (0..4)
            .map(|b| Ok(json!([{"id": b * 3}, {"id": b * 3 + 1}, {"id": b * 3 + 2}])))
            .collect();
        script.push(Ok(json!([{"id": 12}])));
        script.push(Ok(json!([])));
        let transport = ScriptedTransport::new(script);

        let dataset = DataSource::new(&transport).fetch(&paginated(3)).await;

        assert_eq!(dataset.len(), 13);
        assert_eq!(ids(&dataset), (0..13).collect::<Vec<_>>());
        assert_eq!(transport.call_count(), 6);
    }

    #[tokio::test]
    async fn test_paginated_fetch_keeps_rows_before_a_failed_batch() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!([{"id": 1}, {"id": 2}])),
            Err(FetchError::Status {
                url: URL.to_string(),
                status: 502,
            }),
            Ok(json!([{"id": 3}])),
        ]);

        let dataset = DataSource::new(&transport).fetch(&paginated(2)).await;

        assert_eq!(ids(&dataset), vec![1, 2]);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_paginated_fetch_stops_on_malformed_page() {
        let transport = ScriptedTransport::new(vec![Ok(json!([{"id": 1}])), Ok(json!("oops"))]);

        let dataset = DataSource::new(&transport).fetch(&paginated(1)).await;

        assert_eq!(ids(&dataset), vec![1]);
    }

    #[tokio::test]
    async fn test_bulk_fetch_rebuilds_rows_from_split_body() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "columns": ["id", "marketplace"],
            "index": [10, 11, 12],
            "data": [[1, "A"], [2, "A"], [3, "B"]],
        }))]);

        let dataset = DataSource::new(&transport).fetch(&bulk()).await;

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.index(), &[json!(10), json!(11), json!(12)]);
        assert_eq!(dataset.columns(), &["id", "marketplace"]);
        assert_eq!(dataset.rows()[2]["marketplace"], json!("B"));
        assert!(transport.calls.lock().unwrap()[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_fetch_degrades_to_empty_on_transport_error() {
        let transport = ScriptedTransport::new(vec![Err(FetchError::Transport {
            url: URL.to_string(),
            message: "connection refused".to_string(),
        })]);

        let dataset = DataSource::new(&transport).fetch(&bulk()).await;

        assert!(dataset.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_split_missing_or_empty_parts_yield_empty_dataset() {
        let missing = json!({"columns": ["id"], "data": [[1]]});
        let empty = json!({"columns": [], "index": [0], "data": [[1]]});

        assert!(split_to_dataset(&missing).unwrap().is_empty());
        assert!(split_to_dataset(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_split_rejects_misaligned_parts() {
        let short_data = json!({"columns": ["id"], "index": [0, 1], "data": [[1]]});
        let wide_row = json!({"columns": ["id"], "index": [0], "data": [[1, 2]]});

        assert!(matches!(split_to_dataset(&short_data), Err(FetchError::Malformed(_))));
        assert!(matches!(split_to_dataset(&wide_row), Err(FetchError::Malformed(_))));
        assert!(matches!(split_to_dataset(&json!([1, 2])), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_records_accepts_column_oriented_pages() {
        let arrays = json!({"id": [1, 2], "marketplace": ["A", "B"]});
        let keyed = json!({"id": {"0": 1, "1": 2}, "marketplace": {"0": "A", "1": "B"}});

        for body in [arrays, keyed] {
            let dataset = records_to_dataset(&body).unwrap();
            assert_eq!(ids(&dataset), vec![1, 2]);
            assert_eq!(dataset.columns(), &["id", "marketplace"]);
            assert_eq!(dataset.rows()[1]["marketplace"], json!("B"));
        }
    }

    #[test]
    fn test_records_treats_empty_bodies_as_end_of_data() {
        assert!(records_to_dataset(&json!([])).unwrap().is_empty());
        assert!(records_to_dataset(&json!({})).unwrap().is_empty());
        assert!(records_to_dataset(&json!({"id": []})).unwrap().is_empty());
    }

    #[test]
    fn test_records_rejects_ragged_columns() {
        let ragged = json!({"id": [1, 2], "marketplace": ["A"]});
        assert!(matches!(records_to_dataset(&ragged), Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_cached_source_fetches_each_endpoint_once() {
        let transport = ScriptedTransport::new(vec![Ok(json!([{"id": 1}])), Ok(json!([]))]);
        let mut cached = CachedSource::new(DataSource::new(&transport));

        let first = cached.fetch(&paginated(5)).await.clone();
        let second = cached.fetch(&paginated(5)).await.clone();

        assert_eq!(first, second);
        assert_eq!(ids(&second), vec![1]);
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_fetch_mode_deserializes_from_tagged_yaml() {
        let mode: FetchMode = serde_yaml::from_str("mode: paginated\nbatch_size: 500\n").unwrap();
        assert_eq!(mode, FetchMode::Paginated { batch_size: 500 });

        let mode: FetchMode = serde_yaml::from_str("mode: bulk\n").unwrap();
        assert_eq!(mode, FetchMode::Bulk);
    }
}
