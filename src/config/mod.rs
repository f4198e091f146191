use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::source::{FetchMode, FetchSpec};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8510/get_processed_data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}:{line}: expected KEY=VALUE")]
    CredentialLine { path: PathBuf, line: usize },

    #[error("{path}: missing {key}")]
    MissingCredential { path: PathBuf, key: &'static str },

    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
}

/// Dashboard settings, loaded from YAML and overridable from the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub endpoint: String,
    pub fetch: FetchMode,
    /// Per-request timeout; the HTTP client default applies when unset
    pub request_timeout_secs: Option<u64>,
    pub credentials_file: Option<PathBuf>,
    pub bucket: Option<String>,
    pub preview_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fetch: FetchMode::default(),
            request_timeout_secs: None,
            credentials_file: None,
            bucket: None,
            preview_rows: 20,
        }
    }
}

impl DashboardConfig {
    /// Load from a YAML file, or use defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.fetch {
            FetchMode::Paginated { batch_size: 0 } => Err(ConfigError::ZeroBatchSize),
            _ => Ok(()),
        }
    }

    pub fn fetch_spec(&self) -> FetchSpec {
        FetchSpec {
            endpoint: self.endpoint.clone(),
            mode: self.fetch.clone(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Storage credentials handed to the storage client constructor.
/// Read from a `KEY=VALUE` file; never exported to the process environment.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl StorageCredentials {
    pub const ACCESS_KEY: &'static str = "AWS_ACCESS_KEY_ID";
    pub const SECRET_KEY: &'static str = "AWS_SECRET_ACCESS_KEY";
    pub const REGION: &'static str = "AWS_REGION";

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials = Self::parse(&text, path)?;
        info!("Storage credentials loaded from {}", path.display());
        Ok(credentials)
    }

    /// Parse `KEY=VALUE` lines; blank lines and `#` comments are skipped
    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut region = None;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::CredentialLine {
                path: path.to_path_buf(),
                line: number + 1,
            })?;
            let value = Some(value.trim().to_string());
            match key.trim() {
                Self::ACCESS_KEY => access_key_id = value,
                Self::SECRET_KEY => secret_access_key = value,
                Self::REGION => region = value,
                _ => {}
            }
        }

        let require = |value: Option<String>, key: &'static str| {
            value.ok_or_else(|| ConfigError::MissingCredential {
                path: path.to_path_buf(),
                key,
            })
        };
        Ok(Self {
            access_key_id: require(access_key_id, Self::ACCESS_KEY)?,
            secret_access_key: require(secret_access_key, Self::SECRET_KEY)?,
            region: require(region, Self::REGION)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("aws_credentials.txt")
    }

    #[test]
    fn test_defaults_use_paginated_fetch() {
        let config = DashboardConfig::load(None).unwrap();
        assert_eq!(config.fetch, FetchMode::Paginated { batch_size: 10_000 });
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config: DashboardConfig = serde_yaml::from_str(
            "endpoint: http://example.test/get_processed_data\nfetch:\n  mode: bulk\nrequest_timeout_secs: 30\n",
        )
        .unwrap();

        assert_eq!(config.fetch, FetchMode::Bulk);
        assert_eq!(config.preview_rows, 20);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.fetch_spec().endpoint, "http://example.test/get_processed_data");
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = DashboardConfig {
            fetch: FetchMode::Paginated { batch_size: 0 },
            ..DashboardConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBatchSize)));
    }

    #[test]
    fn test_credentials_parse() {
        let text = "# ec2 box\nAWS_ACCESS_KEY_ID=AKIA123\nAWS_SECRET_ACCESS_KEY = s3cr3t\n\nAWS_REGION=us-east-2\n";
        let credentials = StorageCredentials::parse(text, &path()).unwrap();

        assert_eq!(credentials.access_key_id, "AKIA123");
        assert_eq!(credentials.secret_access_key, "s3cr3t");
        assert_eq!(credentials.region, "us-east-2");
        assert!(!format!("{:?}", credentials).contains("s3cr3t"));
    }

    #[test]
    fn test_credentials_reject_bad_lines_and_missing_keys() {
        let bad = StorageCredentials::parse("AWS_REGION us-east-2\n", &path());
        assert!(matches!(bad, Err(ConfigError::CredentialLine { line: 1, .. })));

        let missing = StorageCredentials::parse("AWS_ACCESS_KEY_ID=a\nAWS_REGION=r\n", &path());
        assert!(matches!(
            missing,
            Err(ConfigError::MissingCredential { key: "AWS_SECRET_ACCESS_KEY", .. })
        ));
    }
}
