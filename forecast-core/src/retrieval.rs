//! Fetching observation CSV files.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::{fmt::Debug, path::PathBuf, time::Duration};

use crate::{Config, error::RetrievalError, model::RecordSet, parser::parse_csv};

#[async_trait]
pub trait DataSource: Send + Sync + Debug {
    /// Return the CSV text of `file_name`, header row included.
    async fn fetch_csv(&self, file_name: &str) -> Result<String, RetrievalError>;
}

/// Only plain `*.csv` names are served; anything that could leave the data
/// directory is rejected.
pub fn validate_file_name(file_name: &str) -> Result<(), RetrievalError> {
    let invalid = || RetrievalError::InvalidFileName(file_name.to_string());

    let stem = file_name.strip_suffix(".csv").ok_or_else(invalid)?;
    if stem.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
        return Err(invalid());
    }
    Ok(())
}

/// Bounded retry for transient failures (transport errors and 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }
}

/// Reads `GET {base}/data/{fileName}`.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    base_url: String,
    retry: RetryPolicy,
    http: Client,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry(base_url, RetryPolicy::default())
    }

    pub fn with_retry(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            http: Client::new(),
        }
    }

    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/data/{file_name}", self.base_url)
    }

    async fn fetch_once(&self, file_name: &str) -> Result<String, RetrievalError> {
        let url = self.file_url(file_name);

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RetrievalError::Network(url.clone(), e))?;

        let status = res.status();
        match status {
            StatusCode::BAD_REQUEST => return Err(RetrievalError::InvalidFileName(file_name.to_string())),
            StatusCode::NOT_FOUND => return Err(RetrievalError::NotFound(file_name.to_string())),
            _ => {}
        }

        let body = res
            .text()
            .await
            .map_err(|e| RetrievalError::Network(url.clone(), e))?;

        if !status.is_success() {
            return Err(RetrievalError::Status {
                file: file_name.to_string(),
                status,
                body: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }
}

fn is_transient(err: &RetrievalError) -> bool {
    match err {
        RetrievalError::Network(..) => true,
        RetrievalError::Status { status, .. } => status.is_server_error(),
        _ => false,
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch_csv(&self, file_name: &str) -> Result<String, RetrievalError> {
        validate_file_name(file_name)?;

        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(file_name).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < attempts && is_transient(&e) => {
                    tracing::warn!(file = file_name, attempt, error = %e, "data fetch failed, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Reads CSV files straight from a local data directory.
#[derive(Debug, Clone)]
pub struct LocalDataSource {
    dir: PathBuf,
}

impl LocalDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DataSource for LocalDataSource {
    async fn fetch_csv(&self, file_name: &str) -> Result<String, RetrievalError> {
        validate_file_name(file_name)?;

        let path = self.dir.join(file_name);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RetrievalError::NotFound(file_name.to_string())
            } else {
                RetrievalError::Io(path.display().to_string(), e)
            }
        })
    }
}

/// Fetch `file_name` and parse it.
pub async fn fetch_records(source: &dyn DataSource, file_name: &str) -> Result<RecordSet, RetrievalError> {
    let text = source.fetch_csv(file_name).await.inspect_err(|e| {
        tracing::warn!(file = file_name, error = %e, "data unavailable");
    })?;
    Ok(parse_csv(&text))
}

/// Construct the data source from config: a local directory when one is set,
/// otherwise the HTTP endpoint.
pub fn data_source_from_config(config: &Config) -> Box<dyn DataSource> {
    match &config.data.data_dir {
        Some(dir) => Box::new(LocalDataSource::new(dir.clone())),
        None => Box::new(HttpDataSource::with_retry(
            config.data.base_url.as_str(),
            config.data.retry_policy(),
        )),
    }
}
