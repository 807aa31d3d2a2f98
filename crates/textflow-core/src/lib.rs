use std::time::Duration;
use thiserror::Error;

pub mod client;
pub mod config_file;
pub mod forms;
pub mod models;
pub mod operation;
pub mod report;
pub mod session;
pub mod submission;

// Re-export for convenience
pub use client::{AnalyticsBackend, ApiClient, ApiFuture};
pub use models::{
    AnalyzeResponse, EmailDelivery, HistoryEntry, InboxMessage, OperationResult, RunStats,
    SearchHit,
};
pub use operation::Operation;
pub use submission::{AnalyzeRequest, GUEST_USER, submit_dataset, synthesize_filename};

/// Where the analytics backend listens in a local deployment.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// A merged dataset produced by the CSV ingestion pipeline.
///
/// Immutable once computed: the merged text starts with the header of the
/// first accepted file, followed by the data lines of every accepted file
/// in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionResult {
    pub merged_text: String,
    /// Sum over files of `max(0, lines - 1)`.
    pub total_rows: usize,
    /// Names of the accepted files, in merge order.
    pub sources: Vec<String>,
}

impl IngestionResult {
    pub fn file_count(&self) -> usize {
        self.sources.len()
    }

    /// The header line contributed by the first file.
    pub fn header(&self) -> &str {
        self.merged_text.split('\n').next().unwrap_or("")
    }

    /// Number of `\n`-delimited lines in the merged text.
    pub fn line_count(&self) -> usize {
        self.merged_text.split('\n').count()
    }

    pub fn is_empty(&self) -> bool {
        self.merged_text.trim().is_empty()
    }

    /// Filename reported to the backend for this dataset.
    pub fn submission_filename(&self) -> String {
        synthesize_filename(&self.sources)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Resolved runtime configuration for talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Per-file read timeout during ingestion (0 = no timeout).
    pub read_timeout_secs: u64,
    /// Identity sent with analysis requests when no session is stored.
    pub user_email: Option<String>,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            user_email: None,
            color: true,
        }
    }
}

impl Config {
    /// Build a config from file values layered over the defaults.
    pub fn from_config_file(file: &config_file::ConfigFile) -> Self {
        let defaults = Self::default();
        let server = file.server.as_ref();
        let ingest = file.ingest.as_ref();
        Self {
            base_url: server
                .and_then(|s| s.base_url.clone())
                .unwrap_or(defaults.base_url),
            request_timeout_secs: server
                .and_then(|s| s.request_timeout_secs)
                .unwrap_or(defaults.request_timeout_secs),
            read_timeout_secs: ingest
                .and_then(|i| i.read_timeout_secs)
                .unwrap_or(defaults.read_timeout_secs),
            user_email: file.account.as_ref().and_then(|a| a.email.clone()),
            color: file
                .display
                .as_ref()
                .and_then(|d| d.color)
                .unwrap_or(defaults.color),
        }
    }

    /// Apply environment overrides (`TEXTFLOW_*`) on top of this config.
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`; unparsable numeric
    /// values are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("TEXTFLOW_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(secs) = lookup("TEXTFLOW_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = lookup("TEXTFLOW_READ_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.read_timeout_secs = secs;
        }
        if let Some(user) = lookup("TEXTFLOW_USER").filter(|v| !v.trim().is_empty()) {
            self.user_email = Some(user);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `None` when read timeouts are disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    /// Base URL without a trailing slash.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::config_file::{ConfigFile, IngestConfig, ServerConfig};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_file_is_empty() {
        let config = Config::from_config_file(&ConfigFile::default());
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn file_values_override_defaults() {
        let file = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("https://api.example.org/".into()),
                request_timeout_secs: Some(5),
            }),
            ingest: Some(IngestConfig {
                read_timeout_secs: Some(0),
            }),
            ..Default::default()
        };
        let config = Config::from_config_file(&file);
        assert_eq!(config.normalized_base_url(), "https://api.example.org");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn env_overrides_file() {
        let file = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("http://file:1".into()),
                request_timeout_secs: Some(5),
            }),
            ..Default::default()
        };
        let config = Config::from_config_file(&file).with_env_overrides(env(&[
            ("TEXTFLOW_API_BASE_URL", "http://env:2"),
            ("TEXTFLOW_TIMEOUT", "not-a-number"),
            ("TEXTFLOW_USER", "ana@example.org"),
        ]));
        assert_eq!(config.base_url, "http://env:2");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.user_email.as_deref(), Some("ana@example.org"));
    }

    #[test]
    fn ingestion_result_accessors() {
        let result = IngestionResult {
            merged_text: "h,a\n1,2\n3,4".into(),
            total_rows: 2,
            sources: vec!["a.csv".into(), "b.csv".into()],
        };
        assert_eq!(result.header(), "h,a");
        assert_eq!(result.line_count(), 3);
        assert_eq!(result.file_count(), 2);
        assert_eq!(result.submission_filename(), "Bulk_Merge_2_files.csv");
    }
}
