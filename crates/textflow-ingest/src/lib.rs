use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod generation;
pub mod merge;
pub mod reader;
pub mod selection;

// Re-export domain types for convenience
pub use textflow_core::IngestionResult;

pub use generation::{
    DatasetState, Generation, SelectionTicket, SelectionTracker, ingest, ingest_tracked,
};
pub use merge::{ProcessedFile, merge_contents, process_file, row_count};
pub use selection::{FileSource, SelectedFile, Selection};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no CSV files in the selection")]
    NoValidFiles,
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is not valid UTF-8 text")]
    Decode { name: String },
    #[error("reading {name} timed out after {timeout:?}")]
    ReadTimeout { name: String, timeout: Duration },
    #[error("selection {generation} was superseded")]
    Superseded { generation: Generation },
    #[error("cannot list directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Stale results are dropped silently rather than reported.
    pub fn is_superseded(&self) -> bool {
        matches!(self, IngestError::Superseded { .. })
    }

    /// Whether the selection itself was unusable (as opposed to a read failure).
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            IngestError::NoValidFiles | IngestError::Directory { .. }
        )
    }
}

/// Knobs for a single ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Upper bound on each file read; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(textflow_core::DEFAULT_READ_TIMEOUT_SECS)),
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &textflow_core::Config) -> Self {
        Self {
            read_timeout: config.read_timeout(),
        }
    }
}
