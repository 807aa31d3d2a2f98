//! Building and submitting `/api/analyze` requests from a merged dataset.

use serde::Serialize;

use crate::client::AnalyticsBackend;
use crate::models::AnalyzeResponse;
use crate::{CoreError, IngestionResult, Operation};

/// Identity reported when nobody is logged in.
pub const GUEST_USER: &str = "Guest";

/// Fallback name when the dataset has no recorded source files.
pub const DEFAULT_DATASET_NAME: &str = "dataset.csv";

/// Payload of `POST /api/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    pub text: String,
    pub operations: Vec<Operation>,
    pub email: String,
    pub email_summary: bool,
    pub filename: String,
}

impl AnalyzeRequest {
    /// Validate and assemble a request for `dataset`.
    ///
    /// Fails when the dataset is empty or no operation is selected.
    pub fn new(
        dataset: &IngestionResult,
        operations: &[Operation],
        email: Option<&str>,
        email_summary: bool,
    ) -> Result<Self, CoreError> {
        if dataset.is_empty() || operations.is_empty() {
            return Err(CoreError::Validation(
                "upload data and select at least one operation".to_string(),
            ));
        }

        Ok(Self {
            text: dataset.merged_text.clone(),
            operations: operations.to_vec(),
            email: email
                .filter(|e| !e.trim().is_empty())
                .unwrap_or(GUEST_USER)
                .to_string(),
            email_summary,
            filename: dataset.submission_filename(),
        })
    }
}

/// Name reported to the backend for a selection of `sources`.
///
/// A single file keeps its own name; several merged files get a
/// `Bulk_Merge_<N>_files.csv` label.
pub fn synthesize_filename(sources: &[String]) -> String {
    match sources {
        [] => DEFAULT_DATASET_NAME.to_string(),
        [only] => only.clone(),
        many => format!("Bulk_Merge_{}_files.csv", many.len()),
    }
}

/// Validate `dataset`, send it to `backend` and return the analysis.
pub async fn submit_dataset(
    backend: &dyn AnalyticsBackend,
    dataset: &IngestionResult,
    operations: &[Operation],
    email: Option<&str>,
    email_summary: bool,
) -> Result<AnalyzeResponse, CoreError> {
    let request = AnalyzeRequest::new(dataset, operations, email, email_summary)?;
    tracing::info!(
        filename = %request.filename,
        rows = dataset.total_rows,
        operations = request.operations.len(),
        email_summary,
        "submitting dataset for analysis"
    );
    let response = backend.analyze(&request).await?;
    tracing::debug!(results = response.results.len(), "analysis complete");
    Ok(response)
}
