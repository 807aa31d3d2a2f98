//! Wire types for the analytics backend's JSON endpoints.
//!
//! Backend rows come straight out of SQLite, so most columns are nullable
//! and default when missing.

use serde::{Deserialize, Serialize};

/// Output of one operation in an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub title: String,
    pub output: String,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

/// Run statistics reported by `/api/analyze`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of data segments the backend split the dataset into.
    #[serde(default)]
    pub total_chunks: u64,
    /// Processing duration in seconds.
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub alert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub results: Vec<OperationResult>,
    #[serde(default)]
    pub stats: Option<RunStats>,
}

/// One row of `/api/history` (the calendar view).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(default)]
    pub filename: Option<String>,
    /// Comma-joined operation labels.
    #[serde(default)]
    pub operations: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub records_count: Option<i64>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    /// JSON-encoded `Vec<OperationResult>`.
    #[serde(default)]
    pub report_data: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One row of `/api/inbox`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub report_data: Option<String>,
    #[serde(default)]
    pub email_sent: i64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Delivery state of the summary email attached to an inbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDelivery {
    NotRequested,
    Sent,
    Failed,
}

impl EmailDelivery {
    pub fn from_flag(flag: i64) -> Self {
        match flag {
            1 => EmailDelivery::Sent,
            2 => EmailDelivery::Failed,
            _ => EmailDelivery::NotRequested,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EmailDelivery::NotRequested => "not requested",
            EmailDelivery::Sent => "sent",
            EmailDelivery::Failed => "failed",
        }
    }
}

impl InboxMessage {
    pub fn email_delivery(&self) -> EmailDelivery {
        EmailDelivery::from_flag(self.email_sent)
    }
}

/// One indexed cell returned by `/api/search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub email: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub message: &'a str,
}

/// Generic `{message}` / `{error}` body used by the mutation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Set by `/api/login` to the authenticated email.
    #[serde(default)]
    pub user: Option<String>,
}
