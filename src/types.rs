//! Core types for docflow-client

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh credential pair held by the [`CredentialStore`](crate::auth::CredentialStore)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Bearer token attached to every non-excluded request
    pub access_token: String,
    /// Token exchanged for a new pair when the access token is rejected
    pub refresh_token: String,
    /// Access token expiry, when the backend reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialPair {
    /// Create a pair without expiry information
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    /// Set the access token expiry
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// True if the access token expires within `skew` of now
    ///
    /// A pair without expiry is never considered expired; the backend's 401
    /// is the authority in that case.
    pub fn is_expired(&self, skew: chrono::Duration) -> bool {
        self.expires_at
            .map(|expires_at| expires_at - skew <= Utc::now())
            .unwrap_or(false)
    }
}

// Tokens stay out of logs and panic messages
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body of the token refresh call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRefreshRequest {
    /// Current refresh token
    pub refresh_token: String,
}

/// New credentials returned by the refresh endpoint
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenRefreshResponse {
    /// New access token
    pub access_token: String,
    /// New (rotated) refresh token
    pub refresh_token: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl From<TokenRefreshResponse> for CredentialPair {
    fn from(response: TokenRefreshResponse) -> Self {
        let pair = CredentialPair::new(response.access_token, response.refresh_token);
        match response.expires_in {
            Some(secs) => pair.with_expiry(Utc::now() + chrono::Duration::seconds(secs)),
            None => pair,
        }
    }
}

/// Standard backend response envelope
///
/// ```json
/// { "success": true, "data": [...], "meta": { "total": 240, "offset": 0, "limit": 100 } }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Whether the backend considers the call successful
    pub success: bool,
    /// Payload
    pub data: Option<T>,
    /// Error details when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    /// Pagination metadata on list endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Error object inside an [`Envelope`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvelopeError {
    /// Machine-readable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

/// Pagination metadata returned by list endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Total items in the logical result set
    pub total: usize,
    /// Offset of this page
    #[serde(default)]
    pub offset: usize,
    /// Limit used for this page
    #[serde(default)]
    pub limit: usize,
}

/// One page request produced by the collector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageRequest {
    /// Maximum items to return
    pub limit: usize,
    /// Index of the first item
    pub offset: usize,
}

impl PageRequest {
    /// Query pairs in the backend's `limit`/`offset` convention
    pub fn query_pairs(&self) -> [(String, String); 2] {
        [
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ]
    }
}

/// One page of results returned by a page-fetch function
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in server order
    pub items: Vec<T>,
    /// Total items in the logical result set
    pub total: usize,
}

/// A remote file to include in an export
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File identifier understood by the download endpoint
    pub id: String,
    /// Desired name inside the archive (may collide with others)
    pub display_name: String,
}

impl FileDescriptor {
    /// Create a descriptor
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Document row as returned by the document list endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier
    pub id: String,
    /// Stored file name
    pub file_name: String,
    /// Name the file was uploaded with, preferred for exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl From<DocumentRecord> for FileDescriptor {
    fn from(record: DocumentRecord) -> Self {
        let display_name = record
            .original_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(record.file_name);
        FileDescriptor {
            id: record.id,
            display_name,
        }
    }
}

/// Export phase reported through progress events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    /// Files are being downloaded and appended
    Downloading,
    /// The archive is being finalized
    Finalizing,
    /// The archive is ready
    Done,
}

impl ExportPhase {
    /// Stable string form used in progress payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPhase::Downloading => "downloading",
            ExportPhase::Finalizing => "finalizing",
            ExportPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted by the exporter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Current phase
    pub phase: ExportPhase,
    /// Files attempted so far
    pub current: usize,
    /// Files to attempt
    pub total: usize,
}

/// Finished export
#[derive(Clone, Debug)]
pub struct ExportSummary {
    /// Complete zip archive
    pub archive: Bytes,
    /// Files written into the archive
    pub included: usize,
    /// Files that failed to download and were left out
    pub skipped: usize,
    /// Files requested
    pub total: usize,
}

impl ExportSummary {
    /// True when at least one requested file is missing from the archive
    pub fn is_partial(&self) -> bool {
        self.skipped > 0
    }
}
