//! # docflow-client
//!
//! Resilient data-access layer for a document-processing dashboard backend.
//!
//! ## Design Philosophy
//!
//! docflow-client is designed to be:
//! - **Transparent about sessions** - Expired credentials are renewed once
//!   and failed requests replayed without the caller noticing
//! - **Bounded** - Bulk reads and exports never run more than a configured
//!   number of requests at a time
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! It is made of three parts:
//! - [`ApiClient`]: the authenticated request pipeline with single-flight
//!   credential renewal
//! - [`pagination`]: collecting a whole offset/limit paginated result set
//! - [`export`]: downloading many files into a single zip archive
//!
//! ## Quick Start
//!
//! ```no_run
//! use docflow_client::{
//!     ApiClient, ApiRequest, ClientConfig, CollectOptions, CredentialStore, ExportOptions,
//!     export::export_documents,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://api.example.com/api/v1");
//!     let client = ApiClient::without_observer(config, CredentialStore::new())?;
//!
//!     client
//!         .login("/auth/login", &json!({ "email": "ops@example.com", "password": "secret" }))
//!         .await?;
//!
//!     let summary = export_documents(
//!         &client,
//!         ApiRequest::get("/documents").query("status", "processed"),
//!         CollectOptions::default(),
//!         ExportOptions::default(),
//!     )
//!     .await?;
//!
//!     std::fs::write("documents.zip", &summary.archive)?;
//!     println!("{} of {} files exported", summary.included, summary.total);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Credential storage and session lifecycle
pub mod auth;
/// Authenticated request pipeline
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Bulk file export into zip archives
pub mod export;
/// Paginated collection
pub mod pagination;
/// Core types
pub mod types;

// Re-export commonly used types
pub use auth::{CredentialStore, NoopSessionObserver, SessionExpiry, SessionObserver};
pub use client::{ApiClient, ApiRequest};
pub use config::{ClientConfig, CollectOptions, ExportOptions, ProgressCallback};
pub use error::{Error, RenewalError, Result};
pub use export::{export_archive, export_documents};
pub use pagination::collect_all;
pub use types::{
    CredentialPair, DocumentRecord, ExportPhase, ExportProgress, ExportSummary, FileDescriptor,
    Page, PageRequest,
};
