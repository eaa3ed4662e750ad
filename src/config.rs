//! Configuration types for docflow-client

use crate::error::{Error, Result};
use crate::types::ExportProgress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default page size for paginated collection
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of page requests issued together
pub const DEFAULT_COLLECT_CONCURRENCY: usize = 5;

/// Default number of parallel file downloads during an export
pub const DEFAULT_EXPORT_CONCURRENCY: usize = 3;

/// Default deflate level for compressible archive entries
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

/// HTTP client configuration for the authenticated request pipeline
///
/// Every field has a serde default, so a config file only needs `base_url`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend API root, e.g. `https://api.example.com/api/v1`
    pub base_url: String,

    /// Timeout for ordinary requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for the credential renewal call (default: 10 seconds)
    ///
    /// Kept shorter than `request_timeout` so queued requests are not held
    /// hostage by a hanging refresh endpoint.
    #[serde(default = "default_refresh_timeout", with = "duration_serde")]
    pub refresh_timeout: Duration,

    /// Path of the token refresh endpoint (default: "/auth/refresh")
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Paths that never get a bearer credential and never trigger renewal
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: default_request_timeout(),
            refresh_timeout: default_refresh_timeout(),
            refresh_path: default_refresh_path(),
            excluded_paths: default_excluded_paths(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything except the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", self.base_url, e),
            key: Some("base_url".to_string()),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported URL scheme '{}'", url.scheme()),
                key: Some("base_url".to_string()),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("request_timeout".to_string()),
            });
        }

        if self.refresh_timeout.is_zero() {
            return Err(Error::Config {
                message: "refresh timeout must be greater than zero".to_string(),
                key: Some("refresh_timeout".to_string()),
            });
        }

        // A refresh call that received a bearer token could recurse into renewal
        if !self.is_excluded(&self.refresh_path) {
            return Err(Error::Config {
                message: format!(
                    "refresh path '{}' must be listed in excluded_paths",
                    self.refresh_path
                ),
                key: Some("excluded_paths".to_string()),
            });
        }

        Ok(())
    }

    /// Whether a request path is on the public-endpoint exclusion list
    ///
    /// Compares the path component only: the query string is ignored and a
    /// trailing slash is tolerated.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.excluded_paths
            .iter()
            .any(|excluded| normalize_path(excluded) == path)
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Options for [`collect_all`](crate::pagination::collect_all)
#[derive(Clone, Debug)]
pub struct CollectOptions {
    /// Page requests issued together in one batch (default: 5)
    pub concurrency: usize,
    /// Items requested per page (default: 100)
    pub page_size: usize,
    /// Checked before every batch
    pub cancel: Option<CancellationToken>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_COLLECT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            cancel: None,
        }
    }
}

impl CollectOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "collect concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        if self.page_size == 0 {
            return Err(Error::Config {
                message: "page size must be at least 1".to_string(),
                key: Some("page_size".to_string()),
            });
        }
        Ok(())
    }
}

/// Progress callback invoked by the exporter
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Options for [`export_archive`](crate::export::export_archive)
#[derive(Clone)]
pub struct ExportOptions {
    /// Parallel downloads (default: 3)
    pub concurrency: usize,
    /// Called after every download attempt and at each phase change
    pub on_progress: Option<ProgressCallback>,
    /// Checked before every claim and before every download
    pub cancel: Option<CancellationToken>,
    /// Download endpoint, `{id}` is replaced by the file id
    pub download_path_template: String,
    /// Deflate level for compressible entries (default: 6)
    pub compression_level: i32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_EXPORT_CONCURRENCY,
            on_progress: None,
            cancel: None,
            download_path_template: "/files/{id}/download".to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl std::fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportOptions")
            .field("concurrency", &self.concurrency)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .field("download_path_template", &self.download_path_template)
            .field("compression_level", &self.compression_level)
            .finish()
    }
}

impl ExportOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "export concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(Error::Config {
                message: format!(
                    "compression level {} is outside 0..=9",
                    self.compression_level
                ),
                key: Some("compression_level".to_string()),
            });
        }
        Ok(())
    }

    /// Resolve the download path for a file id
    pub fn download_path(&self, id: &str) -> String {
        self.download_path_template.replace("{id}", id)
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_refresh_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_excluded_paths() -> Vec<String> {
    [
        "/auth/login",
        "/auth/refresh",
        "/auth/register",
        "/auth/google",
        "/auth/verify-email",
        "/auth/forgot-password",
        "/auth/reset-password",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agent() -> String {
    format!("docflow-client/{}", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("https://api.example.com/api/v1");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.excluded_paths.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://api.example.com"}"#).unwrap();
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert!(config.is_excluded("/auth/login"));
    }

    #[test]
    fn test_durations_serialize_as_seconds() {
        let config = ClientConfig::new("https://api.example.com");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["request_timeout"], 30);
        assert_eq!(json["refresh_timeout"], 10);
    }

    #[test]
    fn test_is_excluded_matches_path_component() {
        let config = ClientConfig::default();
        assert!(config.is_excluded("/auth/login"));
        assert!(config.is_excluded("/auth/login/"));
        assert!(config.is_excluded("/auth/verify-email?token=abc"));
        assert!(!config.is_excluded("/auth/me"));
        assert!(!config.is_excluded("/documents"));
        assert!(!config.is_excluded("/auth/login/extra"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let err = ClientConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "base_url"));

        let err = ClientConfig::new("ftp://files.example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_requires_refresh_path_excluded() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.excluded_paths.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "excluded_paths"));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.refresh_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collect_options_validation() {
        assert!(CollectOptions::default().validate().is_ok());
        let zero = CollectOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        let no_page = CollectOptions {
            page_size: 0,
            ..Default::default()
        };
        assert!(no_page.validate().is_err());
    }

    #[test]
    fn test_export_options() {
        let options = ExportOptions::default();
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.download_path("abc-1"), "/files/abc-1/download");
        assert!(options.validate().is_ok());

        let bad = ExportOptions {
            compression_level: 12,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
