//! Mock dashboard backend built on wiremock
//!
//! The backend issues `old-access` before a renewal and `new-access` after
//! it. Protected endpoints mounted here reject `old-access` with 401 so every
//! test exercises the renewal path.

use docflow_client::{
    ApiClient, ClientConfig, CredentialPair, CredentialStore, SessionExpiry, SessionObserver,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Access token the session starts with (rejected by protected endpoints)
pub const OLD_ACCESS: &str = "old-access";
/// Access token issued by the refresh endpoint
pub const NEW_ACCESS: &str = "new-access";
/// Refresh token the session starts with
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Observer recording every session lifecycle notification
#[derive(Default)]
pub struct SessionLog {
    pub renewed: AtomicUsize,
    pub expired: Mutex<Vec<SessionExpiry>>,
}

impl SessionLog {
    pub fn renewals(&self) -> usize {
        self.renewed.load(Ordering::SeqCst)
    }

    pub fn expiries(&self) -> Vec<SessionExpiry> {
        self.expired.lock().unwrap().clone()
    }
}

impl SessionObserver for SessionLog {
    fn on_renewed(&self, _pair: &CredentialPair) {
        self.renewed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_expired(&self, expiry: &SessionExpiry) {
        self.expired.lock().unwrap().push(expiry.clone());
    }
}

/// A running mock backend
pub struct FakeBackend {
    pub server: MockServer,
}

impl FakeBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client whose session holds the stale `old-access` token
    pub fn stale_session_client(&self) -> (ApiClient, CredentialStore, Arc<SessionLog>) {
        let store =
            CredentialStore::with_credentials(CredentialPair::new(OLD_ACCESS, REFRESH_TOKEN));
        self.client_with(store)
    }

    /// Client around an arbitrary store
    pub fn client_with(&self, store: CredentialStore) -> (ApiClient, CredentialStore, Arc<SessionLog>) {
        let log = Arc::new(SessionLog::default());
        let client = ApiClient::new(
            ClientConfig::new(self.server.uri()),
            store.clone(),
            log.clone(),
        )
        .unwrap();
        (client, store, log)
    }

    /// Refresh endpoint exchanging `refresh-1` for `new-access`
    pub async fn mount_refresh(&self, delay: Duration, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refresh_token": REFRESH_TOKEN })))
            .respond_with(
                envelope(json!({
                    "access_token": NEW_ACCESS,
                    "refresh_token": "refresh-2",
                    "expires_in": 900
                }))
                .set_delay(delay),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Refresh endpoint that rejects every refresh token
    pub async fn mount_refresh_rejected(&self, delay: Duration, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({
                        "success": false,
                        "error": { "code": "TOKEN_REVOKED", "message": "Refresh token revoked" }
                    }))
                    .set_delay(delay),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Login endpoint accepting one email/password pair
    pub async fn mount_login(&self, email: &str, password: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": email, "password": password })))
            .respond_with(envelope(json!({
                "access_token": NEW_ACCESS,
                "refresh_token": REFRESH_TOKEN,
                "expires_in": 900
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject `old-access` with 401 on every GET
    pub async fn reject_old_token(&self) {
        Mock::given(method("GET"))
            .and(header("authorization", format!("Bearer {OLD_ACCESS}").as_str()))
            .respond_with(ResponseTemplate::new(401))
            .mount(&self.server)
            .await;
    }

    /// Paginated list endpoint serving `records` in pages of `limit`
    ///
    /// Only answers requests carrying `new-access`.
    pub async fn mount_list(&self, list_path: &str, records: &[Value], limit: usize) {
        let total = records.len();
        let mut offset = 0;
        loop {
            let end = (offset + limit).min(total);
            let page = records[offset..end].to_vec();
            Mock::given(method("GET"))
                .and(path(list_path))
                .and(query_param("limit", limit.to_string().as_str()))
                .and(query_param("offset", offset.to_string().as_str()))
                .and(header("authorization", format!("Bearer {NEW_ACCESS}").as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "success": true,
                    "data": page,
                    "meta": { "total": total, "offset": offset, "limit": limit }
                })))
                .expect(1)
                .mount(&self.server)
                .await;

            offset += limit;
            if offset >= total {
                break;
            }
        }
    }

    /// Download endpoint for one file (requires `new-access`)
    pub async fn mount_download(&self, id: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/files/{id}/download")))
            .and(header("authorization", format!("Bearer {NEW_ACCESS}").as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Download endpoint that always fails
    pub async fn mount_download_failure(&self, id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/files/{id}/download")))
            .and(header("authorization", format!("Bearer {NEW_ACCESS}").as_str()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Requests the backend saw on `request_path`
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

/// Successful envelope around `data`
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

/// Document list record
pub fn document(id: &str, file_name: &str, original_name: Option<&str>) -> Value {
    match original_name {
        Some(original) => json!({ "id": id, "file_name": file_name, "original_name": original }),
        None => json!({ "id": id, "file_name": file_name }),
    }
}
