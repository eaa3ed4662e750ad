//! Authenticated request pipeline.
//!
//! Every backend call goes through [`ApiClient::send`]:
//! - a bearer credential is attached unless the path is on the public
//!   endpoint exclusion list
//! - a 401 triggers one coordinated credential renewal (see [`renewal`]) and
//!   a single replay of the request with the new credential
//! - a request that loses its connection while a renewal is pending waits
//!   for that renewal and is replayed the same way
//! - a renewal that is impossible or fails ends the session: the store is
//!   cleared, the [`SessionObserver`] is told, and every waiting request
//!   fails with [`Error::SessionTerminated`]
//! - every other failure reaches the caller unchanged

mod renewal;
mod request;

pub use request::ApiRequest;

use crate::auth::{CredentialStore, NoopSessionObserver, SessionExpiry, SessionObserver};
use crate::config::ClientConfig;
use crate::error::{Error, RenewalError, Result};
use crate::types::{
    CredentialPair, Envelope, Page, PageRequest, TokenRefreshRequest, TokenRefreshResponse,
};
use bytes::Bytes;
use futures::FutureExt;
use renewal::{RenewalCoordinator, Ticket};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection establishment timeout (separate from request timeout)
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the dashboard backend
///
/// Cheap to clone; clones share the connection pool, the credential store
/// and the renewal state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: url::Url,
    config: ClientConfig,
    store: CredentialStore,
    observer: Arc<dyn SessionObserver>,
    renewal: RenewalCoordinator,
}

impl ApiClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid, or
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        store: CredentialStore,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = url::Url::parse(&config.base_url)?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                config,
                store,
                observer,
                renewal: RenewalCoordinator::new(),
            }),
        })
    }

    /// Create a client that does not observe session changes
    pub fn without_observer(config: ClientConfig, store: CredentialStore) -> Result<Self> {
        Self::new(config, store, Arc::new(NoopSessionObserver))
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Credential store handle
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.store
    }

    /// Send a request through the pipeline
    ///
    /// Returns the response unchanged on any 2xx status.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionTerminated`] if a needed renewal was impossible or failed
    /// - [`Error::Status`] for any other non-2xx status, including a second 401
    ///   after one replay and a 401 from an excluded path
    /// - [`Error::Network`] for transport failures not absorbed by a renewal
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response> {
        let excluded = self.inner.config.is_excluded(&request.path);
        let current = if excluded {
            None
        } else {
            self.inner.store.get_current()
        };
        let mut token = current.as_ref().map(|pair| pair.access_token.clone());

        // A credential past its reported expiry would only earn a 401
        if current.is_some_and(|pair| pair.is_expired(chrono::Duration::zero())) {
            debug!(path = %request.path, "access credential already expired, renewing first");
            let fresh = self.renew_after_rejection(token.as_deref(), &request.path).await?;
            token = Some(fresh);
            request.retried = true;
        }

        loop {
            match self.dispatch(&request, token.as_deref()).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status() == StatusCode::UNAUTHORIZED
                        && !excluded
                        && !request.retried =>
                {
                    debug!(path = %request.path, "request rejected with 401");
                    let fresh = self.renew_after_rejection(token.as_deref(), &request.path).await?;
                    token = Some(fresh);
                    request.retried = true;
                }
                Ok(response) => return Err(status_error(response, &request.path).await),
                Err(e) if !excluded && !request.retried && e.is_connection_failure() => {
                    // A server may drop the socket right after rejecting a stale
                    // credential; treat that like a 401 while a renewal is pending
                    let Some(pending) = self.inner.renewal.in_flight() else {
                        return Err(e);
                    };
                    debug!(
                        path = %request.path,
                        error = %e,
                        "connection failed during credential renewal, waiting to replay"
                    );
                    token = Some(pending.await?);
                    request.retried = true;
                }
                Err(e) => return Err(e),
            }
            debug!(path = %request.path, "replaying request with renewed credential");
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = self.url_for(&request.path)?;
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .timeout(request.timeout.unwrap_or(self.inner.config.request_timeout));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        Ok(builder.send().await?)
    }

    fn url_for(&self, path: &str) -> Result<url::Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(url::Url::parse(&format!("{base}/{path}"))?)
    }

    /// Wait for (or start) the renewal that follows a 401
    async fn renew_after_rejection(&self, sent_token: Option<&str>, path: &str) -> Result<String> {
        let ticket = self
            .inner
            .renewal
            .join_or_start(&self.inner.store, sent_token, || self.renewal_work(path));

        match ticket {
            Ticket::Current(token) => Ok(token),
            Ticket::Joined(pending) => {
                debug!(path, "waiting for credential renewal in progress");
                Ok(pending.await?)
            }
            Ticket::Owner(pending) => Ok(pending.await?),
        }
    }

    /// The renewal itself, run once per coordinated renewal
    fn renewal_work(
        &self,
        path: &str,
    ) -> futures::future::BoxFuture<'static, std::result::Result<String, RenewalError>> {
        let client = self.clone();
        let path = path.to_string();

        async move {
            let Some(refresh_token) = client.inner.store.refresh_token() else {
                warn!("no refresh token available, ending session");
                let err = RenewalError::new("no refresh token available");
                client.expire_session(&err.reason, Some(path));
                return Err(err);
            };

            info!("renewing access credential");
            match client.request_new_credentials(refresh_token).await {
                Ok(pair) => {
                    client.inner.store.replace(pair.clone());
                    client.inner.observer.on_renewed(&pair);
                    info!("access credential renewed");
                    Ok(pair.access_token)
                }
                Err(e) => {
                    warn!(error = %e, "credential renewal failed, ending session");
                    client.expire_session(&e.reason, Some(path));
                    Err(e)
                }
            }
        }
        .boxed()
    }

    /// Refresh call that bypasses the pipeline (no bearer, no renewal, own timeout)
    async fn request_new_credentials(
        &self,
        refresh_token: String,
    ) -> std::result::Result<CredentialPair, RenewalError> {
        let url = self
            .url_for(&self.inner.config.refresh_path)
            .map_err(|e| RenewalError::new(e.to_string()))?;

        let response = self
            .inner
            .http
            .post(url)
            .timeout(self.inner.config.refresh_timeout)
            .json(&TokenRefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RenewalError::new(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenewalError::new(format!(
                "refresh endpoint returned {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RenewalError::new(format!("failed to read refresh response: {e}")))?;

        let tokens = match serde_json::from_slice::<RefreshBody>(&body) {
            Ok(RefreshBody::Wrapped { data }) | Ok(RefreshBody::Bare(data)) => data,
            Err(e) => {
                return Err(RenewalError::new(format!(
                    "malformed refresh response: {e}"
                )));
            }
        };

        if tokens.access_token.is_empty() {
            return Err(RenewalError::new("refresh response carried no access token"));
        }

        Ok(tokens.into())
    }

    fn expire_session(&self, reason: &str, request_path: Option<String>) {
        self.inner.store.clear();
        self.inner.observer.on_session_expired(&SessionExpiry {
            reason: reason.to_string(),
            request_path,
        });
    }

    /// Sign in against a public login endpoint and store the returned credentials
    ///
    /// The body is whatever the endpoint expects (e.g. email and password).
    pub async fn login<B: serde::Serialize + ?Sized>(
        &self,
        login_path: &str,
        body: &B,
    ) -> Result<CredentialPair> {
        let response = self.send(ApiRequest::post(login_path).json(body)?).await?;
        let body = response.bytes().await?;
        let tokens = match serde_json::from_slice::<RefreshBody>(&body)? {
            RefreshBody::Wrapped { data } | RefreshBody::Bare(data) => data,
        };
        let pair = CredentialPair::from(tokens);
        self.inner.store.replace(pair.clone());
        self.inner.observer.on_renewed(&pair);
        info!("signed in");
        Ok(pair)
    }

    /// End the session locally
    pub fn logout(&self) {
        info!("signing out");
        self.expire_session("logged out", None);
    }

    /// Send a request and unwrap the envelope's `data`
    pub async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let envelope = self.request_envelope::<T>(request).await?;
        envelope_data(envelope)
    }

    async fn request_envelope<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Envelope<T>> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET and unwrap the envelope
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json(ApiRequest::get(path)).await
    }

    /// POST a JSON body and unwrap the envelope
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.request_json(ApiRequest::post(path).json(body)?).await
    }

    /// PUT a JSON body and unwrap the envelope
    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.request_json(ApiRequest::put(path).json(body)?).await
    }

    /// DELETE and unwrap the envelope
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json(ApiRequest::delete(path)).await
    }

    /// Fetch one page of a list endpoint
    ///
    /// `base` carries the endpoint path and any filter parameters; the page's
    /// `limit`/`offset` are appended.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] when the response has no `meta` block, since the total
    /// row count cannot be known without it.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        base: &ApiRequest,
        page: PageRequest,
    ) -> Result<Page<T>> {
        let request = base.clone().query_pairs(page.query_pairs());
        let envelope = self.request_envelope::<Vec<T>>(request).await?;
        let meta = envelope.meta;
        let items = envelope_data(envelope)?;
        let meta = meta.ok_or_else(|| Error::Api {
            message: "list response carried no pagination meta".to_string(),
        })?;
        Ok(Page {
            items,
            total: meta.total,
        })
    }

    /// Download raw bytes (file download endpoints)
    pub async fn download_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.send(ApiRequest::get(path)).await?;
        Ok(response.bytes().await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("store", &self.inner.store)
            .finish()
    }
}

// Refresh and login endpoints answer either bare or inside the envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshBody {
    Wrapped { data: TokenRefreshResponse },
    Bare(TokenRefreshResponse),
}

fn envelope_data<T>(envelope: Envelope<T>) -> Result<T> {
    if !envelope.success {
        let message = envelope
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "request was not successful".to_string());
        return Err(Error::Api { message });
    }
    envelope.data.ok_or_else(|| Error::Api {
        message: "response carried no data".to_string(),
    })
}

/// Build [`Error::Status`] from a non-success response
async fn status_error(response: Response, path: &str) -> Error {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    let message = match response.bytes().await {
        Ok(body) => serde_json::from_slice::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|e| e.message)
            .unwrap_or(fallback),
        Err(_) => fallback,
    };

    Error::Status {
        status,
        path: path.to_string(),
        message,
    }
}
