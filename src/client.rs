//! Authenticated request pipeline.
//!
//! Every call goes through [`ApiClient::send`]: the outbound hook attaches
//! the active identity's bearer token, and the response hook classifies the
//! status. A first 401 on an authenticated request hands off to the
//! [`RefreshCoordinator`] and replays the request once with the new token;
//! a 401 on the replay is returned to the caller as is.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::refresh::REFRESH_TIMEOUT;
use crate::auth::{
    AuthResolver, BearerToken, CredentialRecord, CredentialStore, HttpRefresher, IdentityClass,
    IdentityPriority, InvalidationScope, LoginReason, NoticeKind, RefreshCoordinator, Refresher,
    SessionEvent, SessionInvalidator,
};
use crate::config::Config;
use crate::error::{ClientError, extract_message};
use crate::net::client::{CONNECT_TIMEOUT, REQUEST_TIMEOUT, UPLOAD_TIMEOUT};
use crate::net::{ApiRequest, Body, HttpClient, StatusClass};

/// Header carrying the per-request correlation id. The id is kept when the
/// request is replayed after a refresh.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for the portal API shared by all three identity classes.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
    upload_timeout: Duration,
    resolver: AuthResolver,
    coordinator: Arc<RefreshCoordinator>,
    invalidator: SessionInvalidator,
}

impl ApiClient {
    pub fn builder(base_url: &str) -> Result<ApiClientBuilder, ClientError> {
        ApiClientBuilder::new(base_url)
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<ApiClientBuilder, ClientError> {
        let store = config.credentials.open()?;
        let priority = config.identity.priority()?;
        let mut builder = ApiClientBuilder::new(&config.api.base_url)?
            .store(store)
            .priority(priority)
            .request_timeout(config.api.request_timeout())
            .upload_timeout(config.api.upload_timeout())
            .connect_timeout(config.api.connect_timeout())
            .refresh_timeout(config.api.refresh_timeout())
            .refresh_wait_timeout(config.api.refresh_wait_timeout());
        if let Some(ua) = &config.api.user_agent {
            builder = builder.user_agent(ua);
        }
        Ok(builder)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.resolver.store()
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn invalidator(&self) -> &SessionInvalidator {
        &self.invalidator
    }

    /// The identity whose token the outbound hook would attach right now.
    pub fn current_identity(&self) -> Result<Option<CredentialRecord>, ClientError> {
        Ok(self.resolver.resolve_active()?)
    }

    /// Route guard for operations that only make sense for one class.
    pub fn require(&self, class: IdentityClass) -> Result<CredentialRecord, ClientError> {
        self.invalidator
            .require(class)?
            .ok_or(ClientError::NotAuthenticated(class))
    }

    /// Send `request`, applying the authorization and status policies.
    ///
    /// Returns the response for statuses the pipeline passes through
    /// (2xx, 3xx and 4xx other than 401/403/404).
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let mut credential = if request.auth {
            self.resolver.resolve_active()?.map(|record| BearerToken {
                class: record.class,
                token: record.access_token,
            })
        } else {
            None
        };
        let mut retried = false;

        loop {
            let response = self
                .execute(request, credential.as_ref(), &request_id)
                .await?;
            let status = response.status();

            match StatusClass::of(status) {
                StatusClass::PassThrough => return Ok(response),
                StatusClass::Unauthorized if request.auth && !retried => {
                    debug!(%request_id, "Authorization failed; awaiting token refresh");
                    let failed = credential.as_ref().map(|c| c.token.as_str());
                    let token = self.coordinator.refresh(failed).await?;
                    debug!(%request_id, class = %token.class, "Replaying request with refreshed token");
                    credential = Some(token);
                    retried = true;
                }
                StatusClass::Unauthorized => {
                    let message = read_message(response).await;
                    return Err(ClientError::Unauthorized {
                        status: status.as_u16(),
                        message,
                    });
                }
                StatusClass::Forbidden => {
                    let message = read_message(response).await;
                    match &credential {
                        Some(c) => {
                            warn!(class = %c.class, "Permission denied; clearing class credentials");
                            let removed = self.invalidator.invalidate(
                                InvalidationScope::Class(c.class),
                                LoginReason::Unauthorized,
                            )?;
                            if removed == 0 {
                                self.invalidator.notify(NoticeKind::PermissionDenied);
                            }
                        }
                        None => self.invalidator.notify(NoticeKind::PermissionDenied),
                    }
                    return Err(ClientError::PermissionDenied(message));
                }
                StatusClass::NotFound => {
                    self.invalidator.notify(NoticeKind::NotFound);
                    return Err(ClientError::NotFound(read_message(response).await));
                }
                StatusClass::ServerError => {
                    warn!(status = status.as_u16(), "Server error");
                    self.invalidator.notify(NoticeKind::ServerError);
                    let message = read_message(response).await;
                    return Err(ClientError::Server {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }

    /// Send and decode a JSON success body. An empty body decodes as `null`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        let response = ensure_success(self.send(request).await?).await?;
        let bytes = response.bytes().await?;
        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send and discard a success body.
    pub async fn send_empty(&self, request: &ApiRequest) -> Result<(), ClientError> {
        ensure_success(self.send(request).await?).await?;
        Ok(())
    }

    /// Send and collect a binary success body.
    pub async fn download(
        &self,
        request: &ApiRequest,
    ) -> Result<crate::api::download::Download, ClientError> {
        let response = ensure_success(self.send(request).await?).await?;
        crate::api::download::Download::from_response(response).await
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidRequest(format!("bad path {path:?}: {e}")))
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&BearerToken>,
        request_id: &str,
    ) -> Result<Response, ClientError> {
        let url = self.url(&request.path)?;
        let mut builder = self
            .http
            .inner()
            .request(request.method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let timeout = match request.timeout {
            Some(t) => Some(t),
            None if request.is_upload() => Some(self.upload_timeout),
            None => None,
        };
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        if let Some(c) = credential {
            builder = builder.header(AUTHORIZATION, c.header_value());
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart {
                field,
                filename,
                bytes,
                mime,
            } => {
                let mut part = Part::bytes(bytes.clone()).file_name(filename.clone());
                if let Some(mime) = mime {
                    part = part.mime_str(mime)?;
                }
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        Ok(builder.send().await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("resolver", &self.resolver)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

async fn read_message(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => extract_message(&body),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message: read_message(response).await,
    })
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: Url,
    store: Option<Arc<dyn CredentialStore>>,
    priority: IdentityPriority,
    refresher: Option<Arc<dyn Refresher>>,
    user_agent: Option<String>,
    request_timeout: Duration,
    upload_timeout: Duration,
    connect_timeout: Duration,
    refresh_timeout: Duration,
    refresh_wait_timeout: Option<Duration>,
}

impl ApiClientBuilder {
    fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base URL {base_url:?}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            store: None,
            priority: IdentityPriority::default(),
            refresher: None,
            user_agent: None,
            request_timeout: REQUEST_TIMEOUT,
            upload_timeout: UPLOAD_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            refresh_timeout: REFRESH_TIMEOUT,
            refresh_wait_timeout: None,
        })
    }

    /// Credential store. Defaults to a process-local memory store.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn priority(mut self, priority: IdentityPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the HTTP refresh endpoint client.
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn refresh_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_wait_timeout = timeout;
        self
    }

    /// Build a client whose session events are discarded.
    pub fn build(self) -> ApiClient {
        let store = self.store.clone().unwrap_or_else(default_store);
        self.assemble(SessionInvalidator::new(store.clone()), store)
    }

    /// Build a client together with the receiver of its session events.
    pub fn build_with_events(self) -> (ApiClient, mpsc::UnboundedReceiver<SessionEvent>) {
        let store = self.store.clone().unwrap_or_else(default_store);
        let (invalidator, events) = SessionInvalidator::with_channel(store.clone());
        (self.assemble(invalidator, store), events)
    }

    fn assemble(self, invalidator: SessionInvalidator, store: Arc<dyn CredentialStore>) -> ApiClient {
        let mut http = HttpClient::builder()
            .connect_timeout(self.connect_timeout)
            .request_timeout(self.request_timeout);
        if let Some(ua) = &self.user_agent {
            http = http.user_agent(ua);
        }
        let http = http.build();

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(
                HttpRefresher::new(http.inner().clone(), self.base_url.clone())
                    .with_timeout(self.refresh_timeout),
            )
        });
        let resolver = AuthResolver::new(store, self.priority);
        let coordinator = Arc::new(
            RefreshCoordinator::new(resolver.clone(), refresher, invalidator.clone())
                .with_wait_timeout(self.refresh_wait_timeout),
        );

        ApiClient {
            http,
            base_url: self.base_url,
            upload_timeout: self.upload_timeout,
            resolver,
            coordinator,
            invalidator,
        }
    }
}

fn default_store() -> Arc<dyn CredentialStore> {
    Arc::new(crate::auth::MemoryCredentialStore::new())
}
