//! Per-class token refresh endpoint client.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::IdentityClass;
use super::error::RefreshError;

/// Tokens returned by a successful refresh.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    /// Present only when the server rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<String>,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Exchanges a refresh token for a new access token.
///
/// Injectable so the coordinator can be exercised without a network.
#[async_trait::async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(
        &self,
        class: IdentityClass,
        refresh_token: &str,
    ) -> Result<RefreshedTokens, RefreshError>;
}

/// Default refresh timeout.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Refresher`] calling `POST <base>/<class>/token/refresh/` with
/// `{"refresh": ...}` and expecting `{"access": ...}` back.
#[derive(Debug, Clone)]
pub struct HttpRefresher {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpRefresher {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            timeout: REFRESH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, class: IdentityClass) -> Result<Url, RefreshError> {
        self.base_url
            .join(&class.refresh_path())
            .map_err(|e| RefreshError::Transport {
                class,
                message: format!("Invalid refresh URL: {e}"),
                timeout: false,
            })
    }
}

#[async_trait::async_trait]
impl Refresher for HttpRefresher {
    async fn refresh(
        &self,
        class: IdentityClass,
        refresh_token: &str,
    ) -> Result<RefreshedTokens, RefreshError> {
        let url = self.endpoint(class)?;
        debug!(%class, %url, "Requesting access token refresh");

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport {
                class,
                message: e.to_string(),
                timeout: e.is_timeout(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(%class, status = status.as_u16(), "Refresh endpoint rejected token");
            return Err(RefreshError::Rejected {
                class,
                status: status.as_u16(),
                message,
            });
        }

        let tokens: RefreshedTokens =
            response.json().await.map_err(|e| RefreshError::Malformed {
                class,
                message: e.to_string(),
            })?;
        if tokens.access.is_empty() {
            return Err(RefreshError::Malformed {
                class,
                message: "empty access token".to_string(),
            });
        }
        Ok(tokens)
    }
}
