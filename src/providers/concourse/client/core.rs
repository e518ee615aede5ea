use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::Url;

use crate::auth::{password_grant, Credentials, Token};
use crate::error::{BuildLensError, Result};

/// Thin REST client for the Concourse `api/v1` endpoints.
///
/// No retry loop: transport failures surface to the caller as they happen.
pub struct ConcourseClient {
    client: Client,
    base_url: Url,
    api_url: Url,
    token: RwLock<Option<Token>>,
    credentials: Option<Credentials>,
}

impl ConcourseClient {
    pub fn new(base_url: &str, token: Option<Token>, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("BuildLens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuildLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = Url::parse(base_url)
            .map_err(|e| BuildLensError::Config(format!("Invalid base URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let api_url = base_url
            .join("api/v1/")
            .map_err(|e| BuildLensError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_url,
            token: RwLock::new(token),
            credentials,
        })
    }

    /// Host URL without a trailing slash, used to build web links.
    pub fn host_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Helper to build authenticated requests
    pub async fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_ref() {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }

    /// Construct an API URL from path segments, percent-encoding each segment
    pub(super) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| BuildLensError::Config(format!("Invalid API base URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends an authenticated request and maps non-2xx responses to [`BuildLensError::ApiError`].
    pub(super) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.auth_request(request).await.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(BuildLensError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    pub(super) fn http(&self) -> &Client {
        &self.client
    }

    /// Logs in with the configured credentials and stores the issued token.
    ///
    /// # Errors
    ///
    /// Returns [`BuildLensError::Auth`] when no credentials are configured or the
    /// issuer rejects them.
    pub async fn login(&self) -> Result<()> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            BuildLensError::Auth("no username/password configured to obtain a token".to_string())
        })?;

        let token = password_grant(&self.client, &self.base_url, credentials).await?;
        *self.token.write().await = Some(token);
        info!("Logged in to {} as {}", self.host_url(), credentials.username);

        Ok(())
    }

    /// Logs in when credentials are configured and no token is held yet.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        let has_token = self.token.read().await.is_some();
        if !has_token && self.credentials.is_some() {
            self.login().await?;
        }
        Ok(())
    }

    /// Checks the user info endpoint and logs in again when the token was rejected.
    ///
    /// Concourse does not refresh expired tokens on its own, so listing calls
    /// check the session first. Without credentials there is nothing to log in
    /// with and the session is used as is.
    pub async fn refresh_token_if_necessary(&self) -> Result<()> {
        if self.credentials.is_none() {
            debug!("No credentials for {}, skipping token refresh", self.host_url());
            return Ok(());
        }

        let url = self.endpoint(&["user"])?;
        let response = self.auth_request(self.client.get(url)).await.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            debug!("Token rejected by {}, logging in again", self.host_url());
            return self.login().await;
        }

        if !status.is_success() {
            return Err(BuildLensError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}
