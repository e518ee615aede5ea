use std::fmt;

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{BuildLensError, Result};

// Concourse's `fly` CLI client, accepted by every sky issuer.
const FLY_CLIENT_ID: &str = "fly";
const FLY_CLIENT_SECRET: &str = "Zmx5";
const TOKEN_SCOPE: &str = "openid profile email federated:id groups";

/// Bearer token used to authenticate against the Concourse API.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Local user credentials exchanged for a token through the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges username and password for a bearer token at the sky issuer.
///
/// # Errors
///
/// Returns [`BuildLensError::Auth`] when the issuer rejects the credentials and
/// a network error when the issuer cannot be reached.
pub async fn password_grant(client: &Client, base_url: &Url, credentials: &Credentials) -> Result<Token> {
    let token_url = base_url
        .join("sky/issuer/token")
        .map_err(|e| BuildLensError::Config(format!("Invalid token URL: {e}")))?;

    debug!("Requesting token for user {}", credentials.username);

    let response = client
        .post(token_url)
        .basic_auth(FLY_CLIENT_ID, Some(FLY_CLIENT_SECRET))
        .form(&[
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("scope", TOKEN_SCOPE),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(BuildLensError::Auth(format!(
            "token request for user {} failed with status {status}",
            credentials.username
        )));
    }

    let body: TokenResponse = response.json().await?;
    Ok(Token::from(body.access_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::from("secret-value");
        assert_eq!(format!("{token:?}"), "Token(***)");
        assert_eq!(token.as_str(), "secret-value");
    }

    #[tokio::test]
    async fn password_grant_returns_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sky/issuer/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "password".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"abc123","token_type":"bearer"}"#)
            .create_async()
            .await;

        let base_url = Url::parse(&format!("{}/", server.url())).unwrap();
        let credentials = Credentials {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };

        let token = password_grant(&Client::new(), &base_url, &credentials)
            .await
            .unwrap();

        assert_eq!(token.as_str(), "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn password_grant_rejects_bad_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sky/issuer/token")
            .with_status(401)
            .create_async()
            .await;

        let base_url = Url::parse(&format!("{}/", server.url())).unwrap();
        let credentials = Credentials {
            username: "admin".to_string(),
            password: "wrong".to_string(),
        };

        let result = password_grant(&Client::new(), &base_url, &credentials).await;

        assert!(matches!(result, Err(BuildLensError::Auth(_))));
    }
}
