//! Discogs REST API client
//!
//! Every request carries the configured User-Agent and an OAuth
//! `Authorization` header. Calls here make exactly one request; retrying is
//! left to [`RetryPolicy`](super::RetryPolicy).

use std::io::{BufRead, Write};
use std::path::PathBuf;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::auth::{authorize_url, parse_token_response, Credentials, OAuthRequest};
use super::error::{ClientError, FetchError};
use super::fetch::ReleaseSource;
use crate::config::Config;

/// Authenticated handle to the Discogs API
#[derive(Debug, Clone)]
pub struct DiscogsClient {
    http: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    auth_path: PathBuf,
    credentials: Option<Credentials>,
}

impl DiscogsClient {
    /// Creates a client from configuration, loading any stored credentials
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        let auth_path = config.auth_path();
        let credentials = Credentials::load(&auth_path);

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            auth_path,
            credentials,
        })
    }

    /// Replaces the access token, e.g. for tests
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Whether an access token is available
    pub fn is_authorized(&self) -> bool {
        self.credentials.is_some()
    }

    /// Runs the one-time interactive authorization
    ///
    /// Obtains a request token, prints the URL where the user approves it,
    /// reads the verification code from `input`, exchanges it for an access
    /// token and stores that token in the credential file.
    pub async fn authorize<R: BufRead>(&mut self, mut input: R) -> Result<(), ClientError> {
        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ClientError::Auth(
                "DISCOGS_CONSUMER_KEY and DISCOGS_CONSUMER_SECRET must be set".to_string(),
            ));
        }

        let header = OAuthRequest {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            callback: Some("oob"),
            ..Default::default()
        }
        .header();
        let response = self
            .http
            .get(format!("{}/oauth/request_token", self.base_url))
            .header(AUTHORIZATION, header)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;
        let request_token = Self::token_from(response, "request token").await?;

        println!("Open this URL to authorize disctool:");
        println!("{}", authorize_url(&request_token));
        print!("Verification code: ");
        std::io::stdout().flush()?;

        let mut verifier = String::new();
        input.read_line(&mut verifier)?;
        let verifier = verifier.trim();
        if verifier.is_empty() {
            return Err(ClientError::Auth("no verification code entered".to_string()));
        }

        let header = OAuthRequest {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token: Some(&request_token),
            verifier: Some(verifier),
            ..Default::default()
        }
        .header();
        let response = self
            .http
            .post(format!("{}/oauth/access_token", self.base_url))
            .header(AUTHORIZATION, header)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;
        let access_token = Self::token_from(response, "access token").await?;

        access_token.save(&self.auth_path)?;
        info!(path = %self.auth_path.display(), "Stored Discogs credentials");
        self.credentials = Some(access_token);
        Ok(())
    }

    /// Authorizes interactively on stdin when no credentials are stored
    ///
    /// Without configured application credentials there is nothing to
    /// authorize with, and the client stays anonymous.
    pub async fn ensure_authorized(&mut self) -> Result<(), ClientError> {
        if self.is_authorized() {
            return Ok(());
        }
        if self.consumer_key.is_empty() {
            warn!("No Discogs application credentials configured, using anonymous access");
            return Ok(());
        }
        let stdin = std::io::stdin();
        self.authorize(stdin.lock()).await
    }

    async fn token_from(response: Response, what: &str) -> Result<Credentials, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Auth(format!("{} request returned {}", what, status)));
        }
        let body = response.text().await?;
        parse_token_response(&body)
            .ok_or_else(|| ClientError::Auth(format!("{} response was malformed", what)))
    }

    /// OAuth when authorized, key/secret when only the application is
    /// known, nothing otherwise (Discogs serves public data anonymously at a
    /// lower rate limit)
    fn auth_header(&self) -> Option<String> {
        match &self.credentials {
            Some(token) => Some(
                OAuthRequest {
                    consumer_key: &self.consumer_key,
                    consumer_secret: &self.consumer_secret,
                    token: Some(token),
                    ..Default::default()
                }
                .header(),
            ),
            None if !self.consumer_key.is_empty() => Some(format!(
                "Discogs key={}, secret={}",
                self.consumer_key, self.consumer_secret
            )),
            None => None,
        }
    }

    /// Whether `url` is on the API host; credentials go nowhere else
    fn is_api_url(&self, url: &str) -> bool {
        url.strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        debug!(url, "GET");
        let mut request = self.http.get(url);
        if self.is_api_url(url) {
            if let Some(header) = self.auth_header() {
                request = request.header(AUTHORIZATION, header);
            }
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let response = self.get(&format!("{}{}", self.base_url, path)).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetches marketplace statistics for a release
    pub async fn marketplace_stats(&self, id: u64) -> Result<Value, FetchError> {
        self.get_json(&format!("/marketplace/stats/{}", id)).await
    }

    /// Downloads raw bytes, such as cover artwork
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(uri).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl ReleaseSource for DiscogsClient {
    async fn release(&self, id: u64) -> Result<Value, FetchError> {
        self.get_json(&format!("/releases/{}", id)).await
    }
}
