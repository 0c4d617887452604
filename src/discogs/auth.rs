//! Discogs OAuth credentials
//!
//! Discogs accepts OAuth 1.0a with the `PLAINTEXT` signature method, where the
//! signature is just `consumer_secret&token_secret`. The long-lived access
//! token pair is persisted in a small text file as `token|secret`.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

/// Page where the user grants access to a request token
pub const AUTHORIZE_URL: &str = "https://www.discogs.com/oauth/authorize";

/// An OAuth token and its secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Token
    pub token: String,
    /// Token secret
    pub secret: String,
}

impl Credentials {
    /// Parses the `token|secret` file format
    pub fn parse(raw: &str) -> Option<Self> {
        let (token, secret) = raw.trim().split_once('|')?;
        if token.is_empty() || secret.is_empty() || secret.contains('|') {
            return None;
        }
        Some(Self {
            token: token.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Reads stored credentials
    ///
    /// A file that cannot be read or parsed is deleted so the next run starts
    /// a fresh authorization.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(path).ok().and_then(|raw| Self::parse(&raw));
        if parsed.is_none() {
            warn!(path = %path.display(), "Discarding unreadable credential file");
            let _ = fs::remove_file(path);
        }
        parsed
    }

    /// Writes the credentials as `token|secret`
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{}|{}", self.token, self.secret))
    }
}

/// Inputs for one signed request
#[derive(Debug, Default)]
pub struct OAuthRequest<'a> {
    /// Application key
    pub consumer_key: &'a str,
    /// Application secret
    pub consumer_secret: &'a str,
    /// Request or access token, once one exists
    pub token: Option<&'a Credentials>,
    /// Verifier code typed in by the user
    pub verifier: Option<&'a str>,
    /// Callback; `oob` when requesting a token for a CLI
    pub callback: Option<&'a str>,
}

impl OAuthRequest<'_> {
    /// `PLAINTEXT` signature: `consumer_secret&token_secret`
    pub fn signature(&self) -> String {
        let token_secret = self.token.map(|t| t.secret.as_str()).unwrap_or("");
        format!("{}&{}", self.consumer_secret, token_secret)
    }

    /// Builds the `Authorization` header value
    pub fn header(&self) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.signature();

        let mut fields = vec![
            ("oauth_consumer_key", self.consumer_key),
            ("oauth_nonce", nonce.as_str()),
            ("oauth_signature", signature.as_str()),
            ("oauth_signature_method", "PLAINTEXT"),
            ("oauth_timestamp", timestamp.as_str()),
        ];
        if let Some(token) = self.token {
            fields.push(("oauth_token", token.token.as_str()));
        }
        if let Some(verifier) = self.verifier {
            fields.push(("oauth_verifier", verifier));
        }
        if let Some(callback) = self.callback {
            fields.push(("oauth_callback", callback));
        }

        let joined = fields
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", joined)
    }
}

/// Reads `oauth_token` and `oauth_token_secret` from a form-encoded body
pub fn parse_token_response(body: &str) -> Option<Credentials> {
    let mut token = None;
    let mut secret = None;
    for pair in body.trim().split('&') {
        match pair.split_once('=') {
            Some(("oauth_token", v)) => token = Some(v.to_string()),
            Some(("oauth_token_secret", v)) => secret = Some(v.to_string()),
            _ => {}
        }
    }
    match (token, secret) {
        (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
            Some(Credentials { token, secret })
        }
        _ => None,
    }
}

/// URL the user must visit to approve a request token
pub fn authorize_url(request_token: &Credentials) -> String {
    format!("{}?oauth_token={}", AUTHORIZE_URL, request_token.token)
}
