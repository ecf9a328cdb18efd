//! Google Cloud credentials.
//!
//! A hosted deployment (Render) passes a service-account key as JSON in
//! `GOOGLE_APPLICATION_CREDENTIALS`. Everywhere else the ambient credentials
//! of the developer machine are used.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, RevoiceError};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Subset of a service-account key file needed to mint tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Where Google credentials come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Key payload supplied directly, as on a managed host.
    Explicit(ServiceAccountKey),
    /// API key from the environment or config file.
    ApiKey(String),
    /// Path to a service-account key file.
    KeyFile(PathBuf),
    /// `gcloud auth application-default print-access-token`.
    Gcloud,
}

impl CredentialSource {
    pub fn from_env(api_key: Option<&str>) -> Result<Self> {
        Self::from_lookup(api_key, |key| std::env::var(key).ok())
    }

    /// Select credentials from `lookup` (an environment accessor).
    pub fn from_lookup<F>(api_key: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hosted = lookup("RENDER").is_some() || lookup("RENDER_EXTERNAL_HOSTNAME").is_some();
        let credentials = lookup("GOOGLE_APPLICATION_CREDENTIALS");

        if hosted {
            let payload = credentials.ok_or_else(|| {
                RevoiceError::Auth(
                    "Running on Render but GOOGLE_APPLICATION_CREDENTIALS is not set".to_string(),
                )
            })?;
            let key: ServiceAccountKey = serde_json::from_str(&payload).map_err(|e| {
                RevoiceError::Auth(format!(
                    "GOOGLE_APPLICATION_CREDENTIALS is not a service-account JSON payload: {e}"
                ))
            })?;
            info!("Running on Render. Using provided Google credentials.");
            return Ok(CredentialSource::Explicit(key));
        }

        info!("Not running on Render. Using default Google credentials.");

        if let Some(key) = api_key.map(str::to_string).or_else(|| lookup("GOOGLE_API_KEY")) {
            return Ok(CredentialSource::ApiKey(key));
        }

        match credentials {
            Some(path) if !path.trim().is_empty() => Ok(CredentialSource::KeyFile(path.into())),
            _ => Ok(CredentialSource::Gcloud),
        }
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum AuthMode {
    ApiKey(String),
    Static(String),
    ServiceAccount(ServiceAccountKey),
    Gcloud,
}

/// Attaches Google credentials to outgoing requests, caching OAuth tokens.
pub struct GoogleAuth {
    client: reqwest::Client,
    mode: AuthMode,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn from_source(source: CredentialSource) -> Result<Self> {
        let mode = match source {
            CredentialSource::Explicit(key) => AuthMode::ServiceAccount(key),
            CredentialSource::ApiKey(key) => AuthMode::ApiKey(key),
            CredentialSource::KeyFile(path) => {
                if !path.is_file() {
                    return Err(RevoiceError::AssetNotFound(path));
                }
                let contents = std::fs::read_to_string(&path)?;
                let key: ServiceAccountKey = serde_json::from_str(&contents).map_err(|e| {
                    RevoiceError::Auth(format!(
                        "{} is not a service-account key: {e}",
                        path.display()
                    ))
                })?;
                AuthMode::ServiceAccount(key)
            }
            CredentialSource::Gcloud => AuthMode::Gcloud,
        };

        Ok(Self::with_mode(mode))
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::with_mode(AuthMode::ApiKey(key.into()))
    }

    /// Use a fixed bearer token, e.g. one minted outside this process.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::with_mode(AuthMode::Static(token.into()))
    }

    fn with_mode(mode: AuthMode) -> Self {
        Self {
            client: reqwest::Client::new(),
            mode,
            cached: Mutex::new(None),
        }
    }

    /// Add credentials to `request`.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.mode {
            AuthMode::ApiKey(key) => Ok(request.query(&[("key", key)])),
            AuthMode::Static(token) => Ok(request.bearer_auth(token)),
            AuthMode::ServiceAccount(_) | AuthMode::Gcloud => {
                let token = self.access_token().await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let (token, lifetime) = match &self.mode {
            AuthMode::ServiceAccount(key) => self.exchange_jwt(key).await?,
            AuthMode::Gcloud => gcloud_token()?,
            AuthMode::ApiKey(_) | AuthMode::Static(_) => {
                return Err(RevoiceError::Auth(
                    "Credentials do not mint access tokens".to_string(),
                ))
            }
        };

        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }

    async fn exchange_jwt(&self, key: &ServiceAccountKey) -> Result<(String, Duration)> {
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RevoiceError::Auth(format!("System clock before epoch: {e}")))?
            .as_secs();

        let claims = JwtClaims {
            iss: &key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| RevoiceError::Auth(format!("Invalid service-account private key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| RevoiceError::Auth(format!("Failed to sign token request: {e}")))?;

        debug!("Requesting access token for {}", key.client_email);

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RevoiceError::ExternalService {
                service: "Google OAuth",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok((parsed.access_token, Duration::from_secs(parsed.expires_in)))
    }
}

fn gcloud_token() -> Result<(String, Duration)> {
    let output = Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .output()
        .map_err(|e| RevoiceError::Auth(format!("Failed to run gcloud: {e}")))?;

    if !output.status.success() {
        return Err(RevoiceError::ExternalTool {
            tool: "gcloud".to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(RevoiceError::Auth(
            "gcloud returned an empty access token".to_string(),
        ));
    }

    // gcloud doesn't report the lifetime; its tokens last an hour.
    Ok((token, Duration::from_secs(3600)))
}
