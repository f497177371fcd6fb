//! GCP authentication using a service account key
//!
//! Handles OAuth2 token generation for Vertex AI and Document AI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const TOKEN_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Tokens are valid for an hour; refresh a little early
const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// GCP authentication manager
pub struct GcpAuth {
    source: TokenSource,
    project_id: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

enum TokenSource {
    /// Signed JWT exchanged for short-lived tokens
    ServiceAccount(PathBuf),
    /// Pre-issued bearer token, used as-is
    Static(String),
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(serde::Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcpAuth {
    /// Create from service account JSON key file
    pub fn from_service_account(key_path: impl AsRef<Path>, project_id: String) -> Result<Self> {
        let key_path = key_path.as_ref().to_path_buf();
        if !key_path.exists() {
            return Err(Error::Config(format!(
                "Service account key not found: {}",
                key_path.display()
            )));
        }

        Ok(Self {
            source: TokenSource::ServiceAccount(key_path),
            project_id,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Use a pre-issued access token (e.g. from `gcloud auth print-access-token`)
    pub fn from_token(access_token: String, project_id: String) -> Self {
        Self {
            source: TokenSource::Static(access_token),
            project_id,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Get a valid access token (refreshing if needed)
    pub async fn get_token(&self) -> Result<String> {
        let key_path = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(path) => path,
        };

        {
            let token = self.token.read().await;
            if let Some(ref cached) = *token {
                if cached.expires_at > Instant::now() + REFRESH_MARGIN {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let access_token = refresh_token(key_path).await?;

        let mut token = self.token.write().await;
        *token = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });

        Ok(access_token)
    }

    /// Create HTTP client with auth headers
    pub async fn authorized_client(&self) -> Result<reqwest::Client> {
        let token = self.get_token().await?;
        let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| Error::Config(format!("Invalid access token: {}", e)))?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, value);

        reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Exchange a signed JWT assertion for an access token
async fn refresh_token(key_path: &Path) -> Result<String> {
    let key_content = tokio::fs::read_to_string(&key_path).await.map_err(|e| {
        Error::Config(format!(
            "Failed to read service account key {}: {}",
            key_path.display(),
            e
        ))
    })?;

    let key: ServiceAccountKey = serde_json::from_str(&key_content)
        .map_err(|e| Error::Config(format!("Invalid service account key format: {}", e)))?;

    let jwt = sign_assertion(&key)?;

    let response = reqwest::Client::new()
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Config(format!("Token exchange request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Config(format!(
            "Token exchange failed ({}): {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Config(format!("Failed to parse token response: {}", e)))?;

    Ok(token_response.access_token)
}

/// Build an RS256-signed JWT for the service account
fn sign_assertion(key: &ServiceAccountKey) -> Result<String> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Internal(format!("System clock before epoch: {}", e)))?
        .as_secs() as i64;

    let claims = serde_json::json!({
        "iss": key.client_email,
        "scope": TOKEN_SCOPE,
        "aud": key.token_uri,
        "iat": now,
        "exp": now + 3600,
    });

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);

    let private_key = key.private_key.replace("\\n", "\n");
    let pem = pem::parse(&private_key)
        .map_err(|e| Error::Config(format!("Failed to parse private key PEM: {}", e)))?;
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(pem.contents())
        .map_err(|e| Error::Config(format!("Failed to parse private key: {:?}", e)))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| Error::Config(format!("Failed to sign JWT: {:?}", e)))?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&signature)))
}
