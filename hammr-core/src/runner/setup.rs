use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{HttpClient, HttpRequest};

// The login happens once before workers exist; its timeout is not tied to
// the per-request timeout used inside iterations.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Immutable per-run target shared by every worker.
#[derive(Debug, Clone)]
pub struct IterationContext {
    base_url: Arc<str>,
    token: Arc<str>,
    conversation_id: Arc<str>,
    request_timeout: Duration,
}

impl IterationContext {
    pub fn new(
        base_url: &str,
        token: &str,
        conversation_id: &str,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::from(token),
            conversation_id: Arc::from(conversation_id),
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("login request failed: {0}")]
    Transport(#[from] crate::Error),

    #[error("login rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed login response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("login response carries no access token")]
    MissingToken,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "usernameOrEmail")]
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    data: Option<LoginData>,
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

/// Logs in against the chat API and returns the bearer token for the run.
pub async fn authenticate(
    client: &HttpClient,
    base_url: &str,
    credentials: &Credentials,
) -> Result<String, SetupError> {
    let login = LoginRequest {
        username_or_email: &credentials.username,
        password: &credentials.password,
    };
    let body = serde_json::to_vec(&login)?;

    let url = format!("{}/api/v1/auth/login", base_url.trim_end_matches('/'));
    tracing::debug!(url = %url, user = %credentials.username, "logging in");

    let request = HttpRequest::post_owned(url, body.into())
        .json_content()
        .with_timeout(LOGIN_TIMEOUT);
    let response = client.request(request).await?;

    if response.status != 200 {
        return Err(SetupError::Rejected {
            status: response.status,
            body: snippet(&response.body),
        });
    }

    extract_token(&response.body)
}

fn extract_token(body: &[u8]) -> Result<String, SetupError> {
    let decoded: LoginResponse = serde_json::from_slice(body)?;
    decoded
        .data
        .and_then(|d| d.access_token)
        .or(decoded.access_token)
        .filter(|token| !token.is_empty())
        .ok_or(SetupError::MissingToken)
}

fn snippet(body: &[u8]) -> String {
    const LIMIT: usize = 200;
    let text = String::from_utf8_lossy(body);
    if text.len() <= LIMIT {
        text.into_owned()
    } else {
        let mut out: String = text.chars().take(LIMIT).collect();
        out.push_str("...");
        out
    }
}
