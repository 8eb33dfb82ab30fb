//! Remote session client: a stateless request/response mapping onto the
//! intonation-training server.
//!
//! The [`IntonationApi`] trait is the seam the session controller and the
//! practice orchestrator depend on, so tests can run against a mock instead
//! of a live server. [`ApiClient`] is the reqwest implementation.
//!
//! Every response is classified the same way: a success status with a
//! parseable body becomes the typed value; a success status with an empty or
//! unparseable body is a malformed response; a non-success status carries
//! the code plus whatever message can be extracted from the body.

use async_trait::async_trait;
use intona_api::{
    AnalyzeResponse, AuthResponse, ChangePasswordRequest, ChangePasswordResponse, LoginRequest,
    RegisterRequest, RegisterResponse, UserProfile, VerificationRequest, VerificationResponse,
};
#[cfg(test)]
use mockall::automock;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Matches the original client's connect/read/write timeouts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached or the transport failed mid-request.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {code}: {message}")]
    Status { code: u16, message: String },

    /// The server claimed success but the body was empty or unparseable.
    #[error("malformed server response")]
    MalformedResponse,
}

impl ApiError {
    /// Status code of the response, when the failure was an HTTP rejection.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Where the client obtains the current bearer token, when one exists.
///
/// Absence never blocks a call: register, verify and login are usable before
/// any token has been issued.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Option<SecretString>;
}

/// The six server operations this client performs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IntonationApi: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, ApiError>;

    async fn verify(&self, request: VerificationRequest)
    -> Result<VerificationResponse, ApiError>;

    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ApiError>;

    async fn fetch_profile(&self) -> Result<UserProfile, ApiError>;

    async fn change_password(
        &self,
        request: ChangePasswordRequest,
    ) -> Result<ChangePasswordResponse, ApiError>;

    /// Uploads one recorded audio file plus the phrase identifier it is
    /// supposed to contain. The only multipart operation.
    async fn analyze_intonation(
        &self,
        file_name: &str,
        audio: Vec<u8>,
        phrase_id: &str,
    ) -> Result<AnalyzeResponse, ApiError>;
}

/// HTTP implementation of [`IntonationApi`]. Cheap to clone; clones share
/// the connection pool and token source.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches `Authorization: Bearer <token>` when a token is available.
    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.token().await {
            Some(token) => {
                tracing::debug!("attaching bearer token to request");
                request.bearer_auth(token.expose_secret())
            }
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            serde_json::from_str(&body).map_err(|error| {
                tracing::warn!(%error, "server claimed success with an unparseable body");
                ApiError::MalformedResponse
            })
        } else {
            let message = extract_error_message(&body);
            tracing::warn!(code = status.as_u16(), %message, "server rejected request");
            Err(ApiError::Status {
                code: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl IntonationApi for ApiClient {
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.endpoint("/register")))
            .await
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.endpoint("/verify")))
            .await
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.endpoint("/login")))
            .await
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let response = self
            .authorize(self.http.get(self.endpoint("/user/profile")))
            .await
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn change_password(
        &self,
        request: ChangePasswordRequest,
    ) -> Result<ChangePasswordResponse, ApiError> {
        let response = self
            .authorize(self.http.post(self.endpoint("/change-password")))
            .await
            .json(&request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn analyze_intonation(
        &self,
        file_name: &str,
        audio: Vec<u8>,
        phrase_id: &str,
    ) -> Result<AnalyzeResponse, ApiError> {
        let file_part = multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("phrase", phrase_id.to_string());

        let response = self
            .authorize(self.http.post(self.endpoint("/analyze-intonation")))
            .await
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }
}

/// Pulls the server's message out of an error body.
///
/// Bodies are attempted as JSON with an `error` field; anything else falls
/// back to the raw text.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    body.to_string()
}
