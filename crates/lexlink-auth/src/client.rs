//! Network calls against the auth endpoints.
//!
//! Each call is independent; all token persistence and state transitions live
//! in the session manager.

use crate::{AuthError, AuthResult, Role};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which delivery channel an OTP flow uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
    Email,
    Phone,
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Minimal user summary included in the verify response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedUser {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Result of a successful OTP verification.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub tokens: TokenPair,
    pub user: Option<VerifiedUser>,
}

/// Full profile returned by `GET /auth/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub account_status: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Envelope shape used by every auth endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    user: Option<VerifiedUser>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/{}", self.base_url, path)
    }

    /// Ask the server to dispatch a one-time code.
    pub async fn request_otp(
        &self,
        identifier: &str,
        channel: OtpChannel,
        role: Role,
    ) -> AuthResult<()> {
        let (url, body) = match channel {
            OtpChannel::Email => (
                self.auth_url("request-otp-email"),
                json!({ "email": identifier }),
            ),
            OtpChannel::Phone => (
                self.auth_url("request-otp"),
                json!({ "phoneNumber": identifier, "role": role.as_str() }),
            ),
        };

        debug!(url = %url, "Requesting OTP dispatch");
        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            warn!(status = %status, message = %message, "OTP request rejected");
            return Err(AuthError::OtpRequest(message));
        }

        Ok(())
    }

    /// Exchange a one-time code for a token pair.
    pub async fn verify_otp(
        &self,
        identifier: &str,
        channel: OtpChannel,
        code: &str,
        role: Role,
    ) -> AuthResult<VerifyOutcome> {
        let (url, body) = match channel {
            OtpChannel::Email => (
                self.auth_url("verify-otp-email"),
                json!({ "email": identifier, "otp": code, "role": role.as_str() }),
            ),
            OtpChannel::Phone => (
                self.auth_url("verify-otp"),
                json!({ "phoneNumber": identifier, "otp": code }),
            ),
        };

        debug!(url = %url, "Verifying OTP");
        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            warn!(status = %status, message = %message, "OTP verification rejected");
            return Err(AuthError::OtpVerify(message));
        }

        let envelope: ApiEnvelope<TokenGrant> = response.json().await?;
        Ok(VerifyOutcome {
            tokens: TokenPair {
                access_token: envelope.data.access_token,
                refresh_token: envelope.data.refresh_token,
            },
            user: envelope.data.user,
        })
    }

    /// Trade the refresh token for a new pair. A rejection means the session
    /// is over; callers must not retry it.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let url = self.auth_url("refresh");

        debug!(url = %url, "Refreshing token pair");
        let response = self.http.post(&url).bearer_auth(refresh_token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            warn!(status = %status, message = %message, "Refresh rejected by server");
            return Err(AuthError::SessionExpired);
        }

        let envelope: ApiEnvelope<TokenGrant> = response.json().await?;
        Ok(TokenPair {
            access_token: envelope.data.access_token,
            refresh_token: envelope.data.refresh_token,
        })
    }

    /// Fetch the caller's profile.
    pub async fn fetch_current_user(&self, access_token: &str) -> AuthResult<UserProfile> {
        let url = self.auth_url("me");

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::SessionExpired);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            warn!(status = %status, message = %message, "Profile fetch failed");
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<UserProfile> = response.json().await?;
        Ok(envelope.data)
    }
}

/// Extract the server's `{message}` body, falling back to the HTTP status.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.trim().is_empty() => message,
        _ => format!("HTTP {status}"),
    }
}
