//! Client configuration.

use crate::{AuthError, AuthResult};
use std::time::Duration;
use url::Url;

/// Margin subtracted from token expiry when scheduling the silent refresh.
pub const DEFAULT_REFRESH_LEAD_TIME: Duration = Duration::from_secs(60);

/// Minimum gap between OTP dispatch requests, matching the web client.
pub const DEFAULT_OTP_RESEND_COOLDOWN: Duration = Duration::from_secs(30);

const API_URL_ENV: &str = "LEXLINK_API_URL";

/// Configuration for the auth session.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Backend base URL, normalized without a trailing slash.
    pub base_url: String,
    /// How long before expiry the proactive refresh fires. Must stay strictly
    /// below the shortest access-token lifetime the server issues.
    pub refresh_lead_time: Duration,
    /// Client-enforced cooldown between OTP dispatches.
    pub otp_resend_cooldown: Duration,
}

impl AuthConfig {
    pub fn new(base_url: impl Into<String>) -> AuthResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| AuthError::Config(format!("Invalid base URL {base_url:?}: {e}")))?;

        Ok(Self {
            base_url,
            refresh_lead_time: DEFAULT_REFRESH_LEAD_TIME,
            otp_resend_cooldown: DEFAULT_OTP_RESEND_COOLDOWN,
        })
    }

    /// Read the base URL from `LEXLINK_API_URL`.
    pub fn from_env() -> AuthResult<Self> {
        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AuthError::Config(format!("{API_URL_ENV} is not set")))?;
        Self::new(base_url)
    }

    pub fn with_refresh_lead_time(mut self, lead_time: Duration) -> Self {
        self.refresh_lead_time = lead_time;
        self
    }

    pub fn with_otp_resend_cooldown(mut self, cooldown: Duration) -> Self {
        self.otp_resend_cooldown = cooldown;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = AuthConfig::new("https://api.lexlink.app/").unwrap();
        assert_eq!(config.base_url, "https://api.lexlink.app");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            AuthConfig::new("not a url"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new("http://localhost:4000").unwrap();
        assert_eq!(config.refresh_lead_time, Duration::from_secs(60));
        assert_eq!(config.otp_resend_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_builders_override_defaults() {
        let config = AuthConfig::new("http://localhost:4000")
            .unwrap()
            .with_refresh_lead_time(Duration::from_secs(120))
            .with_otp_resend_cooldown(Duration::ZERO);
        assert_eq!(config.refresh_lead_time, Duration::from_secs(120));
        assert_eq!(config.otp_resend_cooldown, Duration::ZERO);
    }
}
