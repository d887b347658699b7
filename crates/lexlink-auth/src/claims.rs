//! Bearer-token claims decoding.
//!
//! Only the payload segment of the compact token is parsed; the signature is
//! never checked here. Decoded claims are a UI and routing hint, not a
//! security boundary: the server re-validates the token on every request, and
//! any authorization-sensitive decision belongs there.

use crate::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account role. The marketplace has exactly two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Lawyer,
    Client,
}

impl Role {
    /// Wire form expected by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Lawyer => "LAWYER",
            Role::Client => "CLIENT",
        }
    }

    /// Parse a role claim value, case-insensitively. Unknown roles map to None.
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LAWYER" => Some(Role::Lawyer),
            "CLIENT" => Some(Role::Client),
            _ => None,
        }
    }
}

/// Canonical decoded view of an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub roles: BTreeSet<Role>,
    pub email: Option<String>,
    pub profile_id: Option<String>,
    /// Expiry as epoch seconds, straight from the `exp` claim.
    pub exp: i64,
}

impl Claims {
    /// Expiry instant, if `exp` is representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Raw claim shape as issued by the server. Older tokens carry a singular
/// `role` claim; both shapes normalize into `Claims::roles`.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "profileId")]
    profile_id: Option<String>,
    exp: i64,
}

/// Decode a compact token's payload into canonical claims.
///
/// Callers treat `MalformedToken` exactly like having no token at all.
pub fn decode_claims(token: &str) -> AuthResult<Claims> {
    let mut segments = token.split('.');
    let payload_b64 = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            payload
        }
        _ => {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    // Tolerate padded payloads from non-conforming issuers.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {e}")))?;

    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not valid claims JSON: {e}")))?;

    let mut roles = BTreeSet::new();
    if let Some(values) = raw.roles {
        roles.extend(values.iter().filter_map(|value| Role::parse(value)));
    }
    if let Some(value) = raw.role {
        roles.extend(Role::parse(&value));
    }

    Ok(Claims {
        subject_id: raw.sub,
        roles,
        email: raw.email,
        profile_id: raw.profile_id,
        exp: raw.exp,
    })
}
