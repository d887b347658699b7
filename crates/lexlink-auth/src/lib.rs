//! Client-side authentication session for the LexLink marketplace.
//!
//! This crate owns the full token lifecycle for a client talking to the
//! LexLink backend:
//! - OTP-based login over email or phone
//! - access/refresh token persistence via `lexlink-storage`
//! - proactive silent refresh ahead of access-token expiry
//! - request-level 401 recovery with a single coalesced in-flight refresh
//! - identity and role state derived from the access token
//!
//! The session is an explicit state machine (`Initializing`, `Authenticated`,
//! `Anonymous`); consumers observe it through snapshots or a state callback.

mod claims;
mod client;
mod config;
mod error;
mod http;
mod session;
mod session_fsm;

pub use claims::{decode_claims, Claims, Role};
pub use client::{AuthClient, OtpChannel, TokenPair, UserProfile, VerifiedUser, VerifyOutcome};
pub use config::{AuthConfig, DEFAULT_OTP_RESEND_COOLDOWN, DEFAULT_REFRESH_LEAD_TIME};
pub use error::{AuthError, AuthResult};
pub use http::ApiClient;
pub use session::{SessionCallback, SessionManager, SessionSnapshot};
pub use session_fsm::{SessionInput, SessionMachine, SessionMachineState, SessionState};
