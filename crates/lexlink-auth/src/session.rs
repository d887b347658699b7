//! Session orchestration: login flow, silent refresh, logout.

use crate::claims::{decode_claims, Claims};
use crate::client::{AuthClient, OtpChannel, TokenPair};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::session_fsm::{SessionInput, SessionMachine, SessionState};
use crate::Role;
use chrono::Utc;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use lexlink_storage::{TokenKind, TokenStore};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome type of the shared in-flight refresh. The error is wrapped in an
/// `Arc` so every awaiter of the shared future gets a clone.
type SharedRefresh = Shared<BoxFuture<'static, Result<String, Arc<AuthError>>>>;

/// Callback invoked on session state changes.
pub type SessionCallback = Box<dyn Fn(SessionSnapshot) + Send + Sync>;

/// Point-in-time view of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<Claims>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }
}

struct SessionInner {
    config: AuthConfig,
    client: AuthClient,
    store: TokenStore,
    fsm: Mutex<SessionMachine>,
    user: Mutex<Option<Claims>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    refresh_inflight: Mutex<Option<SharedRefresh>>,
    last_otp_request: Mutex<Option<Instant>>,
    state_callback: Mutex<Option<SessionCallback>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

/// Session manager: the single owner of token-pair mutation.
///
/// Instances are isolated; construct one per backend and share it by cloning
/// (clones point at the same session).
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(config: AuthConfig, store: TokenStore) -> Self {
        let client = AuthClient::new(config.base_url.clone());
        Self::with_client(config, client, store)
    }

    /// Construct with an explicit client.
    pub fn with_client(config: AuthConfig, client: AuthClient, store: TokenStore) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                client,
                store,
                fsm: Mutex::new(SessionMachine::new()),
                user: Mutex::new(None),
                refresh_task: Mutex::new(None),
                refresh_inflight: Mutex::new(None),
                last_otp_request: Mutex::new(None),
                state_callback: Mutex::new(None),
            }),
        }
    }

    /// Register a callback fired on every state change.
    pub fn set_state_callback(&self, callback: SessionCallback) {
        *self.inner.state_callback.lock().unwrap() = Some(callback);
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.inner.fsm.lock().unwrap().state())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            user: self.inner.user.lock().unwrap().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner.store.get(TokenKind::Access)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    /// Expose the underlying endpoint client for direct calls.
    pub fn client(&self) -> &AuthClient {
        &self.inner.client
    }

    /// Resolve the initial session state from stored tokens. Called once at
    /// startup; always settles out of `Initializing`.
    pub async fn initialize(&self) -> AuthResult<SessionSnapshot> {
        if let Some(access_token) = self.inner.store.get(TokenKind::Access) {
            match decode_claims(&access_token) {
                Ok(claims) => {
                    info!(subject_id = %claims.subject_id, "Restored session from stored token");
                    self.install_claims(claims)?;
                    return Ok(self.snapshot());
                }
                Err(error) => {
                    warn!(error = %error, "Stored access token is unreadable, discarding");
                    self.inner.store.clear();
                }
            }
        }

        if self.inner.store.has(TokenKind::Refresh) {
            debug!("No usable access token but refresh token present, attempting refresh");
            if let Err(error) = self.refresh_access_token().await {
                warn!(error = %error, "Startup refresh failed");
                if self.state().is_authenticating() {
                    self.resolve_anonymous();
                }
            }
            return Ok(self.snapshot());
        }

        info!("No stored session");
        self.resolve_anonymous();
        Ok(self.snapshot())
    }

    /// Ask for an OTP dispatch, enforcing the resend cooldown.
    pub async fn request_otp(
        &self,
        identifier: &str,
        channel: OtpChannel,
        role: Role,
    ) -> AuthResult<()> {
        let previous = {
            let mut last = self.inner.last_otp_request.lock().unwrap();
            if let Some(at) = *last {
                let elapsed = at.elapsed();
                if elapsed < self.inner.config.otp_resend_cooldown {
                    let remaining = self.inner.config.otp_resend_cooldown - elapsed;
                    return Err(AuthError::OtpCooldown {
                        remaining_secs: remaining.as_secs().max(1),
                    });
                }
            }
            // Claim the window before dispatching, so a concurrent caller
            // sees the cooldown instead of racing past the check.
            last.replace(Instant::now())
        };

        if let Err(error) = self.inner.client.request_otp(identifier, channel, role).await {
            // A dispatch that never happened does not consume the window.
            *self.inner.last_otp_request.lock().unwrap() = previous;
            return Err(error);
        }

        info!(channel = ?channel, "OTP dispatched");
        Ok(())
    }

    /// Exchange a code for a session. A wrong or expired code surfaces as a
    /// recoverable error and leaves the pending challenge usable.
    pub async fn verify_otp(
        &self,
        identifier: &str,
        channel: OtpChannel,
        code: &str,
        role: Role,
    ) -> AuthResult<SessionSnapshot> {
        let outcome = self
            .inner
            .client
            .verify_otp(identifier, channel, code, role)
            .await?;

        let claims = self.adopt_tokens(&outcome.tokens)?;
        info!(subject_id = %claims.subject_id, "Signed in");

        // A completed login retires the resend cooldown.
        *self.inner.last_otp_request.lock().unwrap() = None;
        Ok(self.snapshot())
    }

    /// Refresh the token pair, coalescing concurrent callers onto a single
    /// network call. Returns the new access token.
    ///
    /// Both the proactive timer and 401 recovery funnel through here, so at
    /// most one refresh is outstanding at any instant.
    pub async fn refresh_access_token(&self) -> Result<String, Arc<AuthError>> {
        let shared = {
            let mut inflight = self.inner.refresh_inflight.lock().unwrap();
            match inflight.clone() {
                Some(existing) => {
                    debug!("Joining in-flight refresh");
                    existing
                }
                None => {
                    let weak = Arc::downgrade(&self.inner);
                    let future: SharedRefresh = async move {
                        let Some(inner) = weak.upgrade() else {
                            return Err(Arc::new(AuthError::Config(
                                "Session manager was dropped".to_string(),
                            )));
                        };
                        let manager = SessionManager { inner };
                        let result = manager.perform_refresh().await.map_err(Arc::new);
                        // Clear the marker whatever the outcome, so the next
                        // refresh starts a fresh call.
                        manager.inner.refresh_inflight.lock().unwrap().take();
                        result
                    }
                    .boxed()
                    .shared();

                    *inflight = Some(future.clone());
                    future
                }
            }
        };

        shared.await
    }

    /// Await any refresh currently in flight without starting one.
    pub(crate) async fn settle_inflight_refresh(&self) {
        let pending = self.inner.refresh_inflight.lock().unwrap().clone();
        if let Some(shared) = pending {
            let _ = shared.await;
        }
    }

    /// Clear the session locally. Idempotent, never fails.
    pub fn logout(&self) {
        self.cancel_scheduled_refresh();
        self.inner.store.clear();
        *self.inner.user.lock().unwrap() = None;

        let input = match self.state() {
            SessionState::Authenticated => Some(SessionInput::LoggedOut),
            // A logout before the first resolution still settles the session.
            SessionState::Initializing => Some(SessionInput::ResolvedAnonymous),
            SessionState::Anonymous => None,
        };
        if let Some(input) = input {
            let _ = self.transition(&input);
        }
        info!("Logged out");
    }

    async fn perform_refresh(&self) -> AuthResult<String> {
        let Some(refresh_token) = self.inner.store.get(TokenKind::Refresh) else {
            warn!("No refresh token available, session is over");
            self.fail_session();
            return Err(AuthError::SessionExpired);
        };

        match self.inner.client.refresh(&refresh_token).await {
            Ok(pair) => {
                // A logout that raced this refresh wins; tokens landing
                // afterwards must not resurrect the session.
                if self.state() == SessionState::Anonymous {
                    debug!("Refresh finished after logout, discarding tokens");
                    return Err(AuthError::SessionExpired);
                }
                let claims = self.adopt_tokens(&pair)?;
                debug!(subject_id = %claims.subject_id, "Token pair refreshed");
                Ok(pair.access_token)
            }
            Err(error) => {
                // Transient failures leave the session intact; the next 401
                // drives another attempt. Terminal rejections end it.
                if error.is_terminal() {
                    self.fail_session();
                }
                Err(error)
            }
        }
    }

    /// Store a fresh token pair and re-derive identity from it.
    fn adopt_tokens(&self, pair: &TokenPair) -> AuthResult<Claims> {
        let claims = match decode_claims(&pair.access_token) {
            Ok(claims) => claims,
            Err(error) => {
                warn!(error = %error, "Issued access token is unreadable");
                self.fail_session();
                return Err(error);
            }
        };

        self.inner.store.set_pair(&pair.access_token, &pair.refresh_token);
        self.install_claims(claims.clone())?;
        Ok(claims)
    }

    /// Publish claims and mark the session authenticated.
    ///
    /// The user is set before the state flips so observers never see an
    /// authenticated session without a user.
    fn install_claims(&self, claims: Claims) -> AuthResult<()> {
        let exp = claims.exp;
        *self.inner.user.lock().unwrap() = Some(claims);

        let input = match self.state() {
            SessionState::Initializing => SessionInput::ResolvedAuthenticated,
            SessionState::Anonymous => SessionInput::SignedIn,
            SessionState::Authenticated => SessionInput::TokensRotated,
        };
        let rotation = matches!(input, SessionInput::TokensRotated);
        self.transition(&input)?;
        if rotation {
            // Rotation is a self-loop; observers still want the new claims.
            self.notify_state_change();
        }

        self.schedule_refresh(exp);
        Ok(())
    }

    /// Drop the session after a terminal failure.
    fn fail_session(&self) {
        self.cancel_scheduled_refresh();
        self.inner.store.clear();
        *self.inner.user.lock().unwrap() = None;

        let input = match self.state() {
            SessionState::Initializing => Some(SessionInput::ResolvedAnonymous),
            SessionState::Authenticated => Some(SessionInput::SessionLost),
            SessionState::Anonymous => None,
        };
        if let Some(input) = input {
            let _ = self.transition(&input);
        }
    }

    fn resolve_anonymous(&self) {
        *self.inner.user.lock().unwrap() = None;
        let _ = self.transition(&SessionInput::ResolvedAnonymous);
    }

    /// Schedule the one-shot silent refresh at `exp - lead_time`, replacing
    /// any previously scheduled timer.
    fn schedule_refresh(&self, exp: i64) {
        let delay = refresh_delay(exp, self.inner.config.refresh_lead_time, Utc::now().timestamp());
        debug!(delay_secs = delay.as_secs(), "Scheduling silent refresh");

        // The timer holds only a weak reference: a pending timer must never
        // keep a torn-down manager alive or fire against one.
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = SessionManager { inner };
            debug!("Silent refresh timer fired");
            if let Err(error) = manager.refresh_access_token().await {
                warn!(error = %error, "Scheduled refresh failed");
            }
        });

        let mut slot = self.inner.refresh_task.lock().unwrap();
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    fn cancel_scheduled_refresh(&self) {
        if let Some(task) = self.inner.refresh_task.lock().unwrap().take() {
            task.abort();
        }
    }

    fn transition(&self, input: &SessionInput) -> AuthResult<SessionState> {
        let new_state = {
            let mut fsm = self.inner.fsm.lock().unwrap();
            let old_state = SessionState::from(fsm.state());
            fsm.consume(input).map_err(|_| {
                AuthError::InvalidStateTransition(format!(
                    "cannot apply {:?} in state {:?}",
                    input, old_state
                ))
            })?;
            let new_state = SessionState::from(fsm.state());
            if old_state == new_state {
                return Ok(new_state);
            }
            debug!(old_state = ?old_state, new_state = ?new_state, "Session state changed");
            new_state
        };

        self.notify_state_change();
        Ok(new_state)
    }

    fn notify_state_change(&self) {
        let snapshot = self.snapshot();
        let callback = self.inner.state_callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            callback(snapshot);
        }
    }
}

/// Delay until the silent refresh should fire: `exp - lead_time`, clamped to
/// zero so an already-stale token refreshes immediately instead of arming a
/// negative timer.
fn refresh_delay(exp: i64, lead_time: Duration, now: i64) -> Duration {
    let refresh_at = exp.saturating_sub(lead_time.as_secs() as i64);
    Duration::from_secs(refresh_at.saturating_sub(now).max(0) as u64)
}
