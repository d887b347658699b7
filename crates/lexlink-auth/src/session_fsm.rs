//! Session state machine using rust-fsm.
//!
//! The session resolves exactly once out of `Initializing` and afterwards
//! only moves between `Authenticated` and `Anonymous`. There is no way back
//! into `Initializing`, so consumers waiting on the first resolution are
//! guaranteed it happens once.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────────────┐
//! │   Initializing   │ (initial)
//! └────────┬─────────┘
//!          │ ResolvedAuthenticated / ResolvedAnonymous
//!          ▼
//! ┌──────────────────┐   SessionLost / LoggedOut   ┌──────────────────┐
//! │  Authenticated   │ ──────────────────────────► │    Anonymous     │
//! │ (TokensRotated ↺)│ ◄────────────────────────── │                  │
//! └──────────────────┘          SignedIn           └──────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// The declarative macro generates a module `session_machine` with State,
// Input and StateMachine items.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Initializing)

    Initializing => {
        ResolvedAuthenticated => Authenticated,
        ResolvedAnonymous => Anonymous
    },
    Anonymous => {
        SignedIn => Authenticated
    },
    Authenticated => {
        TokensRotated => Authenticated,
        SessionLost => Anonymous,
        LoggedOut => Anonymous
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Simplified session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Initial resolution from stored tokens has not finished yet.
    Initializing,
    /// Signed in with a usable token pair.
    Authenticated,
    /// No session.
    Anonymous,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Returns true while the initial resolution is still pending.
    pub fn is_authenticating(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Initializing => SessionState::Initializing,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Anonymous => SessionState::Anonymous,
        }
    }
}
