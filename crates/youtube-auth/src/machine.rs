//! Credential acquisition state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! `CredentialManager::acquire` executes the I/O implied by each action and
//! feeds the outcome back as the next event.
//!
//! Transitions:
//! - NoToken → InteractiveRequired (no readable record)
//! - NoToken → TokenPresent (record loaded)
//! - TokenPresent → TokenExpiredRefreshable (refresh token + stale access token)
//! - TokenPresent → TokenVerified (everything else; probe pending)
//! - TokenExpiredRefreshable → TokenVerified (refresh succeeded, persisted)
//! - TokenExpiredRefreshable → InteractiveRequired (refresh rejected)
//! - TokenVerified → Authorized (probe passed)
//! - TokenVerified → InteractiveRequired (probe failed)
//! - InteractiveRequired → Authorized (code exchanged, persisted)

use crate::credentials::StoredCredential;

/// Acquisition states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing loaded yet
    NoToken,
    /// A stored record exists; expiry not yet inspected
    TokenPresent(StoredCredential),
    /// Stored access token is stale but a refresh token is available
    TokenExpiredRefreshable(StoredCredential),
    /// Token in hand, awaiting the capability probe
    TokenVerified(StoredCredential),
    /// Browser consent needed
    InteractiveRequired,
    /// Terminal: token proven usable
    Authorized(StoredCredential),
}

impl AuthState {
    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::NoToken => "no_token",
            AuthState::TokenPresent(_) => "token_present",
            AuthState::TokenExpiredRefreshable(_) => "token_expired_refreshable",
            AuthState::TokenVerified(_) => "token_verified",
            AuthState::InteractiveRequired => "interactive_required",
            AuthState::Authorized(_) => "authorized",
        }
    }
}

/// Outcomes fed back into the machine.
#[derive(Debug)]
pub enum AuthEvent {
    /// Token file read; `None` when absent or unreadable
    RecordLoaded(Option<StoredCredential>),
    /// Wall clock sampled for the expiry check
    ClockRead { now_millis: u64 },
    /// Refresh exchange succeeded and the new record was persisted
    Refreshed(StoredCredential),
    /// Token endpoint rejected the refresh token
    RefreshRejected,
    ProbePassed,
    ProbeFailed,
    /// Interactive flow finished and the new record was persisted
    CodeExchanged(StoredCredential),
}

/// I/O the caller performs next.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthAction {
    /// Sample the clock and send `ClockRead`
    CheckExpiry,
    /// Exchange this refresh token
    Refresh { refresh_token: String },
    /// Verify this access token against the API
    Probe { access_token: String },
    /// Run the browser consent flow
    StartInteractive,
    /// Return the authorized handle
    Finish,
    /// Unexpected event for the current state
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: AuthState, event: AuthEvent) -> (AuthState, AuthAction) {
    match (state, event) {
        // --- NoToken ---
        (AuthState::NoToken, AuthEvent::RecordLoaded(None)) => {
            (AuthState::InteractiveRequired, AuthAction::StartInteractive)
        }
        (AuthState::NoToken, AuthEvent::RecordLoaded(Some(record))) => {
            (AuthState::TokenPresent(record), AuthAction::CheckExpiry)
        }

        // --- TokenPresent ---
        (AuthState::TokenPresent(record), AuthEvent::ClockRead { now_millis }) => {
            let stale = record.is_expired(now_millis) || record.access_token.is_empty();
            match record.refresh_token.clone() {
                Some(refresh_token) if stale && record.can_refresh() => (
                    AuthState::TokenExpiredRefreshable(record),
                    AuthAction::Refresh { refresh_token },
                ),
                _ => verify(record),
            }
        }

        // --- TokenExpiredRefreshable ---
        (AuthState::TokenExpiredRefreshable(_), AuthEvent::Refreshed(record)) => verify(record),
        (AuthState::TokenExpiredRefreshable(_), AuthEvent::RefreshRejected) => {
            (AuthState::InteractiveRequired, AuthAction::StartInteractive)
        }

        // --- TokenVerified ---
        (AuthState::TokenVerified(record), AuthEvent::ProbePassed) => {
            (AuthState::Authorized(record), AuthAction::Finish)
        }
        (AuthState::TokenVerified(_), AuthEvent::ProbeFailed) => {
            (AuthState::InteractiveRequired, AuthAction::StartInteractive)
        }

        // --- InteractiveRequired ---
        (AuthState::InteractiveRequired, AuthEvent::CodeExchanged(record)) => {
            (AuthState::Authorized(record), AuthAction::Finish)
        }

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, AuthAction::None),
    }
}

fn verify(record: StoredCredential) -> (AuthState, AuthAction) {
    let access_token = record.access_token.clone();
    (
        AuthState::TokenVerified(record),
        AuthAction::Probe { access_token },
    )
}
