//! YouTube OAuth credential management
//!
//! Produces an authorized API handle for a short-lived CLI process while
//! keeping interactive consent to a minimum. Each invocation starts from
//! the token file on disk:
//!
//! 1. `CredentialManager::acquire()` loads the client secrets and the
//!    stored credential record
//! 2. A stale record with a refresh token is refreshed and re-persisted
//! 3. The token is verified with a side-effect-free API call
//! 4. Otherwise the browser consent flow runs against a local callback
//!    listener (`callback::CallbackServer`), and the exchanged tokens are
//!    persisted
//! 5. The returned `AuthorizedClient` refreshes mid-session when needed and
//!    notifies its `RefreshListener`s, one of which is the token file

pub mod browser;
pub mod callback;
pub mod client_secrets;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod handle;
pub mod machine;
pub mod manager;
pub mod pkce;
pub mod token;

#[cfg(test)]
mod testutil;

pub use browser::{BrowserLauncher, PrintUrl, SystemBrowser};
pub use client_secrets::ClientSecrets;
pub use config::AuthConfig;
pub use constants::*;
pub use credentials::{StoredCredential, TokenFile};
pub use error::{Error, Result};
pub use handle::{AuthorizedClient, RefreshListener};
pub use machine::{AuthAction, AuthEvent, AuthState};
pub use manager::CredentialManager;
