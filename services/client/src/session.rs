//! services/client/src/session.rs
//!
//! The in-memory credential holder shared by the remote client and the
//! authenticator.
//!
//! The access token lives in a single mutable holder that requests read at
//! send time; it is never written to durable storage and never placed in
//! shared default headers. Identity changes are published to subscribers
//! through a `watch` channel.
//!
//! Every forced end of the session (logout, failed attempt, failed refresh)
//! bumps an epoch. A refresh started under an older epoch cannot install its
//! token.

use std::sync::atomic::{AtomicU64, Ordering};
use taskflow_core::domain::{AccessToken, AuthError, User};
use tokio::sync::watch;

/// Where the client is in the authentication lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticating,
    /// A magic link was sent; the session starts when the link is followed.
    AwaitingConfirmation { email: String },
    Authenticated,
}

/// The snapshot published to subscribers. Deliberately excludes the token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: AuthPhase,
    pub user: Option<User>,
    pub error: Option<AuthError>,
    pub is_loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }
}

pub struct Session {
    token: watch::Sender<Option<AccessToken>>,
    state: watch::Sender<SessionState>,
    /// Only written while the `state` sender is locked.
    epoch: AtomicU64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty, anonymous session.
    pub fn new() -> Self {
        let (token, _) = watch::channel(None);
        let (state, _) = watch::channel(SessionState::default());
        Self {
            token,
            state,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.token.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Subscribes to identity, phase, error and loading changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    //-------------------------------------------------------------------------------------
    // Transitions (driven by the authenticator and the remote client)
    //-------------------------------------------------------------------------------------

    /// Enters `Authenticating` for a login attempt, clearing the previous error.
    pub(crate) fn begin_attempt(&self) {
        self.state.send_modify(|s| {
            s.phase = AuthPhase::Authenticating;
            s.error = None;
            s.is_loading = true;
        });
    }

    /// Enters `Authenticating` for a silent refresh. The user stays visible.
    pub(crate) fn begin_refresh(&self) {
        self.state.send_modify(|s| {
            s.phase = AuthPhase::Authenticating;
            s.is_loading = true;
        });
    }

    pub(crate) fn establish(&self, token: AccessToken, user: User) {
        self.state.send_modify(|s| {
            self.token.send_replace(Some(token));
            s.phase = AuthPhase::Authenticated;
            s.user = Some(user);
            s.error = None;
            s.is_loading = false;
        });
    }

    /// Installs a refreshed token, keeping the known identity if there is one.
    /// Returns `false`, changing nothing, if the session was ended after
    /// `epoch` was read.
    pub(crate) fn install_refreshed(&self, token: AccessToken, epoch: u64) -> bool {
        self.state.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            self.token.send_replace(Some(token));
            s.phase = AuthPhase::Authenticated;
            if s.user.is_none() {
                s.user = Some(User {
                    id: None,
                    email: None,
                    is_logged_in: true,
                });
            }
            s.error = None;
            s.is_loading = false;
            true
        })
    }

    pub(crate) fn await_confirmation(&self, email: String) {
        self.state.send_modify(|s| {
            s.phase = AuthPhase::AwaitingConfirmation { email };
            s.is_loading = false;
        });
    }

    /// Ends the attempt with an error: back to anonymous, token and user dropped.
    pub(crate) fn fail(&self, error: AuthError) {
        self.state.send_modify(|s| {
            self.end(s);
            s.error = Some(error);
        });
    }

    /// Drops token and identity unconditionally. A retained error survives
    /// until the next attempt.
    pub(crate) fn clear(&self) {
        self.state.send_modify(|s| self.end(s));
    }

    fn end(&self, s: &mut SessionState) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.token.send_replace(None);
        s.phase = AuthPhase::Anonymous;
        s.user = None;
        s.is_loading = false;
    }
}
