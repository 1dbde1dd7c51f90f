use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// User snapshot captured at login/registration or by a profile fetch.
/// Not invalidated when the server-side user changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserSnapshot>,
}

/// Client-held authentication state: access/refresh tokens plus the user
/// snapshot. Constructor-injected and shared by the HTTP client and every
/// service façade; never a module-level singleton.
///
/// A single lock guards all three fields so login installs them together.
pub struct SessionStore {
    state: RwLock<SessionState>,
    ended: watch::Sender<bool>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            state: RwLock::new(SessionState::default()),
            ended,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().unwrap().access_token.clone()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.state.write().unwrap().access_token = Some(token.into());
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().unwrap().refresh_token.clone()
    }

    pub fn set_refresh_token(&self, token: impl Into<String>) {
        self.state.write().unwrap().refresh_token = Some(token.into());
    }

    pub fn user(&self) -> Option<UserSnapshot> {
        self.state.read().unwrap().user.clone()
    }

    pub fn set_user(&self, user: UserSnapshot) {
        self.state.write().unwrap().user = Some(user);
    }

    /// Token presence only; no expiry or validity check.
    pub fn is_authenticated(&self) -> bool {
        self.state.read().unwrap().access_token.is_some()
    }

    /// Installs a full session in one write, as produced by login or
    /// registration.
    pub fn install(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: Option<UserSnapshot>,
    ) {
        {
            let mut state = self.state.write().unwrap();
            state.access_token = Some(access_token.into());
            state.refresh_token = Some(refresh_token.into());
            state.user = user;
        }
        self.ended.send_replace(false);
    }

    /// Destroys the session and signals the application that it ended.
    pub fn clear(&self) {
        {
            let mut state = self.state.write().unwrap();
            *state = SessionState::default();
        }
        self.ended.send_replace(true);
    }

    /// Receiver flips to `true` when the session is cleared (logout or an
    /// irrecoverable refresh failure). The application decides how to react,
    /// typically by navigating to a login view; no hard redirect happens
    /// here.
    pub fn on_session_ended(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }
}
