//! Auth slice -- session identity and the login / token refresh lifecycles.
//!
//! Only the session token survives a restart. The user profile and the
//! `is_authenticated` flag are rebuilt by logging in again.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::OperationError;
use crate::operation::AsyncOperation;
use crate::persist::PersistedSlice;
use crate::slice::Slice;
use crate::state::StateTree;
use crate::store::Store;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Authentication state. The default value is the unauthenticated state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Actions accepted by the [`AuthState`] slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuthAction {
    /// Login requested: raise `loading`, clear the previous error.
    LoginPending,
    /// Login succeeded.
    LoginFulfilled(Session),
    /// Login failed with a human-readable reason.
    LoginRejected(String),
    /// Token refresh requested. Leaves `loading` untouched.
    RefreshPending,
    /// Token refresh succeeded with a new token.
    TokenRefreshed(String),
    /// Token refresh failed. Leaves `error` untouched.
    RefreshRejected(String),
    /// Reset to the unauthenticated state. Other slices are untouched.
    Logout,
    ClearError,
}

impl AuthAction {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::LoginPending => "login/pending",
            Self::LoginFulfilled(_) => "login/fulfilled",
            Self::LoginRejected(_) => "login/rejected",
            Self::RefreshPending => "refreshToken/pending",
            Self::TokenRefreshed(_) => "refreshToken/fulfilled",
            Self::RefreshRejected(_) => "refreshToken/rejected",
            Self::Logout => "logout",
            Self::ClearError => "clearError",
        }
    }
}

// ---------------------------------------------------------------------------
// Slice impl
// ---------------------------------------------------------------------------

impl Slice for AuthState {
    const NAME: &'static str = "auth";
    type Action = AuthAction;

    fn route(action: &Action) -> Option<&AuthAction> {
        match action {
            Action::Auth(a) => Some(a),
            _ => None,
        }
    }

    fn apply(mut self, action: &AuthAction) -> Self {
        match action {
            AuthAction::LoginPending => {
                self.loading = true;
                self.error = None;
            }
            AuthAction::LoginFulfilled(session) => {
                self.loading = false;
                self.user = Some(session.user.clone());
                self.token = Some(session.token.clone());
                self.is_authenticated = true;
            }
            AuthAction::LoginRejected(reason) => {
                self.loading = false;
                self.error = Some(reason.clone());
            }
            // A refresh runs in the background: `loading` and `error`
            // belong to the login flow.
            AuthAction::RefreshPending | AuthAction::RefreshRejected(_) => {}
            AuthAction::TokenRefreshed(token) => self.token = Some(token.clone()),
            AuthAction::Logout => return Self::default(),
            AuthAction::ClearError => self.error = None,
        }
        self
    }

    fn get(tree: &StateTree) -> &std::sync::Arc<Self> {
        &tree.auth
    }

    fn get_mut(tree: &mut StateTree) -> &mut std::sync::Arc<Self> {
        &mut tree.auth
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Whitelisted auth fields: the token only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthProjection {
    pub token: Option<String>,
}

impl PersistedSlice for AuthState {
    type Projection = AuthProjection;

    fn project(&self) -> AuthProjection {
        AuthProjection {
            token: self.token.clone(),
        }
    }

    fn merge(mut self, projection: AuthProjection) -> Self {
        if projection.token.is_some() {
            self.token = projection.token;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Authenticate against the upstream with an email / password pair.
#[derive(Debug, Clone)]
pub struct Login {
    pub email: String,
    pub password: String,
}

impl Login {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl AsyncOperation for Login {
    type Output = Session;
    const NAME: &'static str = "auth/login";

    fn requested(&self) -> Action {
        AuthAction::LoginPending.into()
    }

    fn run(self, store: Store) -> impl Future<Output = Result<Session, OperationError>> + Send {
        async move {
            store
                .upstream()
                .authenticate(&self.email, &self.password)
                .await
        }
    }

    fn succeeded(session: &Session) -> Action {
        AuthAction::LoginFulfilled(session.clone()).into()
    }

    fn failed(error: &OperationError) -> Action {
        AuthAction::LoginRejected(error.reason().to_owned()).into()
    }
}

/// Exchange the current token for a fresh one.
///
/// Rejected with `"No token found"` when the auth slice holds no token.
#[derive(Debug, Clone, Default)]
pub struct RefreshToken;

impl AsyncOperation for RefreshToken {
    type Output = String;
    const NAME: &'static str = "auth/refreshToken";

    fn requested(&self) -> Action {
        AuthAction::RefreshPending.into()
    }

    fn run(self, store: Store) -> impl Future<Output = Result<String, OperationError>> + Send {
        async move {
            let token = store
                .state()
                .auth
                .token
                .clone()
                .ok_or_else(|| OperationError::invalid("No token found"))?;
            store.upstream().refresh_token(&token).await
        }
    }

    fn succeeded(token: &String) -> Action {
        AuthAction::TokenRefreshed(token.clone()).into()
    }

    fn failed(error: &OperationError) -> Action {
        AuthAction::RefreshRejected(error.reason().to_owned()).into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            user: User {
                id: "1".into(),
                name: "Naija User".into(),
                email: "user@example.com".into(),
                avatar: "🇳🇬".into(),
            },
            token: "mock-jwt-token-12345".into(),
        }
    }

    #[test]
    fn default_is_unauthenticated() {
        let s = AuthState::default();
        assert!(!s.is_authenticated);
        assert!(s.user.is_none());
        assert!(s.token.is_none());
        assert!(!s.loading);
    }

    #[test]
    fn pending_sets_loading_and_clears_error() {
        let s = AuthState {
            error: Some("Invalid credentials".into()),
            ..AuthState::default()
        };
        let s = s.apply(&AuthAction::LoginPending);
        assert!(s.loading);
        assert_eq!(s.error, None);
    }

    #[test]
    fn fulfilled_authenticates() {
        let s = AuthState::default()
            .apply(&AuthAction::LoginPending)
            .apply(&AuthAction::LoginFulfilled(session()));
        assert!(!s.loading);
        assert!(s.is_authenticated);
        assert_eq!(s.user, Some(session().user));
        assert_eq!(s.token.as_deref(), Some("mock-jwt-token-12345"));
    }

    #[test]
    fn rejected_stores_reason_and_stays_signed_out() {
        let s = AuthState::default()
            .apply(&AuthAction::LoginPending)
            .apply(&AuthAction::LoginRejected("Invalid credentials".into()));
        assert!(!s.loading);
        assert!(!s.is_authenticated);
        assert_eq!(s.error.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn logout_resets_to_initial() {
        let s = AuthState::default()
            .apply(&AuthAction::LoginFulfilled(session()))
            .apply(&AuthAction::Logout);
        assert_eq!(s, AuthState::default());
    }

    #[test]
    fn token_refresh_replaces_token_only() {
        let s = AuthState::default()
            .apply(&AuthAction::LoginFulfilled(session()))
            .apply(&AuthAction::RefreshPending)
            .apply(&AuthAction::TokenRefreshed("refreshed-abc".into()));
        assert_eq!(s.token.as_deref(), Some("refreshed-abc"));
        assert!(s.is_authenticated);
        assert!(!s.loading);
    }

    #[test]
    fn refresh_phases_leave_login_flags_alone() {
        let pending = AuthState::default().apply(&AuthAction::LoginPending);
        let s = pending
            .clone()
            .apply(&AuthAction::RefreshPending)
            .apply(&AuthAction::RefreshRejected("No token found".into()));
        assert_eq!(s, pending);
        assert!(s.loading);
        assert_eq!(s.error, None);

        let s = AuthState::default().apply(&AuthAction::TokenRefreshed("t".into()));
        assert_eq!(s.token.as_deref(), Some("t"));
        assert!(!s.loading);
    }

    #[test]
    fn projection_keeps_token_only() {
        let s = AuthState::default().apply(&AuthAction::LoginFulfilled(session()));
        let json = serde_json::to_value(s.project()).expect("serialize");
        assert_eq!(json, serde_json::json!({"token": "mock-jwt-token-12345"}));
    }

    #[test]
    fn merge_restores_token_without_authenticating() {
        let s = AuthState::default().merge(AuthProjection {
            token: Some("saved".into()),
        });
        assert_eq!(s.token.as_deref(), Some("saved"));
        assert!(!s.is_authenticated);
        assert!(s.user.is_none());
    }
}
