//! User session controller: orchestrates the remote client and the
//! credential store behind single async operations.
//!
//! One controller instance serves one logical session and is expected to be
//! driven from one coordinating flow at a time; its writes to the in-memory
//! cache and the store are not concurrent-writer safe by design.

use crate::api::IntonationApi;
use crate::error::{Error, Result};
use crate::models::{ConstructionProgress, User};
use crate::store::CredentialStore;
use intona_api::{
    ChangePasswordRequest, ChangePasswordResponse, LoginRequest, RegisterRequest, RegisterResponse,
    VerificationRequest, VerificationResponse,
};
use secrecy::SecretString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

pub struct UserSession<A: IntonationApi> {
    api: A,
    store: CredentialStore,
    state: AuthState,
    token: Option<SecretString>,
    user: Option<User>,
}

impl<A: IntonationApi> UserSession<A> {
    pub fn new(api: A, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            state: AuthState::Anonymous,
            token: None,
            user: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn cached_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Attempts a remote login and, on success, adopts the session
    /// atomically: the token and user are persisted before the in-memory
    /// cache is considered authoritative.
    ///
    /// Every remote rejection is collapsed to [`Error::InvalidCredentials`];
    /// the server's own message goes to the log only.
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<User> {
        require_filled("identifier", identifier)?;
        require_filled("password", password)?;

        self.state = AuthState::Authenticating;
        let request = LoginRequest {
            username_or_email: identifier.to_string(),
            password: password.to_string(),
        };
        let auth = match self.api.login(request).await {
            Ok(auth) => auth,
            Err(error) => {
                tracing::warn!(%error, "login rejected");
                self.state = AuthState::Anonymous;
                return Err(Error::InvalidCredentials);
            }
        };

        if auth.token.trim().is_empty() {
            tracing::warn!("login response carried an empty token");
            self.state = AuthState::Anonymous;
            return Err(Error::InvalidCredentials);
        }
        let Some(user) = User::from_profile(auth.user) else {
            self.state = AuthState::Anonymous;
            return Err(Error::InvalidCredentials);
        };

        if let Err(error) = self.persist_session(&auth.token, &user).await {
            self.state = AuthState::Anonymous;
            return Err(error);
        }
        self.token = Some(SecretString::from(auth.token));
        self.user = Some(user.clone());
        self.state = AuthState::Authenticated;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(user)
    }

    async fn persist_session(&self, token: &str, user: &User) -> Result<()> {
        self.store.save_token(token).await?;
        self.store.save_user(user).await
    }

    /// Starts a registration. The account is not authenticated until the
    /// email is verified and the user logs in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse> {
        require_filled("username", username)?;
        require_filled("email", email)?;
        if !email.contains('@') {
            return Err(Error::Validation {
                field: "email",
                message: "must be a valid email address",
            });
        }
        if password.chars().count() < 6 {
            return Err(Error::Validation {
                field: "password",
                message: "must be at least 6 characters",
            });
        }
        let response = self
            .api
            .register(RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        tracing::info!(user_id = %response.user_id, "registration started");
        Ok(response)
    }

    /// Confirms a pending registration. Verification never authenticates;
    /// the caller is expected to log in afterwards.
    pub async fn verify(&self, email: &str, code: &str) -> Result<VerificationResponse> {
        require_filled("email", email)?;
        require_filled("code", code)?;
        Ok(self
            .api
            .verify(VerificationRequest {
                email: email.to_string(),
                code: code.to_string(),
            })
            .await?)
    }

    /// Resolves the current user: in-memory cache, then the durable cache,
    /// then a profile fetch when a token exists. Never errors; any failure
    /// along the way reads as "no current user", so callers should treat
    /// absence as "offer login" rather than a hard server error.
    pub async fn current_user(&mut self) -> Option<User> {
        if let Some(user) = &self.user {
            return Some(user.clone());
        }

        if let Some(user) = self.store.cached_user().await {
            tracing::debug!(user_id = %user.id, "adopted user from durable cache");
            self.user = Some(user.clone());
            self.state = AuthState::Authenticated;
            return Some(user);
        }

        if self.token.is_none() {
            let stored = self.store.auth_token().await?;
            self.token = Some(SecretString::from(stored));
        }

        let profile = match self.api.fetch_profile().await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::warn!(%error, "profile refresh failed, reporting no current user");
                return None;
            }
        };
        let user = User::from_profile(profile)?;
        if let Err(error) = self.store.save_user(&user).await {
            // The durable write must land before the in-memory cache is
            // authoritative; hand the identity back without adopting it.
            tracing::warn!(%error, "could not persist refreshed profile");
            return Some(user);
        }
        self.user = Some(user.clone());
        self.state = AuthState::Authenticated;
        Some(user)
    }

    /// Folds a practice score into the cached user's progress, in memory
    /// only. The first completion of a level moves the construction's
    /// running average; repeating a completed level re-asserts membership
    /// and leaves the average untouched.
    ///
    /// Returns the updated user, or `None` when no user is cached.
    pub fn update_progress(
        &mut self,
        construction_id: &str,
        level_id: &str,
        score: f32,
    ) -> Option<User> {
        let user = self.user.as_mut()?;
        let progress = user
            .progress
            .entry(construction_id.to_string())
            .or_insert_with(|| ConstructionProgress::new(construction_id));

        if !progress.completed_levels.contains(level_id) {
            let completed = progress.completed_levels.len() as f32;
            progress.average_score =
                (progress.average_score * completed + score) / (completed + 1.0);
            progress.completed_levels.insert(level_id.to_string());
        }
        Some(user.clone())
    }

    /// Changes the account password. Requires a token (in memory or
    /// durable); without one the operation fails but the session itself is
    /// not invalidated.
    pub async fn change_password(
        &mut self,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordResponse> {
        let has_token = self.token.is_some() || self.store.auth_token().await.is_some();
        if !has_token {
            tracing::warn!("change-password attempted without a token");
            return Err(Error::AuthenticationRequired);
        }
        Ok(self
            .api
            .change_password(ChangePasswordRequest {
                current_password: current_password.to_string(),
                new_password: new_password.to_string(),
            })
            .await?)
    }

    /// Returns to anonymous unconditionally. Storage failures are logged
    /// and swallowed; logout itself never fails.
    pub async fn logout(&mut self) {
        self.token = None;
        self.user = None;
        self.state = AuthState::Anonymous;
        if let Err(error) = self.store.clear().await {
            tracing::warn!(%error, "failed to clear credential store on logout");
        }
        tracing::info!("logged out");
    }
}

fn require_filled(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation {
            field,
            message: "must not be blank",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockIntonationApi};
    use intona_api::{AuthResponse, UserProfile};

    fn profile(id: &str, username: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_verified: true,
        }
    }

    fn auth_response(token: &str) -> AuthResponse {
        AuthResponse {
            token: token.to_string(),
            user: profile("u1", "mira"),
        }
    }

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn login_adopts_session_and_persists_it() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login()
            .withf(|req| req.username_or_email == "mira" && req.password == "pw123456")
            .returning(|_| Ok(auth_response("tok-1")));

        let mut session = UserSession::new(api, store.clone());
        let user = session.login("mira", "pw123456").await.unwrap();

        assert_eq!(user.username, "mira");
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(store.auth_token().await, Some("tok-1".to_string()));
        assert_eq!(store.cached_user().await.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn rejected_login_surfaces_generic_invalid_credentials() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().returning(|_| {
            Err(ApiError::Status {
                code: 401,
                message: "wrong password for account".into(),
            })
        });

        let mut session = UserSession::new(api, store.clone());
        let error = session.login("mira", "pw123456").await.unwrap_err();

        assert!(matches!(error, Error::InvalidCredentials));
        assert_eq!(session.state(), AuthState::Anonymous);
        assert_eq!(store.auth_token().await, None);
    }

    #[tokio::test]
    async fn login_with_an_empty_token_is_rejected() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().returning(|_| Ok(auth_response("  ")));

        let mut session = UserSession::new(api, store);
        let error = session.login("mira", "pw123456").await.unwrap_err();
        assert!(matches!(error, Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn blank_login_fields_fail_before_any_network_call() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().never();

        let mut session = UserSession::new(api, store);
        let error = session.login("mira", "   ").await.unwrap_err();
        assert!(matches!(error, Error::Validation { field: "password", .. }));
    }

    #[tokio::test]
    async fn register_validates_locally_first() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_register().never();

        let session = UserSession::new(api, store);
        let error = session
            .register("mira", "not-an-email", "pw123456")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Validation { field: "email", .. }));

        let error = session
            .register("mira", "mira@example.com", "pw1")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Validation { field: "password", .. }));
    }

    #[tokio::test]
    async fn register_does_not_authenticate() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_register().returning(|_| {
            Ok(RegisterResponse {
                message: "verification code sent".into(),
                user_id: "u1".into(),
                verification_code: None,
            })
        });

        let session = UserSession::new(api, store);
        let response = session
            .register("mira", "mira@example.com", "pw123456")
            .await
            .unwrap();
        assert_eq!(response.user_id, "u1");
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(session.cached_user().is_none());
    }

    #[tokio::test]
    async fn current_user_prefers_the_in_memory_cache() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().returning(|_| Ok(auth_response("tok-1")));
        api.expect_fetch_profile().never();

        let mut session = UserSession::new(api, store);
        session.login("mira", "pw123456").await.unwrap();
        assert_eq!(session.current_user().await.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn current_user_adopts_the_durable_cache() {
        let (_dir, store) = store();
        store
            .save_user(&User::from_profile(profile("u1", "mira")).unwrap())
            .await
            .unwrap();
        let mut api = MockIntonationApi::new();
        api.expect_fetch_profile().never();

        let mut session = UserSession::new(api, store);
        let user = session.current_user().await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn current_user_refreshes_from_the_server_when_only_a_token_exists() {
        let (_dir, store) = store();
        store.save_token("tok-1").await.unwrap();
        let mut api = MockIntonationApi::new();
        api.expect_fetch_profile()
            .times(1)
            .returning(|| Ok(profile("u1", "mira")));

        let mut session = UserSession::new(api, store.clone());
        let user = session.current_user().await.unwrap();
        assert_eq!(user.id, "u1");
        // The refreshed profile is persisted to the durable cache.
        assert_eq!(store.cached_user().await.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn current_user_without_token_or_cache_makes_no_network_call() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_fetch_profile().never();

        let mut session = UserSession::new(api, store);
        assert!(session.current_user().await.is_none());
    }

    #[tokio::test]
    async fn failed_profile_refresh_reads_as_absent() {
        let (_dir, store) = store();
        store.save_token("tok-stale").await.unwrap();
        let mut api = MockIntonationApi::new();
        api.expect_fetch_profile().returning(|| {
            Err(ApiError::Status {
                code: 401,
                message: "token expired".into(),
            })
        });

        let mut session = UserSession::new(api, store);
        assert!(session.current_user().await.is_none());
    }

    #[tokio::test]
    async fn logout_always_yields_no_current_user() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().returning(|_| Ok(auth_response("tok-1")));
        api.expect_fetch_profile().never();

        let mut session = UserSession::new(api, store.clone());
        session.login("mira", "pw123456").await.unwrap();
        session.logout().await;

        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(session.current_user().await.is_none());
        assert_eq!(store.auth_token().await, None);
    }

    #[tokio::test]
    async fn repeated_completions_move_the_average_exactly_once() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_login().returning(|_| Ok(auth_response("tok-1")));

        let mut session = UserSession::new(api, store);
        session.login("mira", "pw123456").await.unwrap();

        let user = session.update_progress("ik1", "ik1_level1", 90.0).unwrap();
        assert_eq!(user.progress["ik1"].average_score, 90.0);

        // Same level again, different score: membership only, no averaging.
        let user = session.update_progress("ik1", "ik1_level1", 10.0).unwrap();
        assert_eq!(user.progress["ik1"].average_score, 90.0);
        assert_eq!(user.progress["ik1"].completed_levels.len(), 1);

        // A second level folds into the running mean.
        let user = session.update_progress("ik1", "ik1_level2", 70.0).unwrap();
        assert_eq!(user.progress["ik1"].average_score, 80.0);
        assert_eq!(user.progress["ik1"].completed_levels.len(), 2);
    }

    #[tokio::test]
    async fn update_progress_without_a_cached_user_is_a_no_op() {
        let (_dir, store) = store();
        let api = MockIntonationApi::new();
        let mut session = UserSession::new(api, store);
        assert!(session.update_progress("ik1", "ik1_level1", 90.0).is_none());
    }

    #[tokio::test]
    async fn change_password_requires_a_token() {
        let (_dir, store) = store();
        let mut api = MockIntonationApi::new();
        api.expect_change_password().never();

        let mut session = UserSession::new(api, store);
        let error = session.change_password("old", "new123456").await.unwrap_err();
        assert!(matches!(error, Error::AuthenticationRequired));
    }

    #[tokio::test]
    async fn change_password_delegates_when_a_durable_token_exists() {
        let (_dir, store) = store();
        store.save_token("tok-1").await.unwrap();
        let mut api = MockIntonationApi::new();
        api.expect_change_password()
            .withf(|req| req.current_password == "old" && req.new_password == "new123456")
            .returning(|_| {
                Ok(ChangePasswordResponse {
                    message: "password updated".into(),
                    success: true,
                })
            });

        let mut session = UserSession::new(api, store);
        let response = session.change_password("old", "new123456").await.unwrap();
        assert!(response.success);
    }
}
