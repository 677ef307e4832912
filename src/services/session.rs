// ============================================================================
// SESSIONS
// ============================================================================
//
// Anonymous -> Authenticating -> Authenticated(session) -> Anonymous
//
// - Credentials sign-in goes through UserActions::authorize, then the
//   sign-in gate refuses users that are not verified yet.
// - OAuth sign-in trusts the provider handshake: a linked provider account
//   resolves its user, otherwise a new user is created, linked and marked
//   verified by the link event. An email that already belongs to a user is
//   refused with OAuthAccountNotLinked. The verified gate does not apply.
// - Every refresh re-reads the user, so role / flag changes show up on the
//   next request. A deleted user invalidates the token.
// - Tokens are stateless HS256 JWTs: sign-out cannot revoke a token that has
//   not expired yet.
//
// ============================================================================

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::{ActionError, ActionResponse};
use crate::models::users::{UserRole, UserSummary};
use crate::services::user_actions::{UserActions, credentials};
use crate::services::user_store::{NewUser, UserStore};
use crate::utils::jwt::{Claims, SessionKeys};

pub const DEFAULT_LOGIN_REDIRECT: &str = "/user/dashboard";
pub const SIGN_OUT_REDIRECT: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Credentials,
    OAuth,
}

/// Identity handed over by an OAuth provider after its handshake
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthProfile {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SignInRequest {
    Credentials { email: String, password: String },
    OAuth(OAuthProfile),
}

impl SignInRequest {
    pub fn provider(&self) -> ProviderKind {
        match self {
            SignInRequest::Credentials { .. } => ProviderKind::Credentials,
            SignInRequest::OAuth(_) => ProviderKind::OAuth,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("Invalid credentials.")]
    CredentialsSignin,
    #[error("Access denied.")]
    AccessDenied,
    /// The email already belongs to a user this provider account is not linked to
    #[error("OAuth account not linked.")]
    OAuthAccountNotLinked,
    #[error("sign-in lookup failed: {0}")]
    Store(#[from] DbErr),
    #[error("authorization failed: {0}")]
    Authorize(#[source] ActionError),
    #[error("session token could not be issued: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// What the rest of the app sees about the signed-in user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(rename = "isOAuthUser")]
    pub is_oauth_user: bool,
}

impl From<&Claims> for SessionUser {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name.clone(),
            email: claims.email.clone(),
            role: claims.role,
            is_oauth_user: claims.is_oauth_user,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub user: SessionUser,
}

#[derive(Clone)]
pub struct SessionManager {
    actions: UserActions,
    keys: SessionKeys,
}

impl SessionManager {
    pub fn new(actions: UserActions, keys: SessionKeys) -> Self {
        Self { actions, keys }
    }

    fn store(&self) -> &UserStore {
        self.actions.store()
    }

    #[instrument(skip_all, fields(provider = ?request.provider()))]
    pub async fn sign_in(&self, request: SignInRequest) -> Result<Session, SignInError> {
        let provider = request.provider();

        // 1. Resolve the user through the provider
        let user_id = match request {
            SignInRequest::Credentials { email, password } => {
                self.authenticate_credentials(&email, &password).await?
            }
            SignInRequest::OAuth(profile) => self.authenticate_oauth(profile).await?,
        };

        // 2. Sign-in gate
        let Some(user) = self.store().find_by_id(user_id).await? else {
            return Err(SignInError::AccessDenied);
        };
        if provider == ProviderKind::Credentials && user.verified.is_none() {
            info!(user_id, "sign-in refused, user not verified");
            return Err(SignInError::AccessDenied);
        }

        // 3. Issue the token
        let session = self.issue(&user)?;
        info!(user_id, "signed in");
        Ok(session)
    }

    async fn authenticate_credentials(&self, email: &str, password: &str) -> Result<i32, SignInError> {
        match self.actions.authorize(credentials(email, password)).await {
            Ok(ActionResponse { success: true, data: Some(user), .. }) => Ok(user.id),
            Ok(rejected) => {
                debug!(reason = ?rejected.message, "credentials rejected");
                Err(SignInError::CredentialsSignin)
            }
            Err(err) if err.is_invalid_data() => Err(SignInError::CredentialsSignin),
            Err(err) => Err(SignInError::Authorize(err)),
        }
    }

    async fn authenticate_oauth(&self, profile: OAuthProfile) -> Result<i32, SignInError> {
        let store = self.store();

        if let Some(account) = store
            .find_account(&profile.provider, &profile.provider_account_id)
            .await?
        {
            return Ok(account.user_id);
        }

        // Never attach a provider account to an existing user by email alone
        if let Some(user) = store.find_by_email(&profile.email).await? {
            warn!(user_id = user.id, provider = %profile.provider, "oauth sign-in refused, email already registered");
            return Err(SignInError::OAuthAccountNotLinked);
        }

        let new_user = NewUser {
            email: profile.email.clone(),
            name: profile.name.clone(),
            image: profile.image.clone(),
            ..Default::default()
        };
        let user_id = store.add_user(new_user, UserRole::User).await?.id;

        store
            .link_account(user_id, &profile.provider, &profile.provider_account_id)
            .await?;
        info!(user_id, provider = %profile.provider, "account linked");
        self.on_link_account(&profile.email).await;

        Ok(user_id)
    }

    /// Link event: failures are logged and never block the sign-in
    async fn on_link_account(&self, email: &str) {
        if let Err(err) = self.actions.verify_linked_account(json!({ "email": email })).await {
            warn!(error = %err, "could not verify linked user");
        }
    }

    /// Re-reads the user behind `token` and re-issues it with fresh claims.
    /// `None` means the caller must authenticate again.
    pub async fn refresh(&self, token: &str) -> Result<Option<Session>, ActionError> {
        let claims = match self.keys.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "session token rejected");
                return Ok(None);
            }
        };

        let Some(user) = self.store().find_by_id(claims.sub).await? else {
            info!(user_id = claims.sub, "session user no longer exists");
            return Ok(None);
        };

        Ok(Some(self.issue(&user)?))
    }

    /// Client-side only: the token stays valid until it expires
    pub fn sign_out(&self, session: &Session) -> &'static str {
        info!(user_id = session.user.id, "signed out");
        SIGN_OUT_REDIRECT
    }

    fn issue(&self, user: &UserSummary) -> Result<Session, jsonwebtoken::errors::Error> {
        let (token, claims) = self.keys.issue(Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_oauth_user: user.is_oauth_user,
            iat: 0,
            exp: 0,
        })?;

        Ok(Session {
            token,
            expires: claims.expires_at(),
            user: SessionUser::from(&claims),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{STRONG_PASSWORD, test_app};

    fn github(id: &str, email: &str) -> SignInRequest {
        SignInRequest::OAuth(OAuthProfile {
            provider: "github".to_string(),
            provider_account_id: id.to_string(),
            email: email.to_string(),
            name: "Octo".to_string(),
            image: Some("https://avatars.example.com/octo.png".to_string()),
        })
    }

    fn password_sign_in(email: &str, password: &str) -> SignInRequest {
        SignInRequest::Credentials { email: email.to_string(), password: password.to_string() }
    }

    #[tokio::test]
    async fn test_credentials_sign_in() {
        let app = test_app().await;
        let user = app.seed_user("a@b.com", Some(STRONG_PASSWORD), true).await;

        let session = app.sessions.sign_in(password_sign_in("a@b.com", STRONG_PASSWORD)).await.unwrap();

        assert_eq!(session.user.id, user.id);
        assert_eq!(session.user.email, "a@b.com");
        assert!(session.expires > Utc::now());
    }

    #[tokio::test]
    async fn test_credentials_sign_in_rejections() {
        let app = test_app().await;
        app.seed_user("a@b.com", Some(STRONG_PASSWORD), true).await;
        app.seed_user("pending@b.com", Some(STRONG_PASSWORD), false).await;

        let wrong = app.sessions.sign_in(password_sign_in("a@b.com", "Wrong123!")).await;
        assert!(matches!(wrong, Err(SignInError::CredentialsSignin)));

        let malformed = app.sessions.sign_in(password_sign_in("not-an-email", "x")).await;
        assert!(matches!(malformed, Err(SignInError::CredentialsSignin)));

        let unverified = app.sessions.sign_in(password_sign_in("pending@b.com", STRONG_PASSWORD)).await;
        assert!(matches!(unverified, Err(SignInError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_oauth_sign_in_creates_and_links_user() {
        let app = test_app().await;

        let session = app.sessions.sign_in(github("1", "Octo@B.com")).await.unwrap();

        let user = app.reload("octo@b.com").await;
        assert_eq!(session.user.id, user.id);
        assert!(user.verified.is_some());
        assert!(user.is_oauth_user);
        assert!(user.password_hash.is_none());
        assert_eq!(app.store.count_accounts(user.id).await.unwrap(), 1);

        // second sign-in reuses the link
        let again = app.sessions.sign_in(github("1", "octo@b.com")).await.unwrap();
        assert_eq!(again.user.id, user.id);
        assert_eq!(app.store.count_accounts(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oauth_sign_in_refuses_existing_email() {
        let app = test_app().await;
        // someone registered the address with their own password, never verified
        let squatter = app.seed_user("victim@b.com", Some("Attack3r!"), false).await;

        let oauth = app.sessions.sign_in(github("7", "Victim@b.com")).await;
        assert!(matches!(oauth, Err(SignInError::OAuthAccountNotLinked)));

        let user = app.reload("victim@b.com").await;
        assert!(user.verified.is_none());
        assert!(!user.is_oauth_user);
        assert_eq!(app.store.count_accounts(squatter.id).await.unwrap(), 0);

        let credentials = app.sessions.sign_in(password_sign_in("victim@b.com", "Attack3r!")).await;
        assert!(matches!(credentials, Err(SignInError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_oauth_sign_in_refuses_second_provider_for_same_email() {
        let app = test_app().await;
        app.sessions.sign_in(github("1", "octo@b.com")).await.unwrap();

        let google = SignInRequest::OAuth(OAuthProfile {
            provider: "google".to_string(),
            provider_account_id: "g-1".to_string(),
            email: "octo@b.com".to_string(),
            name: "Octo".to_string(),
            image: None,
        });
        assert!(matches!(
            app.sessions.sign_in(google).await,
            Err(SignInError::OAuthAccountNotLinked)
        ));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_role_changes() {
        let app = test_app().await;
        let user = app.seed_user("a@b.com", Some(STRONG_PASSWORD), true).await;
        let session = app.sessions.sign_in(password_sign_in("a@b.com", STRONG_PASSWORD)).await.unwrap();
        assert_eq!(session.user.role, UserRole::User);

        app.store.verify_user_by_email("a@b.com", UserRole::Admin).await.unwrap();

        let refreshed = app.sessions.refresh(&session.token).await.unwrap().unwrap();
        assert_eq!(refreshed.user.id, user.id);
        assert_eq!(refreshed.user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_tokens_and_deleted_users() {
        use crate::models::users;
        use sea_orm::EntityTrait;

        let app = test_app().await;
        let user = app.seed_user("a@b.com", Some(STRONG_PASSWORD), true).await;
        let session = app.sessions.sign_in(password_sign_in("a@b.com", STRONG_PASSWORD)).await.unwrap();

        assert!(app.sessions.refresh("garbage").await.unwrap().is_none());

        users::Entity::delete_by_id(user.id).exec(app.store.connection()).await.unwrap();
        assert!(app.sessions.refresh(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_redirects_home() {
        let app = test_app().await;
        app.seed_user("a@b.com", Some(STRONG_PASSWORD), true).await;
        let session = app.sessions.sign_in(password_sign_in("a@b.com", STRONG_PASSWORD)).await.unwrap();

        assert_eq!(app.sessions.sign_out(&session), SIGN_OUT_REDIRECT);
        // stateless: the token is still accepted until it expires
        assert!(app.sessions.refresh(&session.token).await.unwrap().is_some());
    }
}
