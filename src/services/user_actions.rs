// ============================================================================
// USER ACTIONS
// ============================================================================
//
// Every action follows the same shape:
//   1. parse + validate the raw payload (any failure -> ActionError::InvalidData)
//   2. load / mutate user state through the UserStore
//   3. issue or consume a token, send an email when needed
//   4. return an ActionResponse for expected outcomes
//
// Infrastructure failures (store, hashing, mail, session signing) are raised
// as ActionError and are never folded into the response.
//
// Steps inside one action run sequentially: no retries, no parallel I/O.
//
// ============================================================================

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{ActionError, ActionResponse};
use crate::models::dto::{AuthorizedUser, LoginSuccess, PublicUser};
use crate::models::schemas::{
    EmailPayload, LoginPayload, NewPasswordPayload, PasswordChangePayload, ProfileUpdatePayload,
    RegisterPayload, VerificationTokenPayload, from_value, validate_payload,
};
use crate::models::users::{TokenHolder, TokenKind, UserRole};
use crate::services::mailer::{Mailer, OutgoingEmail};
use crate::services::session::{
    DEFAULT_LOGIN_REDIRECT, SessionManager, SessionUser, SignInError, SignInRequest,
};
use crate::services::user_store::{NewUser, ProfileChanges, UserStore, normalize_email};
use crate::utils::password::PasswordHasher;
use crate::utils::token::{generate_token, is_live};

pub const USER_NOT_FOUND: &str = "User not found";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const TOKEN_EXPIRED: &str = "Token expired.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";
pub const STILL_NOT_VERIFIED: &str = "This user is still not verified. We have sent you a new verification email. Please follow the instructions there.";

/// Outcome of looking up a single-use token
enum Redeem {
    Owner(TokenHolder),
    Rejected(&'static str),
}

#[derive(Clone)]
pub struct UserActions {
    store: UserStore,
    hasher: PasswordHasher,
    mailer: Arc<dyn Mailer>,
}

impl UserActions {
    pub fn new(store: UserStore, hasher: PasswordHasher, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, hasher, mailer }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    /// Checks email + password. The success payload carries the user id only.
    #[instrument(skip_all)]
    pub async fn authorize(&self, credentials: Value) -> Result<ActionResponse<AuthorizedUser>, ActionError> {
        let payload: LoginPayload = validated(credentials)?;

        let Some(user) = self.store.find_with_password_by_email(&payload.email).await? else {
            return Ok(ActionResponse::fail(USER_NOT_FOUND));
        };
        let Some(stored_hash) = user.password_hash.as_deref() else {
            return Ok(ActionResponse::fail(
                "User cannot login with credentials. Use other authorization method.",
            ));
        };

        if !self.hasher.verify(&payload.password, stored_hash).await? {
            return Ok(ActionResponse::fail("Username and password do not match."));
        }

        Ok(ActionResponse::ok_with(AuthorizedUser { id: user.id }))
    }

    /// Creates an unverified user and mails the verification token.
    /// A failure after the insert leaves the user in place.
    #[instrument(skip_all)]
    pub async fn register(&self, payload: Value) -> Result<ActionResponse, ActionError> {
        let payload: RegisterPayload = validated(payload)?;
        let email = normalize_email(&payload.email);

        if self.store.is_existing_user(&email).await? {
            return Ok(ActionResponse::fail("User already exists."));
        }

        let token = generate_token(None);
        let password_hash = self.hasher.hash(&payload.password).await?;

        let user = self
            .store
            .add_user(
                NewUser {
                    email: email.clone(),
                    name: payload.name,
                    password_hash: Some(password_hash),
                    verification: Some(token.clone()),
                    ..Default::default()
                },
                UserRole::User,
            )
            .await?;
        info!(user_id = user.id, "user registered");

        self.mailer.send(&OutgoingEmail::verification(&email, &token.token)).await?;

        Ok(ActionResponse::ok())
    }

    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, payload: Value) -> Result<ActionResponse, ActionError> {
        let payload: EmailPayload = validated(payload)?;
        let email = normalize_email(&payload.email);

        if self.store.find_by_email(&email).await?.is_none() {
            return Ok(ActionResponse::fail("User with this email does not exist."));
        }

        let token = generate_token(None);
        self.store.set_password_reset_token_by_email(&email, &token).await?;
        self.mailer.send(&OutgoingEmail::password_reset(&email, &token.token)).await?;

        Ok(ActionResponse::ok())
    }

    /// Unverified users get a fresh verification email instead of a session
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        sessions: &SessionManager,
        payload: Value,
    ) -> Result<ActionResponse<LoginSuccess>, ActionError> {
        let payload: LoginPayload = validated(payload)?;
        let email = normalize_email(&payload.email);

        // 1. The user must exist and own a password
        let Some(user) = self.store.find_with_password_by_email(&email).await? else {
            return Ok(ActionResponse::fail(USER_NOT_FOUND));
        };
        if !user.has_password() {
            return Ok(ActionResponse::fail(
                "This user cannot login with password, maybe you used one of the other providers?",
            ));
        }

        // 2. Not verified yet: re-issue the verification token
        if user.verified.is_none() {
            let token = generate_token(None);
            self.store.set_verification_token_by_email(&email, &token).await?;
            self.mailer.send(&OutgoingEmail::verification(&email, &token.token)).await?;

            info!(user_id = user.id, "login refused, verification email re-sent");
            return Ok(ActionResponse::fail(STILL_NOT_VERIFIED));
        }

        // 3. Verified: open a session
        let request = SignInRequest::Credentials { email, password: payload.password };
        match sessions.sign_in(request).await {
            Ok(session) => Ok(ActionResponse::ok_with(LoginSuccess {
                token: session.token,
                expires: session.expires,
                redirect_to: DEFAULT_LOGIN_REDIRECT.to_string(),
            })),
            Err(SignInError::CredentialsSignin) => Ok(ActionResponse::fail(INVALID_CREDENTIALS)),
            Err(err) => {
                warn!(error = %err, "sign-in failed");
                Err(ActionError::SignIn(err.to_string()))
            }
        }
    }

    /// Fired when an OAuth account gets linked: the provider vouched for the
    /// email, so no token is involved.
    #[instrument(skip_all)]
    pub async fn verify_linked_account(&self, payload: Value) -> Result<ActionResponse, ActionError> {
        let payload: EmailPayload = validated(payload)?;
        self.store.verify_oauth_user(&payload.email, UserRole::User).await?;
        Ok(ActionResponse::ok())
    }

    #[instrument(skip_all)]
    pub async fn verify_by_token(&self, payload: Value) -> Result<ActionResponse, ActionError> {
        let payload: VerificationTokenPayload = validated(payload)?;

        let holder = match self.redeem(TokenKind::Verification, &payload.token).await? {
            Redeem::Owner(holder) => holder,
            Redeem::Rejected(message) => return Ok(ActionResponse::fail(message)),
        };

        self.store.verify_user_by_email(&holder.email, UserRole::User).await?;
        info!(user_id = holder.id, "email verified");

        Ok(ActionResponse::ok())
    }

    #[instrument(skip_all)]
    pub async fn reset_password_by_token(&self, payload: Value) -> Result<ActionResponse, ActionError> {
        let payload: NewPasswordPayload = validated(payload)?;

        let holder = match self.redeem(TokenKind::PasswordReset, &payload.token).await? {
            Redeem::Owner(holder) => holder,
            Redeem::Rejected(message) => return Ok(ActionResponse::fail(message)),
        };

        let password_hash = self.hasher.hash(&payload.password).await?;
        self.store.reset_password_by_email(&holder.email, password_hash).await?;
        info!(user_id = holder.id, "password reset");

        Ok(ActionResponse::ok())
    }

    #[instrument(skip_all)]
    pub async fn get_self_profile(
        &self,
        current: Option<&SessionUser>,
        email: &str,
    ) -> Result<ActionResponse<PublicUser>, ActionError> {
        let Some(current) = current else {
            return Ok(ActionResponse::unauthorized());
        };
        let payload = EmailPayload { email: email.to_string() };
        validate_payload(&payload)?;

        let Some(user) = self.store.find_with_password_by_email(&payload.email).await? else {
            return Ok(ActionResponse::fail(USER_NOT_FOUND));
        };
        if user.email != current.email {
            warn!(session_user = current.id, "profile lookup for another user");
            return Ok(ActionResponse::unauthorized_with("You cannot fetch another user's profile."));
        }

        Ok(ActionResponse::ok_with(PublicUser::from(&user)))
    }

    /// Admin lookup of any user's public profile. The role check happens
    /// before this is called.
    #[instrument(skip_all)]
    pub async fn lookup_user(&self, email: &str) -> Result<ActionResponse<PublicUser>, ActionError> {
        let payload = EmailPayload { email: email.to_string() };
        validate_payload(&payload)?;

        match self.store.find_with_password_by_email(&payload.email).await? {
            Some(user) => Ok(ActionResponse::ok_with(PublicUser::from(&user))),
            None => Ok(ActionResponse::fail(USER_NOT_FOUND)),
        }
    }

    /// Name is always updated. The email only changes for users that are not
    /// OAuth-linked, and a changed email goes back through verification.
    #[instrument(skip_all)]
    pub async fn update_self_profile(
        &self,
        current: Option<&SessionUser>,
        data: Value,
        original_email: &str,
        is_oauth_user: bool,
    ) -> Result<ActionResponse, ActionError> {
        let Some(current) = current else {
            return Ok(ActionResponse::unauthorized());
        };
        let payload: ProfileUpdatePayload = validated(data)?;

        let Some(original) = self.store.find_by_email(original_email).await? else {
            return Ok(ActionResponse::fail(USER_NOT_FOUND));
        };
        if original.email != current.email {
            return Ok(ActionResponse::unauthorized());
        }

        let requested_email = payload
            .email
            .as_deref()
            .filter(|email| !email.is_empty())
            .map(normalize_email)
            .filter(|email| *email != original.email);

        if let Some(email) = &requested_email {
            if self.store.is_existing_user(email).await? {
                return Ok(ActionResponse::fail("User with this email already exists."));
            }
        }

        let new_email = if is_oauth_user || original.is_oauth_user {
            None
        } else {
            requested_email
        };

        let changes = ProfileChanges {
            name: payload.name,
            email: new_email.clone().unwrap_or_else(|| original.email.clone()),
        };
        self.store.update_profile(original.id, changes).await?;

        if let Some(email) = new_email {
            let token = generate_token(None);
            self.store.set_verification_token_by_email(&email, &token).await?;
            self.mailer.send(&OutgoingEmail::verification(&email, &token.token)).await?;
            info!(user_id = original.id, "email changed, verification re-sent");
        }

        Ok(ActionResponse::ok())
    }

    /// Sets a first password, replaces an existing one (after checking the
    /// current one) and/or toggles the OAuth flag.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: Option<&SessionUser>,
        data: Value,
        original_email: &str,
    ) -> Result<ActionResponse<PublicUser>, ActionError> {
        let Some(current) = current else {
            return Ok(ActionResponse::unauthorized());
        };
        let payload: PasswordChangePayload = validated(data)?;

        let Some(original) = self.store.find_with_password_by_email(original_email).await? else {
            return Ok(ActionResponse::fail(
                "Original user not found. Please try again later, or contact support",
            ));
        };
        if original.email != current.email {
            return Ok(ActionResponse::unauthorized());
        }

        let mut password_set = false;
        if let Some(new_password) = payload.new_password().filter(|_| payload.passwords_match()) {
            match original.password_hash.as_deref() {
                None => {
                    let password_hash = self.hasher.hash(new_password).await?;
                    self.store.set_password(original.id, password_hash).await?;
                    password_set = true;
                }
                Some(stored_hash) => {
                    let current_password = payload.current_password.as_deref().filter(|p| !p.is_empty());
                    if let Some(current_password) = current_password {
                        if !self.hasher.verify(current_password, stored_hash).await? {
                            return Ok(ActionResponse::fail("Current password is incorrect."));
                        }
                        let password_hash = self.hasher.hash(new_password).await?;
                        self.store.set_password(original.id, password_hash).await?;
                        password_set = true;
                    }
                }
            }
        }
        if password_set {
            info!(user_id = original.id, "password changed");
        }

        if payload.is_oauth_user != original.is_oauth_user {
            self.store.set_oauth_flag(original.id, payload.is_oauth_user).await?;
            info!(user_id = original.id, is_oauth_user = payload.is_oauth_user, "oauth flag changed");
        }

        Ok(ActionResponse::ok_with(PublicUser {
            name: original.name.clone(),
            email: original.email.clone(),
            role: original.role,
            image: original.image.clone(),
            is_oauth_user: payload.is_oauth_user,
            has_password: original.has_password() || password_set,
        }))
    }

    /// Accepts the token only while `now < expiry`. Expired tokens stay stored.
    async fn redeem(&self, kind: TokenKind, token: &str) -> Result<Redeem, ActionError> {
        let Some(holder) = self.store.find_by_token(kind, token).await? else {
            return Ok(Redeem::Rejected(INVALID_TOKEN));
        };
        let expires_at = holder.expires_at.ok_or(ActionError::TokenMissing)?;

        if !is_live(expires_at, Utc::now()) {
            return Ok(Redeem::Rejected(TOKEN_EXPIRED));
        }
        Ok(Redeem::Owner(holder))
    }
}

/// Strict parse followed by schema validation
fn validated<T: DeserializeOwned + Validate>(value: Value) -> Result<T, ActionError> {
    let payload: T = from_value(value)?;
    validate_payload(&payload)?;
    Ok(payload)
}

/// Credentials payload handed to `authorize` by the session provider
pub(crate) fn credentials(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}
