// ============================================================================
// USER STORE (data access)
// ============================================================================
//
// All reads and writes over `users` and `accounts`.
//
// Invariants owned here:
//   - emails are lowercased on every write and every lookup
//   - a token and its expiry are always written or cleared in one statement
//   - default reads return UserSummary (no hash, no token columns); the
//     password-inclusive and token lookups are separate, named methods
//   - single-row updates are one UPDATE ... WHERE statement (atomic per row,
//     last write wins, no version check)
//   - set_oauth_flag(false) clears the flag and deletes the user's linked
//     accounts in one transaction
//
// Errors are returned as DbErr and never retried.
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;
use tracing::warn;

use crate::models::accounts;
use crate::models::users::{self, TokenHolder, TokenKind, UserRole, UserSummary};
use crate::utils::token::GeneratedToken;

pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub verification: Option<GeneratedToken>,
    pub is_oauth_user: bool,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileChanges {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn add_user(&self, new_user: NewUser, role: UserRole) -> Result<users::Model, DbErr> {
        let (token, expires) = match new_user.verification {
            Some(generated) => (Some(generated.token), Some(generated.expires_at)),
            None => (None, None),
        };

        users::ActiveModel {
            email: Set(normalize_email(&new_user.email)),
            name: Set(new_user.name),
            password_hash: Set(new_user.password_hash),
            role: Set(role),
            verified: Set(None),
            verification_token: Set(token),
            verification_token_expires: Set(expires),
            password_reset_token: Set(None),
            password_reset_token_expires: Set(None),
            is_oauth_user: Set(new_user.is_oauth_user),
            image: Set(new_user.image),
            ..Default::default()
        }
        .insert(&self.db)
        .await
    }

    pub async fn is_existing_user(&self, email: &str) -> Result<bool, DbErr> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserSummary>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .into_partial_model::<UserSummary>()
            .one(&self.db)
            .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<UserSummary>, DbErr> {
        users::Entity::find_by_id(id)
            .into_partial_model::<UserSummary>()
            .one(&self.db)
            .await
    }

    /// Full row, password hash included
    pub async fn find_with_password_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await
    }

    /// Owner of a verification / reset token, with that token's expiry
    pub async fn find_by_token(&self, kind: TokenKind, token: &str) -> Result<Option<TokenHolder>, DbErr> {
        users::Entity::find()
            .select_only()
            .column(users::Column::Id)
            .column(users::Column::Email)
            .column_as(kind.expires_column(), "expires_at")
            .filter(kind.token_column().eq(token))
            .into_model::<TokenHolder>()
            .one(&self.db)
            .await
    }

    /// Issues a new verification token; the account goes back to unverified
    pub async fn set_verification_token_by_email(
        &self,
        email: &str,
        token: &GeneratedToken,
    ) -> Result<bool, DbErr> {
        self.update_by_email(
            email,
            users::ActiveModel {
                verification_token: Set(Some(token.token.clone())),
                verification_token_expires: Set(Some(token.expires_at)),
                verified: Set(None),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_password_reset_token_by_email(
        &self,
        email: &str,
        token: &GeneratedToken,
    ) -> Result<bool, DbErr> {
        self.update_by_email(
            email,
            users::ActiveModel {
                password_reset_token: Set(Some(token.token.clone())),
                password_reset_token_expires: Set(Some(token.expires_at)),
                ..Default::default()
            },
        )
        .await
    }

    /// Marks verified now and clears the verification token pair
    pub async fn verify_user_by_email(&self, email: &str, role: UserRole) -> Result<bool, DbErr> {
        self.update_by_email(
            email,
            users::ActiveModel {
                verified: Set(Some(Utc::now())),
                verification_token: Set(None),
                verification_token_expires: Set(None),
                role: Set(role),
                ..Default::default()
            },
        )
        .await
    }

    /// Same as verify_user_by_email, and flags the account as OAuth-linked
    pub async fn verify_oauth_user(&self, email: &str, role: UserRole) -> Result<bool, DbErr> {
        self.update_by_email(
            email,
            users::ActiveModel {
                verified: Set(Some(Utc::now())),
                verification_token: Set(None),
                verification_token_expires: Set(None),
                is_oauth_user: Set(true),
                role: Set(role),
                ..Default::default()
            },
        )
        .await
    }

    /// Replaces the hash and consumes the reset token pair
    pub async fn reset_password_by_email(&self, email: &str, password_hash: String) -> Result<bool, DbErr> {
        self.update_by_email(
            email,
            users::ActiveModel {
                password_hash: Set(Some(password_hash)),
                password_reset_token: Set(None),
                password_reset_token_expires: Set(None),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn update_profile(&self, id: i32, changes: ProfileChanges) -> Result<Option<UserSummary>, DbErr> {
        self.update_by_id(
            id,
            users::ActiveModel {
                name: Set(changes.name),
                email: Set(normalize_email(&changes.email)),
                ..Default::default()
            },
        )
        .await?;

        self.find_by_id(id).await
    }

    pub async fn set_password(&self, id: i32, password_hash: String) -> Result<bool, DbErr> {
        self.update_by_id(
            id,
            users::ActiveModel {
                password_hash: Set(Some(password_hash)),
                ..Default::default()
            },
        )
        .await
    }

    /// Flips the OAuth flag. Turning it off also deletes every linked
    /// account of the user; both writes commit or roll back together.
    pub async fn set_oauth_flag(&self, id: i32, is_oauth_user: bool) -> Result<bool, DbErr> {
        let txn = self.db.begin().await?;

        let result = async {
            let updated = users::Entity::update_many()
                .set(users::ActiveModel {
                    is_oauth_user: Set(is_oauth_user),
                    ..Default::default()
                })
                .filter(users::Column::Id.eq(id))
                .exec(&txn)
                .await?;

            if !is_oauth_user {
                accounts::Entity::delete_many()
                    .filter(accounts::Column::UserId.eq(id))
                    .exec(&txn)
                    .await?;
            }

            Ok::<bool, DbErr>(updated.rows_affected > 0)
        }
        .await;

        match result {
            Ok(updated) => {
                txn.commit().await?;
                Ok(updated)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(user_id = id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<accounts::Model>, DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::Provider.eq(provider))
            .filter(accounts::Column::ProviderAccountId.eq(provider_account_id))
            .one(&self.db)
            .await
    }

    pub async fn link_account(
        &self,
        user_id: i32,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<accounts::Model, DbErr> {
        accounts::ActiveModel {
            provider: Set(provider.to_string()),
            provider_account_id: Set(provider_account_id.to_string()),
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(&self.db)
        .await
    }

    pub async fn count_accounts(&self, user_id: i32) -> Result<u64, DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .count(&self.db)
            .await
    }

    async fn update_by_email(&self, email: &str, changes: users::ActiveModel) -> Result<bool, DbErr> {
        let result = users::Entity::update_many()
            .set(changes)
            .filter(users::Column::Email.eq(normalize_email(email)))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn update_by_id(&self, id: i32, changes: users::ActiveModel) -> Result<bool, DbErr> {
        let result = users::Entity::update_many()
            .set(changes)
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
