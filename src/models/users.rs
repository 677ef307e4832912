use sea_orm::FromQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UserRole {
    #[default]
    #[sea_orm(string_value = "User")]
    User,
    #[sea_orm(string_value = "Admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String, // always lowercase
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // None for OAuth-only accounts
    pub role: UserRole,
    pub verified: Option<DateTimeUtc>,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token_expires: Option<DateTimeUtc>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token_expires: Option<DateTimeUtc>,
    pub is_oauth_user: bool,
    pub image: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Default read projection: no password hash, no token columns
#[derive(Clone, Debug, PartialEq, DerivePartialModel, FromQueryResult, Serialize)]
#[sea_orm(entity = "Entity")]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub verified: Option<DateTimeUtc>,
    pub is_oauth_user: bool,
    pub image: Option<String>,
}

/// Result of a lookup by verification or reset token
#[derive(Clone, Debug, PartialEq, FromQueryResult)]
pub struct TokenHolder {
    pub id: i32,
    pub email: String,
    pub expires_at: Option<DateTimeUtc>,
}

/// Which token pair a lookup or update targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Verification,
    PasswordReset,
}

impl TokenKind {
    pub fn token_column(self) -> Column {
        match self {
            TokenKind::Verification => Column::VerificationToken,
            TokenKind::PasswordReset => Column::PasswordResetToken,
        }
    }

    pub fn expires_column(self) -> Column {
        match self {
            TokenKind::Verification => Column::VerificationTokenExpires,
            TokenKind::PasswordReset => Column::PasswordResetTokenExpires,
        }
    }
}

impl Model {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}
