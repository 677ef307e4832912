// Response / request shapes shared by actions and routes
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::users::{Model as User, UserRole};

/// Public-safe profile: never carries the hash, only whether one exists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "isOAuthUser")]
    pub is_oauth_user: bool,
    pub has_password: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            image: user.image.clone(),
            is_oauth_user: user.is_oauth_user,
            has_password: user.has_password(),
        }
    }
}

/// `authorize` success payload: the id only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedUser {
    pub id: i32,
}

/// Returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccess {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub redirect_to: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub data: serde_json::Value,
    pub original_email: String,
    #[serde(rename = "isOAuthUser")]
    pub is_oauth_user: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub data: serde_json::Value,
    pub original_email: String,
}
