// ============================================================================
// VALIDATION SCHEMAS
// ============================================================================
//
// Every action validates its payload against one of these before touching
// state. Unknown fields are rejected at deserialization, all field errors are
// collected by `validator`, and any failure aborts the action with
// ActionError::InvalidData ("Invalid data.").
//
// Note: NewPasswordPayload (forgot-password flow) only enforces min length 8,
// not the complexity rules of RegisterPayload / PasswordChangePayload.
//
// ============================================================================

use std::borrow::Cow;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::error::ActionError;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_SPECIAL_CHARS: &str = "@$!%*#?&";
pub const NAME_MAX_LENGTH: u64 = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterPayload {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[validate(length(min = 1, max = NAME_MAX_LENGTH))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailPayload {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VerificationTokenPayload {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewPasswordPayload {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// `is_oauth_user` is a "0"/"1" form flag; email is required when it is "0"
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_profile_update"))]
pub struct ProfileUpdatePayload {
    #[serde(rename = "isOAuthUser")]
    #[validate(custom(function = "validate_flag"))]
    pub is_oauth_user: String,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = NAME_MAX_LENGTH))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
#[validate(schema(function = "validate_password_change"))]
pub struct PasswordChangePayload {
    #[serde(rename = "isOAuthUser")]
    pub is_oauth_user: bool,
    #[validate(custom(function = "validate_flag"))]
    pub has_password: String,
    pub current_password: Option<String>,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl PasswordChangePayload {
    /// The new password, if one was entered
    pub fn new_password(&self) -> Option<&str> {
        non_empty(&self.password)
    }

    pub fn passwords_match(&self) -> bool {
        self.new_password().is_some() && self.password == self.confirm_password
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// min 8 chars, one lowercase, one uppercase, one digit, one of `@$!%*#?&`.
/// An empty value is left to the required-ness rules of the schema.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(error("length", "Password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(error("lowercase", "Password must contain one lowercase character"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(error("uppercase", "Password must contain one uppercase character"));
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(error("special", "Password must contain one special character"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error("digit", "Password must contain one number"));
    }
    Ok(())
}

fn validate_flag(flag: &str) -> Result<(), ValidationError> {
    match flag {
        "0" | "1" => Ok(()),
        _ => Err(error("flag", "Must be \"0\" or \"1\"")),
    }
}

/// OAuth users submit the locked email field empty
fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(error("email", "Invalid email address"))
    }
}

fn validate_profile_update(payload: &ProfileUpdatePayload) -> Result<(), ValidationError> {
    if payload.is_oauth_user == "0" && non_empty(&payload.email).is_none() {
        return Err(error("email_required", "Must enter email address"));
    }
    Ok(())
}

fn validate_password_change(payload: &PasswordChangePayload) -> Result<(), ValidationError> {
    let current_required = !payload.is_oauth_user || payload.has_password == "1";
    if current_required && non_empty(&payload.current_password).is_none() {
        return Err(error("current_password_required", "Must enter current password"));
    }

    if payload.new_password().is_some() {
        if non_empty(&payload.confirm_password).is_none() {
            return Err(error("confirm_required", "Must confirm password"));
        }
        if payload.password != payload.confirm_password {
            return Err(error("passwords_match", "Passwords must match"));
        }
    }
    Ok(())
}

/// Runs the payload's schema, collecting every field error
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ActionError> {
    payload.validate().map_err(|errors| {
        tracing::debug!(?errors, "payload failed validation");
        ActionError::InvalidData(errors)
    })
}

/// Strict deserialization of a raw JSON payload (unknown fields and wrong
/// types are rejected, nothing is coerced)
pub fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ActionError> {
    serde_json::from_value(value).map_err(ActionError::Malformed)
}
