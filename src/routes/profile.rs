use actix_web::{HttpResponse, get, post, put, web};

use crate::error::ActionError;
use crate::middleware::OptionalAuthUser;
use crate::models::dto::{PasswordChangeRequest, ProfileQuery, ProfileUpdateRequest};
use crate::routes::respond;
use crate::services::UserActions;

// Sessions are optional here: a missing or stale bearer yields
// `{ success: false, unauthorized: true }` from the action itself. A store
// failure while refreshing the session is a 500.

/// GET /profile?email= - own public profile
#[get("")]
pub async fn get_profile(
    auth: OptionalAuthUser,
    query: web::Query<ProfileQuery>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    let current = auth.user();
    Ok(respond(actions.get_self_profile(current, &query.email).await?))
}

/// PUT /profile - name / email update
#[put("")]
pub async fn update_profile(
    auth: OptionalAuthUser,
    body: web::Json<ProfileUpdateRequest>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    let current = auth.user();
    let request = body.into_inner();

    let response = actions
        .update_self_profile(current, request.data, &request.original_email, request.is_oauth_user)
        .await?;
    Ok(respond(response))
}

/// POST /profile/password - set / change password, toggle OAuth linking
#[post("/password")]
pub async fn change_password(
    auth: OptionalAuthUser,
    body: web::Json<PasswordChangeRequest>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    let current = auth.user();
    let request = body.into_inner();

    Ok(respond(
        actions.change_password(current, request.data, &request.original_email).await?,
    ))
}

pub fn profile_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/profile")
            .service(get_profile)
            .service(update_profile)
            .service(change_password),
    );
}
