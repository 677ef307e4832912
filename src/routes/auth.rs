use actix_web::{HttpResponse, get, post, web};
use serde_json::Value;

use crate::error::{ActionError, ActionResponse};
use crate::middleware::AuthUser;
use crate::routes::respond;
use crate::services::{SessionManager, UserActions};

/// POST /auth/register - create an unverified account (PUBLIC)
#[post("/register")]
pub async fn register(
    body: web::Json<Value>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    Ok(respond(actions.register(body.into_inner()).await?))
}

/// POST /auth/login - session token for a verified user (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<Value>,
    actions: web::Data<UserActions>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, ActionError> {
    Ok(respond(actions.login(sessions.get_ref(), body.into_inner()).await?))
}

/// POST /auth/logout - client drops the token (PROTECTED)
#[post("/logout")]
pub async fn logout(auth: AuthUser, sessions: web::Data<SessionManager>) -> HttpResponse {
    let redirect_to = sessions.sign_out(&auth.session);
    respond(ActionResponse::ok_with(serde_json::json!({ "redirectTo": redirect_to })))
}

/// GET /auth/session - refreshed session (PROTECTED)
#[get("/session")]
pub async fn session(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(auth.session)
}

/// POST /auth/verify-email - consume a verification token (PUBLIC)
#[post("/verify-email")]
pub async fn verify_email(
    body: web::Json<Value>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    Ok(respond(actions.verify_by_token(body.into_inner()).await?))
}

/// POST /auth/reset-password - mail a password reset token (PUBLIC)
#[post("/reset-password")]
pub async fn reset_password(
    body: web::Json<Value>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    Ok(respond(actions.request_password_reset(body.into_inner()).await?))
}

/// POST /auth/new-password - consume a reset token (PUBLIC)
#[post("/new-password")]
pub async fn new_password(
    body: web::Json<Value>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    Ok(respond(actions.reset_password_by_token(body.into_inner()).await?))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(logout)
            .service(session)
            .service(verify_email)
            .service(reset_password)
            .service(new_password),
    );
}
