use actix_web::{Error, FromRequest, HttpRequest, HttpResponse, dev::Payload, web};
use futures::future::LocalBoxFuture;

use crate::models::users::UserRole;
use crate::services::SessionManager;
use crate::services::session::{Session, SessionUser};

/// Refreshed session of the caller, extracted from `Authorization: Bearer <token>`.
/// Use `OptionalAuthUser` on routes where a session is optional.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub session: Session,
}

impl AuthUser {
    pub fn user(&self) -> &SessionUser {
        &self.session.user
    }

    /// 401 unless the refreshed session carries `role`
    pub fn require_role(&self, role: UserRole) -> Result<(), Error> {
        if self.session.user.role == role {
            Ok(())
        } else {
            tracing::info!(user_id = self.session.user.id, required = ?role, "role check refused");
            Err(unauthorized("Insufficient role"))
        }
    }
}

/// Session if the caller has a valid one. A missing or stale bearer is
/// `None`, store failures while refreshing still fail the request.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn user(&self) -> Option<&SessionUser> {
        self.0.as_ref().map(AuthUser::user)
    }
}

/// Caller holding the admin role
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

fn unauthorized(message: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message
    }));
    actix_web::error::InternalError::from_response("", response).into()
}

fn bearer_token(req: &HttpRequest) -> Result<String, Error> {
    // 1. Authorization header
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    // 2. Readable as a string
    let value = header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    // 3. "Bearer <token>"
    value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| unauthorized("Invalid Authorization format (expected: Bearer <token>)"))
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let sessions = req.app_data::<web::Data<SessionManager>>().cloned();

        Box::pin(async move {
            let token = token?;
            let sessions = session_manager(sessions)?;

            // 4. Re-read the user and re-issue the token
            match sessions.refresh(&token).await? {
                Some(session) => Ok(AuthUser { session }),
                None => Err(unauthorized("Invalid or expired session")),
            }
        })
    }
}

impl FromRequest for OptionalAuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req).ok();
        let sessions = req.app_data::<web::Data<SessionManager>>().cloned();

        Box::pin(async move {
            let Some(token) = token else {
                return Ok(OptionalAuthUser(None));
            };
            let sessions = session_manager(sessions)?;

            let session = sessions.refresh(&token).await?;
            Ok(OptionalAuthUser(session.map(|session| AuthUser { session })))
        })
    }
}

impl FromRequest for RequireAdmin {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let auth = AuthUser::from_request(req, payload);

        Box::pin(async move {
            let auth = auth.await?;
            auth.require_role(UserRole::Admin)?;
            Ok(RequireAdmin(auth))
        })
    }
}

fn session_manager(sessions: Option<web::Data<SessionManager>>) -> Result<web::Data<SessionManager>, Error> {
    sessions.ok_or_else(|| {
        tracing::error!("SessionManager missing from app data");
        actix_web::error::ErrorInternalServerError("Something went wrong")
    })
}
