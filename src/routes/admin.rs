use actix_web::{HttpResponse, get, web};

use crate::error::ActionError;
use crate::middleware::RequireAdmin;
use crate::models::dto::ProfileQuery;
use crate::routes::respond;
use crate::services::UserActions;

/// GET /admin/users?email= - any user's public profile, admins only
#[get("/users")]
pub async fn find_user(
    admin: RequireAdmin,
    query: web::Query<ProfileQuery>,
    actions: web::Data<UserActions>,
) -> Result<HttpResponse, ActionError> {
    tracing::info!(admin_id = admin.0.user().id, "admin user lookup");
    Ok(respond(actions.lookup_user(&query.email).await?))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/admin").service(find_user));
}

#[cfg(test)]
mod tests {
    use crate::models::users::UserRole;
    use crate::routes::configure_routes;
    use crate::routes::test_helpers::app_data;
    use crate::services::session::SignInRequest;
    use crate::services::test_support::{STRONG_PASSWORD, TestApp, test_app};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;

    async fn bearer(ctx: &TestApp, email: &str) -> String {
        ctx.seed_user(email, Some(STRONG_PASSWORD), true).await;
        let session = ctx
            .sessions
            .sign_in(SignInRequest::Credentials {
                email: email.to_string(),
                password: STRONG_PASSWORD.to_string(),
            })
            .await
            .unwrap();
        format!("Bearer {}", session.token)
    }

    #[actix_web::test]
    async fn test_regular_user_is_refused() {
        let ctx = test_app().await;
        let token = bearer(&ctx, "alice@b.com").await;
        let app = test::init_service(App::new().configure(app_data(&ctx)).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/admin/users?email=alice@b.com")
            .insert_header(("Authorization", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get().uri("/api/admin/users?email=alice@b.com").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_admin_can_look_up_users() {
        let ctx = test_app().await;
        let token = bearer(&ctx, "root@b.com").await;
        ctx.seed_user("bob@b.com", Some(STRONG_PASSWORD), true).await;
        // the role is re-read on every request, no new token needed
        ctx.store.verify_user_by_email("root@b.com", UserRole::Admin).await.unwrap();
        let app = test::init_service(App::new().configure(app_data(&ctx)).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/admin/users?email=bob@b.com")
            .insert_header(("Authorization", token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["email"], "bob@b.com");
        assert!(body["data"].get("passwordHash").is_none());
    }
}
