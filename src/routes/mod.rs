pub mod admin;
pub mod auth;
pub mod health;
pub mod profile;

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::error::ActionResponse;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(profile::profile_routes)
            .configure(admin::admin_routes),
    );
}

/// Business outcomes are always 200, except `unauthorized` results (401)
pub(crate) fn respond<T: Serialize>(response: ActionResponse<T>) -> HttpResponse {
    if response.is_unauthorized() {
        HttpResponse::Unauthorized().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use actix_web::web;

    use crate::services::test_support::TestApp;

    /// Registers every shared service the handlers extract
    pub fn app_data(app: &TestApp) -> impl Fn(&mut web::ServiceConfig) + '_ {
        move |cfg: &mut web::ServiceConfig| {
            cfg.app_data(web::Data::new(app.store.connection().clone()))
                .app_data(web::Data::new(app.actions.clone()))
                .app_data(web::Data::new(app.sessions.clone()));
        }
    }
}
