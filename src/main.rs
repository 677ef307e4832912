use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use tracing::info;

use accounts_backend::config::AppConfig;
use accounts_backend::services::{
    HttpMailer, LogMailer, Mailer, SessionManager, UserActions, UserStore,
};
use accounts_backend::utils::jwt::SessionKeys;
use accounts_backend::utils::password::PasswordHasher;
use accounts_backend::{db, routes, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().context("failed to install tracing subscriber")?;
    let config = AppConfig::from_env().context("invalid configuration")?;

    info!("connecting to database");
    let connection = db::establish_connection(&config.database_url)
        .await
        .context("failed to connect to database")?;
    db::ensure_schema(&connection)
        .await
        .context("failed to create schema")?;

    let mailer: Arc<dyn Mailer> = match config.mail.clone() {
        Some(mail) => Arc::new(HttpMailer::new(mail, &config.app_url)),
        None => {
            info!("MAIL_API_URL not set, emails will only be logged");
            Arc::new(LogMailer::new(&config.app_url))
        }
    };

    let store = UserStore::new(connection.clone());
    let actions = UserActions::new(
        store,
        PasswordHasher::new(config.password_hash_iterations),
        mailer,
    );
    let sessions = SessionManager::new(
        actions.clone(),
        SessionKeys::new(&config.jwt_secret, config.session_max_age_secs),
    );

    let db_data = web::Data::new(connection);
    let actions_data = web::Data::new(actions);
    let sessions_data = web::Data::new(sessions);

    info!(host = %config.host, port = config.port, "starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db_data.clone())
            .app_data(actions_data.clone())
            .app_data(sessions_data.clone())
            .configure(routes::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
