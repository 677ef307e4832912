// Shared fixtures for service and route tests
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use secrecy::SecretString;

use crate::db::ensure_schema;
use crate::models::users::{self, UserRole};
use crate::services::mailer::{MailError, Mailer, OutgoingEmail};
use crate::services::session::{SessionManager, SessionUser};
use crate::services::user_actions::UserActions;
use crate::services::user_store::{NewUser, UserStore};
use crate::utils::jwt::SessionKeys;
use crate::utils::password::PasswordHasher;

pub const TEST_ITERATIONS: u32 = 1000;
pub const STRONG_PASSWORD: &str = "Abc12345!";

/// Fresh in-memory SQLite database with both tables created.
/// A single pooled connection keeps every query on the same database.
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    ensure_schema(&db).await.unwrap();
    db
}

pub async fn memory_store() -> UserStore {
    UserStore::new(memory_db().await)
}

pub fn new_user(email: &str, password_hash: Option<&str>) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash: password_hash.map(str::to_string),
        ..Default::default()
    }
}

pub fn fast_hasher() -> PasswordHasher {
    PasswordHasher::new(TEST_ITERATIONS)
}

pub fn session_keys() -> SessionKeys {
    SessionKeys::new(&SecretString::from("test-secret".to_string()), 3600)
}

/// Captures every email instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|email| email.token.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Mail relay that is always down
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        Err(MailError::Rejected { status: 503, body: "relay unavailable".to_string() })
    }
}

pub struct TestApp {
    pub store: UserStore,
    pub actions: UserActions,
    pub sessions: SessionManager,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    /// Inserts a credentials user with a real hash of `password`
    pub async fn seed_user(&self, email: &str, password: Option<&str>, verified: bool) -> users::Model {
        let hash = match password {
            Some(password) => Some(fast_hasher().hash(password).await.unwrap()),
            None => None,
        };
        let mut user = new_user(email, None);
        user.password_hash = hash;

        let user = self.store.add_user(user, UserRole::User).await.unwrap();
        if verified {
            self.store.verify_user_by_email(email, UserRole::User).await.unwrap();
        }
        self.store.find_with_password_by_email(email).await.unwrap().unwrap_or(user)
    }

    pub async fn reload(&self, email: &str) -> users::Model {
        self.store.find_with_password_by_email(email).await.unwrap().unwrap()
    }
}

pub async fn test_app() -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let (store, actions, sessions) = build(mailer.clone()).await;
    TestApp { store, actions, sessions, mailer }
}

pub async fn build(mailer: Arc<dyn Mailer>) -> (UserStore, UserActions, SessionManager) {
    let store = memory_store().await;
    let actions = UserActions::new(store.clone(), fast_hasher(), mailer);
    let sessions = SessionManager::new(actions.clone(), session_keys());
    (store, actions, sessions)
}

pub fn session_user(user: &users::Model) -> SessionUser {
    SessionUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        is_oauth_user: user.is_oauth_user,
    }
}
