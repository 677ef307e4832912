// Outbound email: verification links and password reset links.
//
// The orchestrator only sees the `Mailer` trait. `HttpMailer` posts to a JSON
// mail relay, `LogMailer` writes the link to the log for local development.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected the message (status={status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub kind: EmailKind,
    pub token: String,
}

impl OutgoingEmail {
    pub fn verification(to: &str, token: &str) -> Self {
        Self { to: to.to_string(), kind: EmailKind::Verification, token: token.to_string() }
    }

    pub fn password_reset(to: &str, token: &str) -> Self {
        Self { to: to.to_string(), kind: EmailKind::PasswordReset, token: token.to_string() }
    }

    pub fn subject(&self) -> &'static str {
        match self.kind {
            EmailKind::Verification => "Verify your email",
            EmailKind::PasswordReset => "Reset your password",
        }
    }

    pub fn link(&self, app_url: &str) -> String {
        let path = match self.kind {
            EmailKind::Verification => "/auth/verify-email",
            EmailKind::PasswordReset => "/auth/new-password",
        };
        format!("{}{}?token={}", app_url.trim_end_matches('/'), path, self.token)
    }

    pub fn html(&self, app_url: &str) -> String {
        let action = match self.kind {
            EmailKind::Verification => "confirm your email address",
            EmailKind::PasswordReset => "choose a new password",
        };
        let link = self.link(app_url);
        format!("<p>Click <a href=\"{link}\">here</a> to {action}.</p>")
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayMessage<'a> {
    sender: RelayAddress<'a>,
    to: Vec<RelayAddress<'a>>,
    subject: &'a str,
    html_content: String,
}

pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
    app_url: String,
}

impl HttpMailer {
    pub fn new(config: MailConfig, app_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            app_url: app_url.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = RelayMessage {
            sender: RelayAddress { email: &self.config.sender },
            to: vec![RelayAddress { email: &email.to }],
            subject: email.subject(),
            html_content: email.html(&self.app_url),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", self.config.api_key.expose_secret())
            .header("Accept", "application/json")
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(to = %email.to, kind = ?email.kind, "email sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(to = %email.to, status = status.as_u16(), "mail relay rejected message");
        Err(MailError::Rejected { status: status.as_u16(), body })
    }
}

/// Development mailer: nothing leaves the process
pub struct LogMailer {
    app_url: String,
}

impl LogMailer {
    pub fn new(app_url: &str) -> Self {
        Self { app_url: app_url.to_string() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = email.subject(),
            link = %email.link(&self.app_url),
            "email not sent (no mail relay configured)"
        );
        Ok(())
    }
}
