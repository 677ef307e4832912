pub mod mailer;
pub mod session;
pub mod user_actions;
pub mod user_store;

#[cfg(test)]
pub mod test_support;

pub use mailer::{HttpMailer, LogMailer, Mailer};
pub use session::SessionManager;
pub use user_actions::UserActions;
pub use user_store::UserStore;
