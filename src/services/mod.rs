//! Application services sitting between the HTTP handlers and the stores

pub mod complaints;
pub mod credentials;
pub mod notifications;
pub mod tokens;

pub use complaints::ComplaintService;
pub use credentials::Credentials;
pub use notifications::{LogMailer, Mailer, Notifier};
pub use tokens::TokenService;
