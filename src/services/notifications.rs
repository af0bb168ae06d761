//! Best-effort email side effects
//!
//! Every notification runs on its own detached task. Delivery failures are
//! logged and dropped: they never reach the request that triggered them and
//! are never retried.

use crate::db::{StoreError, UserStore};
use crate::models::Complaint;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

const SIGNATURE: &str = "Thank you,\nComplaint Desk";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Outgoing mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Transport that writes each message to the log instead of sending it
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            "Outgoing mail ({} bytes)",
            body.len()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Address(String),
    /// Resolved to an address at delivery time; skipped if the user is gone.
    User(Uuid),
    /// The configured admin mailbox; skipped if none is configured.
    Admin,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

fn details(complaint: &Complaint) -> String {
    format!(
        "Title: {}\nDescription: {}\nDepartment: {}\nPriority: {}\nStatus: {}\nSubmitted At: {}",
        complaint.title,
        complaint.description,
        complaint.department,
        complaint.priority.as_str(),
        complaint.status.as_str(),
        complaint.created_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

impl Notification {
    /// Confirmation to the person who filed the complaint
    pub fn complaint_submitted(complaint: &Complaint, owner_email: &str) -> Self {
        Self {
            recipient: Recipient::Address(owner_email.to_string()),
            subject: "Complaint Submitted Successfully".to_string(),
            body: format!(
                "Hi,\n\nYour complaint has been submitted successfully. Here are the details:\n\n{}\n\nWe will get back to you shortly.\n\n{}",
                details(complaint),
                SIGNATURE
            ),
        }
    }

    pub fn new_complaint_for_admin(complaint: &Complaint) -> Self {
        Self {
            recipient: Recipient::Admin,
            subject: "New Complaint from User".to_string(),
            body: format!("{}\n\nPlease log in to review it.", details(complaint)),
        }
    }

    pub fn complaint_updated(complaint: &Complaint) -> Self {
        let response = complaint
            .public_response
            .as_deref()
            .map(|r| format!("\n\nResponse: {}", r))
            .unwrap_or_default();
        Self {
            recipient: Recipient::User(complaint.owner_id),
            subject: "Complaint Updated".to_string(),
            body: format!(
                "Hi,\n\nYour complaint has been updated. Here are the latest details:\n\n{}{}\n\nPlease log in to view more details.\n\n{}",
                details(complaint),
                response,
                SIGNATURE
            ),
        }
    }

    pub fn complaint_updated_for_admin(complaint: &Complaint, owner_username: &str) -> Self {
        Self {
            recipient: Recipient::Admin,
            subject: "Complaint Updated".to_string(),
            body: format!(
                "A complaint was edited by its owner.\n\n{}\nUser: {}\n\nPlease log in to review the updated complaint.",
                details(complaint),
                owner_username
            ),
        }
    }

    pub fn complaint_assigned(complaint: &Complaint, assignee: Uuid) -> Self {
        Self {
            recipient: Recipient::User(assignee),
            subject: "New Complaint Assigned to You".to_string(),
            body: format!(
                "Hi,\n\nA complaint has been assigned to you. Here are the details:\n\n{}\n\nPlease log in to review it.\n\n{}",
                details(complaint),
                SIGNATURE
            ),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    users: Arc<dyn UserStore>,
    admin_email: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, users: Arc<dyn UserStore>, admin_email: Option<String>) -> Self {
        Self {
            mailer,
            users,
            admin_email,
        }
    }

    /// Spawn delivery on a detached task.
    ///
    /// The handle may be dropped; it is only returned so callers can wait in tests.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.deliver(notification).await })
    }

    async fn deliver(&self, notification: Notification) {
        let to = match self.resolve(&notification.recipient).await {
            Ok(Some(to)) => to,
            Ok(None) => {
                tracing::debug!(
                    "Skipping '{}' notification: no address for {:?}",
                    notification.subject,
                    notification.recipient
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping '{}' notification: recipient lookup failed: {}",
                    notification.subject,
                    e
                );
                return;
            }
        };

        match self
            .mailer
            .send(&to, &notification.subject, &notification.body)
            .await
        {
            Ok(()) => tracing::info!("Email '{}' sent to {}", notification.subject, to),
            Err(e) => tracing::warn!("Error sending '{}' to {}: {}", notification.subject, to, e),
        }
    }

    async fn resolve(&self, recipient: &Recipient) -> Result<Option<String>, StoreError> {
        match recipient {
            Recipient::Address(address) => Ok(Some(address.clone())),
            Recipient::Admin => Ok(self.admin_email.clone()),
            Recipient::User(id) => Ok(self.users.find_by_id(*id).await?.map(|u| u.email)),
        }
    }
}
