pub mod mail;
pub mod mailer;

pub use mail::{MailContext, MonitorMail};
pub use mailer::SmtpMonitorMailer;

use async_trait::async_trait;

/// Errors that can occur while building or delivering a monitor mail.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Delivers operational mails ("Server startup", ...) to the monitor list.
#[async_trait]
pub trait MonitorNotifier: Send + Sync {
    async fn send_monitor_mail(&self, subject: &str) -> Result<(), NotifyError>;
}
