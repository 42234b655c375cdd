//! Monitor mail content, independent of the transport.

use chrono::{DateTime, Utc};
use repocrawl_core::Environment;

/// Facts about the running process included in every monitor mail.
#[derive(Debug, Clone)]
pub struct MailContext {
    pub env: Environment,
    pub host: String,
    pub sent_at: DateTime<Utc>,
}

impl MailContext {
    /// Context for "now" on this host. The host name comes from `HOSTNAME`.
    #[must_use]
    pub fn current(env: Environment) -> Self {
        Self {
            env,
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorMail {
    pub subject: String,
    pub body: String,
}

impl MonitorMail {
    #[must_use]
    pub fn render(subject: &str, context: &MailContext) -> Self {
        let body = format!(
            "{subject}\n\nenvironment: {}\nhost:        {}\ntime:        {}\n",
            context.env,
            context.host,
            context.sent_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        Self {
            subject: format!("[repocrawl/{}] {subject}", context.env),
            body,
        }
    }
}
