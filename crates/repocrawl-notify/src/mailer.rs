//! SMTP monitor mailer via `lettre`.
//!
//! The transport and message are built on every send, so an incomplete mail
//! setup is reported by `send_monitor_mail` instead of at construction time.

use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use repocrawl_core::{Environment, MailConfig};

use crate::{MailContext, MonitorMail, MonitorNotifier, NotifyError};

const DEFAULT_SMTP_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone)]
pub struct SmtpMonitorMailer {
    config: MailConfig,
    env: Environment,
}

impl SmtpMonitorMailer {
    #[must_use]
    pub fn new(config: MailConfig, env: Environment) -> Self {
        Self { config, env }
    }

    fn mailboxes(&self) -> Result<(Mailbox, Vec<Mailbox>), NotifyError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let to = self
            .config
            .to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))
            })
            .collect::<Result<Vec<Mailbox>, _>>()?;

        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required (MONITOR_MAIL_TO)".to_string(),
            ));
        }

        Ok((from, to))
    }

    fn transport(&self, host: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let port = self.config.smtp_port.unwrap_or(DEFAULT_SMTP_PORT);

        // 465 is implicit TLS; everything else uses STARTTLS when TLS is enabled.
        let mut builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port)
        };

        if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl MonitorNotifier for SmtpMonitorMailer {
    async fn send_monitor_mail(&self, subject: &str) -> Result<(), NotifyError> {
        let host = self
            .config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SMTP_HOST is not set".to_string()))?;
        let (from, to) = self.mailboxes()?;
        let mail = MonitorMail::render(subject, &MailContext::current(self.env));

        let mut message_builder = Message::builder().from(from);
        for recipient in &to {
            message_builder = message_builder.to(recipient.clone());
        }
        let email = message_builder
            .subject(&mail.subject)
            .body(mail.body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport(host)?
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            subject = %mail.subject,
            recipients = to.len(),
            "monitor mail delivered"
        );
        Ok(())
    }
}
