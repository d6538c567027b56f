//! SMTP delivery of the results mail
//!
//! One attempt on the primary endpoint, then a single STARTTLS retry on the
//! fallback port. Both errors are kept when the retry fails too.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use quick_xml::escape::escape;
use tracing::{error, info, warn};

use crate::error::{ExportError, Result};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const SENDER_NAME: &str = "Бот диагностики";
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (port 465).
    Implicit,
    StartTls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
}

impl SmtpEndpoint {
    /// Implicit TLS exactly when the port is 465.
    pub fn for_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: if port == 465 {
                TlsMode::Implicit
            } else {
                TlsMode::StartTls
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub fallback_port: u16,
    pub user: String,
    pub password: String,
    pub recipient: String,
}

impl MailConfig {
    pub fn primary(&self) -> SmtpEndpoint {
        SmtpEndpoint::for_port(&self.host, self.port)
    }

    pub fn fallback(&self) -> SmtpEndpoint {
        SmtpEndpoint {
            host: self.host.clone(),
            port: self.fallback_port,
            tls: TlsMode::StartTls,
        }
    }
}

/// Hands a finished message to an SMTP endpoint.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, endpoint: &SmtpEndpoint, message: Message) -> anyhow::Result<()>;
}

/// lettre-backed transport. A new connection is opened per delivery.
pub struct SmtpTransport {
    credentials: Credentials,
}

impl SmtpTransport {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(user.into(), password.into()),
        }
    }

    fn build(&self, endpoint: &SmtpEndpoint) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match endpoint.tls {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host)?
            }
        };
        Ok(builder
            .port(endpoint.port)
            .credentials(self.credentials.clone())
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, endpoint: &SmtpEndpoint, message: Message) -> anyhow::Result<()> {
        let transport = self.build(endpoint)?;
        let response = transport.send(message).await?;
        info!(
            host = %endpoint.host,
            port = endpoint.port,
            code = %response.code(),
            "Mail accepted by SMTP server"
        );
        Ok(())
    }
}

/// `<branch with non-alphanumerics replaced by _>_<epoch ms>.xlsx`
pub fn attachment_name(branch_label: &str, sent_at: DateTime<Utc>) -> String {
    let sanitized: String = branch_label
        .chars()
        .map(|c| {
            let keep = c.is_ascii_alphanumeric()
                || ('а'..='я').contains(&c)
                || ('А'..='Я').contains(&c);
            if keep {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.xlsx", sanitized, sent_at.timestamp_millis())
}

pub struct Mailer {
    config: MailConfig,
    transport: Arc<dyn MailTransport>,
}

impl Mailer {
    pub fn new(config: MailConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    /// SMTP transport built from the configured credentials.
    pub fn smtp(config: MailConfig) -> Self {
        let transport = Arc::new(SmtpTransport::new(&config.user, &config.password));
        Self::new(config, transport)
    }

    pub fn build_message(&self, branch_label: &str, spreadsheet: Vec<u8>) -> Result<Message> {
        let now = Utc::now();
        let local = now.with_timezone(&Local).format("%d.%m.%Y, %H:%M:%S");

        let from = Mailbox::new(Some(SENDER_NAME.to_string()), self.config.user.parse()?);
        let to: Mailbox = self.config.recipient.parse()?;

        let text = format!(
            "Пользователь прошел диагностику по ветке: {}\n\nВо вложении находится файл с подробными ответами.",
            branch_label
        );
        let html = html_body(branch_label, &local.to_string());

        let content_type =
            ContentType::parse(XLSX_CONTENT_TYPE).map_err(|e| ExportError::Build(e.to_string()))?;
        let attachment =
            Attachment::new(attachment_name(branch_label, now)).body(spreadsheet, content_type);

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Ответы пользователя | {}", branch_label))
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(text, html))
                    .singlepart(attachment),
            )?)
    }

    pub async fn send(&self, message: Message) -> Result<()> {
        let primary = self.config.primary();
        let primary_err = match self.transport.deliver(&primary, message.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let fallback = self.config.fallback();
        warn!(
            port = primary.port,
            fallback_port = fallback.port,
            "Primary SMTP send failed, retrying with STARTTLS: {:#}",
            primary_err
        );

        match self.transport.deliver(&fallback, message).await {
            Ok(()) => Ok(()),
            Err(fallback_err) => {
                error!("Fallback SMTP send failed: {:#}", fallback_err);
                Err(ExportError::Mail {
                    primary: format!("{:#}", primary_err),
                    fallback: format!("{:#}", fallback_err),
                })
            }
        }
    }
}

fn html_body(branch_label: &str, sent_at: &str) -> String {
    format!(
        "<h3>Новые результаты диагностики</h3>\
         <p><strong>Ветка:</strong> {}</p>\
         <p><strong>Дата:</strong> {}</p>\
         <p>Во вложении находится файл Excel с подробными ответами пользователя.</p>",
        escape(branch_label),
        sent_at
    )
}
