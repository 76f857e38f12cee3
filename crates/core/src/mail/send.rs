use crate::config::{MailSettings, SmtpSecurity};
use crate::domain::ticker::Ticker;
use crate::mail::compose::compose_email;
use crate::mail::error::{MailError, MailErrorKind};
use crate::report::html::ReportHtml;
use anyhow::Result;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;

#[async_trait::async_trait]
pub trait MailSender: Send + Sync {
    fn transport_name(&self) -> &'static str;

    async fn send(&self, settings: &MailSettings, message: Message) -> Result<()>;
}

/// Connects to the configured relay, authenticates when credentials are set, and sends.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailSender;

impl SmtpMailSender {
    fn transport(settings: &MailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = settings.smtp_host.as_str();
        let builder = match settings.security {
            SmtpSecurity::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| MailError::new(MailErrorKind::Transport, format!("smtp relay {host}: {e}")))?
        .port(settings.smtp_port);

        let builder = match credentials(settings)? {
            Some(creds) => builder.credentials(creds),
            None => builder,
        };
        Ok(builder.build())
    }
}

fn credentials(settings: &MailSettings) -> Result<Option<Credentials>> {
    match (&settings.username, &settings.password) {
        (Some(user), Some(pass)) => Ok(Some(Credentials::new(user.clone(), pass.clone()))),
        _ if settings.security.requires_credentials() => Err(MailError::new(
            MailErrorKind::MissingSettings,
            "EMAIL_USER and EMAIL_PASS are required for authenticated SMTP",
        )
        .into()),
        _ => Ok(None),
    }
}

#[async_trait::async_trait]
impl MailSender for SmtpMailSender {
    fn transport_name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, settings: &MailSettings, message: Message) -> Result<()> {
        let transport = Self::transport(settings)?;
        transport.send(message).await.map_err(|e| {
            MailError::new(
                MailErrorKind::Transport,
                format!("{}:{}: {e}", settings.smtp_host, settings.smtp_port),
            )
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryRequest<'a> {
    pub subject: &'a str,
    pub commentary: Option<&'a str>,
    pub report: &'a ReportHtml,
    pub tickers: &'a [Ticker],
    pub dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    Sent { attachments: usize },
    Failed { category: String, message: String },
}

impl SendStatus {
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<MailError>() {
            Some(mail) => SendStatus::Failed {
                category: mail.kind.as_str().to_string(),
                message: mail.detail.clone(),
            },
            None => SendStatus::Failed {
                category: "Error".to_string(),
                message: format!("{err:#}"),
            },
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, SendStatus::Sent { .. })
    }

    pub fn status_line(&self) -> String {
        match self {
            SendStatus::Sent { .. } => "email sent".to_string(),
            SendStatus::Failed { category, message } => format!("error: {category} - {message}"),
        }
    }
}

/// Composes and sends the report. Every failure ends up in the returned status.
pub async fn deliver_report(
    sender: &dyn MailSender,
    settings: &MailSettings,
    request: DeliveryRequest<'_>,
) -> SendStatus {
    match try_deliver(sender, settings, request).await {
        Ok(attachments) => {
            tracing::info!(
                to = settings.to.as_deref().unwrap_or_default(),
                attachments,
                transport = sender.transport_name(),
                "report email sent"
            );
            SendStatus::Sent { attachments }
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "report email failed");
            SendStatus::from_error(&err)
        }
    }
}

async fn try_deliver(
    sender: &dyn MailSender,
    settings: &MailSettings,
    request: DeliveryRequest<'_>,
) -> Result<usize> {
    let from = settings
        .require_from()
        .map_err(|e| MailError::new(MailErrorKind::MissingSettings, e.to_string()))?;
    let to = settings
        .require_to()
        .map_err(|e| MailError::new(MailErrorKind::MissingSettings, e.to_string()))?;

    let email = compose_email(
        request.subject,
        request.commentary,
        request.report,
        request.tickers,
        request.dir,
    )
    .await?;
    let attachments = email.attachments.len();
    let message = email.into_message(from, to)?;

    sender.send(settings, message).await?;
    Ok(attachments)
}
