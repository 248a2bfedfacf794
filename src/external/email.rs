use crate::config::{EmailBackend, EmailConfig};
use crate::error::AppResult;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email - Al-Qur'an";

/// Delivers verification codes. A failed send never invalidates the code.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_code(&self, email: &str, code: &str) -> AppResult<()>;
}

pub type SharedEmailSender = Arc<dyn EmailSender>;

pub fn verification_plain_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "Assalamu Alaikum,\n\n\
         Your verification code is: {code}\n\n\
         This code will expire in {ttl_minutes} minutes.\n\n\
         If you didn't request this code, please ignore this email.\n\n\
         Best regards,\n\
         The Al-Qur'an Team\n"
    )
}

pub fn verification_html_body(code: &str, ttl_minutes: i64) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family: sans-serif;\">\
         <p>Assalamu Alaikum,</p>\
         <p>Your verification code is:</p>\
         <p style=\"font-size: 1.5rem; letter-spacing: 0.5rem; font-weight: bold;\">{code}</p>\
         <p>This code will expire in {ttl_minutes} minutes.</p>\
         <p>If you didn't request this code, please ignore this email.</p>\
         <p>Best regards,<br>The Al-Qur'an Team</p>\
         </body></html>"
    )
}

#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    ttl_minutes: i64,
}

impl SmtpEmailSender {
    pub fn new(config: &EmailConfig, ttl_minutes: i64) -> AppResult<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from: Mailbox = config.from_address.parse()?;
        log::info!(
            "SMTP email sender configured for {}:{}",
            config.host,
            config.port
        );

        Ok(Self {
            transport: builder.build(),
            from,
            ttl_minutes,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_verification_code(&self, email: &str, code: &str) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.parse()?)
            .subject(VERIFICATION_SUBJECT)
            .multipart(MultiPart::alternative_plain_html(
                verification_plain_body(code, self.ttl_minutes),
                verification_html_body(code, self.ttl_minutes),
            ))?;

        match self.transport.send(message).await {
            Ok(_) => {
                log::info!("Verification email sent: {email}");
                Ok(())
            }
            Err(e) => {
                log::error!("Verification email failed to send: {email}, Error: {e}");
                Err(e.into())
            }
        }
    }
}

/// Logs the code instead of sending it.
#[derive(Clone, Default)]
pub struct ConsoleEmailSender;

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send_verification_code(&self, email: &str, code: &str) -> AppResult<()> {
        log::info!("Verification code for {email}: {code}");
        Ok(())
    }
}

pub fn create_email_sender(config: &EmailConfig, ttl_minutes: i64) -> AppResult<SharedEmailSender> {
    match config.backend {
        EmailBackend::Smtp => Ok(Arc::new(SmtpEmailSender::new(config, ttl_minutes)?)),
        EmailBackend::Console => {
            log::warn!("Using console email backend; codes are written to the log");
            Ok(Arc::new(ConsoleEmailSender))
        }
    }
}
