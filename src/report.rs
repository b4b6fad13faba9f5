use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::models::ReportEntry;

const WRAP_WIDTH: usize = 76;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Outbound channel for the daily digest.
pub trait Notifier {
    fn send(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Delivers over SMTP with STARTTLS, authenticating as the sender.
pub struct SmtpNotifier {
    host: String,
    port: u16,
    credentials: Credentials,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            credentials: Credentials::new(
                config.sender.email.to_string(),
                config.password.clone(),
            ),
        }
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let mailer = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build();

        mailer
            .send(message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub fn subject_line(count: usize, date: NaiveDate) -> String {
    format!(
        "AI Job Report: {} New Opportunities ({})",
        count,
        date.format("%Y-%m-%d")
    )
}

pub fn digest_body(entries: &[ReportEntry]) -> String {
    let strategy_wrap = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent("   Strategy: ")
        .subsequent_indent("             ");

    let mut body = String::from("Here are your tailored application kits for today:\n\n");
    for entry in entries {
        body.push_str(&format!("* {} @ {}\n", entry.title, entry.company));
        body.push_str(&textwrap::fill(&entry.reasoning, &strategy_wrap));
        body.push_str(&format!("\n   URL: {}\n\n", entry.url));
    }
    body.push_str("\nGood luck!\n- Your AI Agent\n");
    body
}

/// Builds the digest with one attachment per readable kit file. Unreadable
/// files are logged and left out; the rest of the report still goes.
pub fn build_report(
    sender: &Mailbox,
    receiver: &Mailbox,
    entries: &[ReportEntry],
    date: NaiveDate,
) -> Result<Message, NotifyError> {
    let octet_stream = ContentType::parse("application/octet-stream")
        .map_err(|e| NotifyError::Build(e.to_string()))?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(digest_body(entries)));
    for entry in entries {
        let file_name = entry
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| entry.file_path.display().to_string());

        match fs::read(&entry.file_path) {
            Ok(bytes) => {
                parts = parts.singlepart(Attachment::new(file_name).body(bytes, octet_stream.clone()));
            }
            Err(e) => {
                warn!(file = %entry.file_path.display(), error = %e, "could not attach file");
            }
        }
    }

    Message::builder()
        .from(sender.clone())
        .to(receiver.clone())
        .subject(subject_line(entries.len(), date))
        .multipart(parts)
        .map_err(|e| NotifyError::Build(e.to_string()))
}

/// Sends the digest for this run. An empty batch sends nothing and returns
/// `Ok(false)`; a transport failure is returned to the caller untouched.
pub fn send_report(
    notifier: &dyn Notifier,
    email: &EmailConfig,
    entries: &[ReportEntry],
    date: NaiveDate,
) -> Result<bool, NotifyError> {
    if entries.is_empty() {
        info!("no jobs to email today");
        return Ok(false);
    }

    info!(attachments = entries.len(), receiver = %email.receiver, "sending email report");
    let message = build_report(&email.sender, &email.receiver, entries, date)?;
    notifier.send(&message)?;
    info!("email sent");
    Ok(true)
}
