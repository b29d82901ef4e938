pub mod decoders;
pub mod imap_client;
pub mod smtp;

use anyhow::Result;
use log::info;
use thiserror::Error;

use crate::config::Config;
use crate::domain::email::{Credentials, EmailRecord};
use crate::mail::imap_client::ImapClient;
use crate::mail::smtp::{SmtpSender, build_reply};

#[derive(Debug, Error)]
pub enum MailError {
    /// Handshake or authentication failure.
    #[error("connection error: {0}")]
    Connection(String),
    #[error("no message with Message-ID {0}")]
    NotFound(String),
    #[error("imap: {0}")]
    Imap(#[from] imap::Error),
    #[error("smtp: {0}")]
    Smtp(String),
    #[error("message: {0}")]
    Message(String),
}

/// Mail operations the controller needs.
pub trait MailGateway {
    fn fetch_unseen(&self, creds: &Credentials) -> Result<Vec<EmailRecord>>;

    /// Reply to the message carrying `message_id`; returns a status line.
    fn reply(&self, creds: &Credentials, message_id: &str, body: &str) -> Result<String>;
}

/// IMAP for reading, SMTP for replying.
pub struct ImapGateway {
    pub imap: ImapClient,
    pub smtp: SmtpSender,
}

impl ImapGateway {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            imap: ImapClient::new(
                cfg.imap.server.clone(),
                cfg.imap.port,
                cfg.imap.mailbox.clone(),
            ),
            smtp: SmtpSender::new(cfg.smtp.server.clone(), cfg.smtp.port),
        }
    }
}

impl MailGateway for ImapGateway {
    fn fetch_unseen(&self, creds: &Credentials) -> Result<Vec<EmailRecord>> {
        let mut session = self.imap.open(creds)?;
        let fetched = session.fetch_unseen();
        session.close();
        Ok(fetched?)
    }

    fn reply(&self, creds: &Credentials, message_id: &str, body: &str) -> Result<String> {
        let mut session = self.imap.open(creds)?;
        let original = session.find_by_message_id(message_id);
        session.close();

        let reply = build_reply(&original?, &creds.user, body)?;
        self.smtp.send(creds, &reply)?;
        info!("replied to {message_id}");
        Ok("Reply sent successfully.".to_string())
    }
}
