use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::domain::email::Credentials;
use crate::mail::MailError;
use crate::mail::decoders::header;

const REPLY_PREFIX: &str = "Re: ";

/// Build a reply to the raw RFC 822 message `original`.
///
/// The reply goes to `Reply-To` when present, otherwise to `From`.
pub fn build_reply(original: &[u8], from_user: &str, body: &str) -> Result<Message, MailError> {
    let parsed = mailparse::parse_mail(original)
        .map_err(|e| MailError::Message(format!("cannot parse original message: {e}")))?;

    let reply_to = header(&parsed, "Reply-To");
    let target = if reply_to.is_empty() {
        header(&parsed, "From")
    } else {
        reply_to
    };
    let recipients: Mailboxes = target
        .parse()
        .map_err(|e| MailError::Message(format!("bad recipient '{target}': {e}")))?;

    let sender: Mailbox = from_user
        .parse()
        .map_err(|e| MailError::Message(format!("bad sender '{from_user}': {e}")))?;

    let mut builder = Message::builder()
        .from(sender)
        .subject(reply_subject(&header(&parsed, "Subject")))
        .header(ContentType::TEXT_PLAIN);

    for to in recipients {
        builder = builder.to(to);
    }

    let message_id = header(&parsed, "Message-ID");
    if !message_id.is_empty() {
        builder = builder
            .in_reply_to(message_id.clone())
            .references(message_id);
    }

    builder
        .body(body.to_string())
        .map_err(|e| MailError::Message(e.to_string()))
}

pub fn reply_subject(subject: &str) -> String {
    let already = subject
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
    if already {
        subject.to_string()
    } else {
        format!("{REPLY_PREFIX}{subject}")
    }
}

pub struct SmtpSender {
    pub server: String,
    pub port: u16,
}

impl SmtpSender {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }

    /// Send over SMTP with a mandatory STARTTLS upgrade and password auth.
    pub fn send(&self, creds: &Credentials, message: &Message) -> Result<(), MailError> {
        let tls = TlsParameters::new(self.server.clone())
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        let mailer = SmtpTransport::relay(&self.server)
            .map_err(|e| MailError::Smtp(e.to_string()))?
            .port(self.port)
            .tls(Tls::Required(tls))
            .credentials(SmtpCredentials::new(
                creds.user.clone(),
                creds.password.clone(),
            ))
            .build();

        mailer
            .send(message)
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        info!("reply sent via {}:{}", self.server, self.port);
        Ok(())
    }
}
