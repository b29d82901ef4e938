use log::{error, info, warn};
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;

use crate::domain::email::{Credentials, EmailId, EmailRecord};
use crate::mail::MailError;
use crate::mail::decoders::{extract_body, header};

type Session = imap::Session<TlsStream<TcpStream>>;
type Client = imap::Client<TlsStream<TcpStream>>;

pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub mailbox: String,
}

impl ImapClient {
    pub fn new(server: impl Into<String>, port: u16, mailbox: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            mailbox: mailbox.into(),
        }
    }

    /// Open a TLS connection to the server (implicit SSL).
    pub fn connect(&self) -> Result<Connection, MailError> {
        let tls = TlsConnector::builder().build().map_err(|e| {
            error!("TLS setup failed: {e}");
            MailError::Connection(format!("TLS setup failed: {e}"))
        })?;
        let client = imap::connect((self.server.as_str(), self.port), self.server.as_str(), &tls)
            .map_err(|e| {
                error!("Failed to connect to IMAP server {}: {e}", self.server);
                MailError::Connection(format!("Failed to connect to IMAP server: {e}"))
            })?;
        info!("connected to {}:{}", self.server, self.port);
        Ok(Connection {
            client,
            mailbox: self.mailbox.clone(),
        })
    }

    /// Connect and authenticate in one step.
    pub fn open(&self, creds: &Credentials) -> Result<MailSession, MailError> {
        self.connect()?.login(creds)
    }
}

/// Connected but not yet authenticated.
pub struct Connection {
    client: Client,
    mailbox: String,
}

impl Connection {
    pub fn login(self, creds: &Credentials) -> Result<MailSession, MailError> {
        let session = self
            .client
            .login(&creds.user, &creds.password)
            .map_err(|(e, _client)| {
                error!("Login failed for {}: {e}", creds.user);
                MailError::Connection(format!("Login failed: {e}"))
            })?;
        info!("logged in as {}", creds.user);
        Ok(MailSession {
            session,
            mailbox: self.mailbox,
        })
    }
}

pub struct MailSession {
    session: Session,
    mailbox: String,
}

impl MailSession {
    /// Fetch every unseen message in the mailbox, oldest first.
    ///
    /// Fetching with `RFC822` marks the messages as seen on the server.
    pub fn fetch_unseen(&mut self) -> Result<Vec<EmailRecord>, MailError> {
        self.session.select(&self.mailbox)?;

        let mut seqs: Vec<EmailId> = self.session.search("UNSEEN")?.into_iter().collect();
        seqs.sort_unstable();
        info!("{} unseen messages in {}", seqs.len(), self.mailbox);

        let mut out = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let fetches = self.session.fetch(seq.to_string(), "RFC822")?;
            let Some(raw) = fetches.iter().next().and_then(|f| f.body()) else {
                warn!("message {seq} returned no body");
                out.push(EmailRecord {
                    email_id: seq.to_string(),
                    ..Default::default()
                });
                continue;
            };
            out.push(parse_record(seq, raw));
        }
        Ok(out)
    }

    /// Raw RFC 822 bytes of the message carrying `message_id`.
    ///
    /// When the header is not unique the highest sequence number wins.
    pub fn find_by_message_id(&mut self, message_id: &str) -> Result<Vec<u8>, MailError> {
        self.session.select(&self.mailbox)?;

        let matches = self.session.search(message_id_query(message_id))?;
        if matches.len() > 1 {
            warn!(
                "{} messages match Message-ID {message_id}; using the last one",
                matches.len()
            );
        }
        let seq = matches
            .into_iter()
            .max()
            .ok_or_else(|| MailError::NotFound(message_id.to_string()))?;

        let fetches = self.session.fetch(seq.to_string(), "RFC822")?;
        fetches
            .iter()
            .next()
            .and_then(|f| f.body())
            .map(|b| b.to_vec())
            .ok_or_else(|| MailError::Message(format!("message {seq} has no body")))
    }

    /// Release the session. Errors are logged, never returned.
    pub fn close(mut self) {
        if let Err(e) = self.session.close() {
            error!("Error closing mailbox: {e}");
        }
        if let Err(e) = self.session.logout() {
            error!("Error logging out: {e}");
        }
    }
}

/// `SEARCH` criteria matching the Message-ID header, as an IMAP quoted string.
fn message_id_query(message_id: &str) -> String {
    let quoted = message_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("HEADER Message-ID \"{quoted}\"")
}

/// Turn one fetched message into a cache row. Never fails: unparseable
/// messages produce a row with empty fields.
pub fn parse_record(seq: EmailId, raw: &[u8]) -> EmailRecord {
    match mailparse::parse_mail(raw) {
        Ok(parsed) => EmailRecord {
            email_id: seq.to_string(),
            message_id: header(&parsed, "Message-ID"),
            from: header(&parsed, "From"),
            subject: header(&parsed, "Subject"),
            body: extract_body(&parsed),
        },
        Err(e) => {
            warn!("cannot parse message {seq}: {e}");
            EmailRecord {
                email_id: seq.to_string(),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_record_maps_headers() {
        let raw = b"Message-ID: <abc@example.com>\r\n\
                    From: Ann <ann@example.com>\r\n\
                    Subject: =?UTF-8?Q?Order_d=C3=A9lay?=\r\n\
                    Content-Type: text/plain\r\n\r\n\
                    Where is my parcel?\r\n";
        let rec = parse_record(7, raw);
        assert_eq!(rec.email_id, "7");
        assert_eq!(rec.message_id, "<abc@example.com>");
        assert_eq!(rec.from, "Ann <ann@example.com>");
        assert_eq!(rec.subject, "Order délay");
        assert_eq!(rec.body.trim(), "Where is my parcel?");
    }

    #[test]
    fn undecodable_messages_still_yield_rows() {
        let bad_body = b"Message-ID: <b@example.com>\r\n\
                         Subject: broken\r\n\
                         Content-Transfer-Encoding: base64\r\n\r\n\
                         %%%%\r\n";
        let batch: [&[u8]; 3] = [b"Subject: ok\r\n\r\nfine", bad_body, b"\xff\xfe\x00\x01"];
        let rows: Vec<EmailRecord> = batch
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_record(i as EmailId + 1, raw))
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].body, "fine");
        assert_eq!(rows[1].message_id, "<b@example.com>");
        assert_eq!(rows[1].body, "");
        assert_eq!(rows[2].email_id, "3");
        assert_eq!(rows[2].message_id, "");
    }

    #[test]
    fn message_id_query_escapes_quoted_string() {
        assert_eq!(
            message_id_query("<a@example.com>"),
            r#"HEADER Message-ID "<a@example.com>""#
        );
        assert_eq!(
            message_id_query(r#"<a"b\c@x>"#),
            r#"HEADER Message-ID "<a\"b\\c@x>""#
        );
    }

    #[test]
    fn parse_record_keeps_row_without_message_id() {
        let rec = parse_record(3, b"Subject: hi\r\n\r\nbody");
        assert_eq!(rec.email_id, "3");
        assert_eq!(rec.message_id, "");
        assert_eq!(rec.subject, "hi");
    }
}
