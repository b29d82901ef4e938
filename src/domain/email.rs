use std::fmt;

/// Sequence number assigned by the IMAP server. Only valid for the session
/// that produced it.
pub type EmailId = u32;

pub const NOT_AVAILABLE: &str = "N/A";

/// One fetched email, as stored in a cache row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmailRecord {
    pub email_id: String,
    pub message_id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// What the front end shows for the email under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailView {
    pub from: String,
    pub subject: String,
    pub body: String,
    pub index: usize,
}

impl EmailView {
    pub fn of(record: &EmailRecord, index: usize) -> Self {
        Self {
            from: record.from.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            index,
        }
    }

    /// Placeholder rendered when there is no row at `index`.
    pub fn not_available(index: usize) -> Self {
        Self {
            from: NOT_AVAILABLE.to_string(),
            subject: NOT_AVAILABLE.to_string(),
            body: NOT_AVAILABLE.to_string(),
            index,
        }
    }

    pub fn empty(index: usize) -> Self {
        Self {
            from: String::new(),
            subject: String::new(),
            body: String::new(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    pub label: String,
    pub score: f32,
}

/// Output of response generation, held until the reply is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyContext {
    pub sentiment: Sentiment,
    pub reply: String,
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}
