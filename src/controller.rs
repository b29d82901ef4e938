use anyhow::{Result, anyhow};
use log::{error, info};

use crate::config::{Config, FetchMode};
use crate::domain::email::{Credentials, EmailView, ReplyContext};
use crate::mail::MailGateway;
use crate::rag::responder::ResponseGenerator;
use crate::store::repo::EmailCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Result of a reply action: status line plus what to show next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub message: String,
    pub view: EmailView,
}

pub const INVALID_INDEX: &str = "Invalid email index.";

/// Operator actions over the cache, the mailbox and the responder.
///
/// Holds no email state of its own: every action reads the cache file again.
pub struct Controller<'a> {
    cache: &'a dyn EmailCache,
    mail: &'a dyn MailGateway,
    responder: &'a dyn ResponseGenerator,
    fetch_mode: FetchMode,
    advance_after_reply: bool,
}

impl<'a> Controller<'a> {
    pub fn new(
        cache: &'a dyn EmailCache,
        mail: &'a dyn MailGateway,
        responder: &'a dyn ResponseGenerator,
    ) -> Self {
        Self {
            cache,
            mail,
            responder,
            fetch_mode: FetchMode::default(),
            advance_after_reply: false,
        }
    }

    pub fn with_session(mut self, cfg: &Config) -> Self {
        self.fetch_mode = cfg.session.fetch_mode;
        self.advance_after_reply = cfg.session.advance_after_reply;
        self
    }

    /// Fetch unseen mail and persist it to the cache.
    pub fn fetch(&self, creds: &Credentials) -> Result<String> {
        self.try_fetch(creds)
            .inspect_err(|e| error!("Error fetching and saving emails: {e:#}"))
    }

    fn try_fetch(&self, creds: &Credentials) -> Result<String> {
        let records = self.mail.fetch_unseen(creds)?;
        match self.fetch_mode {
            FetchMode::Replace => self.cache.replace_all(&records)?,
            FetchMode::Append => self.cache.append_and_persist(&records)?,
        }
        info!("saved {} fetched emails", records.len());

        let name = self
            .cache
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.cache.path().display().to_string());
        Ok(format!("Emails fetched and saved to '{name}'"))
    }

    /// First row, or the sentinel view when the cache is empty.
    pub fn load(&self) -> Result<EmailView> {
        self.view_at(0).inspect_err(|e| error!("Error loading emails: {e:#}"))
    }

    pub fn navigate(&self, direction: Direction, index: usize) -> Result<EmailView> {
        self.try_navigate(direction, index)
            .inspect_err(|e| error!("Error navigating emails: {e:#}"))
    }

    fn try_navigate(&self, direction: Direction, index: usize) -> Result<EmailView> {
        let rows = self.cache.all()?;
        let last = rows.len().saturating_sub(1);
        let target = match direction {
            Direction::Next => index.saturating_add(1).min(last),
            Direction::Prev => index.saturating_sub(1).min(last),
        };
        Ok(rows
            .get(target)
            .map(|r| EmailView::of(r, target))
            .unwrap_or_else(|| EmailView::not_available(target)))
    }

    pub fn generate(&self, body: &str, subject: &str) -> Result<ReplyContext> {
        self.responder
            .generate(body, subject)
            .inspect_err(|e| error!("Error generating response: {e:#}"))
    }

    /// Reply to the row at `index` and re-render.
    pub fn reply(&self, creds: &Credentials, index: usize, text: &str) -> Result<ReplyOutcome> {
        self.try_reply(creds, index, text)
            .inspect_err(|e| error!("Error sending reply: {e:#}"))
    }

    fn try_reply(&self, creds: &Credentials, index: usize, text: &str) -> Result<ReplyOutcome> {
        let rows = self.cache.all()?;
        let Some(row) = rows.get(index) else {
            return Ok(ReplyOutcome {
                message: INVALID_INDEX.to_string(),
                view: EmailView::empty(index),
            });
        };
        if row.message_id.trim().is_empty() {
            return Err(anyhow!("email at index {index} has no Message-ID"));
        }

        let message = self.mail.reply(creds, &row.message_id, text)?;

        let next = if self.advance_after_reply {
            (index + 1).min(rows.len() - 1)
        } else {
            index
        };
        Ok(ReplyOutcome {
            message,
            view: EmailView::of(&rows[next], next),
        })
    }

    fn view_at(&self, index: usize) -> Result<EmailView> {
        Ok(self
            .cache
            .by_index(index)?
            .map(|r| EmailView::of(&r, index))
            .unwrap_or_else(|| EmailView::not_available(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::{EmailRecord, Sentiment};
    use crate::store::xlsx::XlsxCache;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeMail {
        inbox: Vec<EmailRecord>,
        sent: RefCell<Vec<(String, String)>>,
        fail: bool,
    }

    impl MailGateway for FakeMail {
        fn fetch_unseen(&self, _creds: &Credentials) -> Result<Vec<EmailRecord>> {
            if self.fail {
                return Err(anyhow!("connection error: Login failed"));
            }
            Ok(self.inbox.clone())
        }

        fn reply(&self, _creds: &Credentials, message_id: &str, body: &str) -> Result<String> {
            self.sent
                .borrow_mut()
                .push((message_id.to_string(), body.to_string()));
            Ok("Reply sent successfully.".to_string())
        }
    }

    struct FakeResponder;

    impl ResponseGenerator for FakeResponder {
        fn generate(&self, body: &str, _subject: &str) -> Result<ReplyContext> {
            Ok(ReplyContext {
                sentiment: Sentiment {
                    label: "Neutral".to_string(),
                    score: 0.5,
                },
                reply: format!("Re: {body}"),
            })
        }
    }

    fn record(n: u32) -> EmailRecord {
        EmailRecord {
            email_id: n.to_string(),
            message_id: format!("<m{n}@example.com>"),
            from: format!("user{n}@example.com"),
            subject: format!("Subject {n}"),
            body: format!("Body {n}"),
        }
    }

    fn cache() -> (TempDir, XlsxCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = XlsxCache::new(dir.path().join("Email_Data").join("emails.xlsx"));
        (dir, cache)
    }

    fn creds() -> Credentials {
        Credentials::new("me@example.com", "secret")
    }

    #[test]
    fn fetch_saves_every_message() {
        let (_dir, cache) = cache();
        let mail = FakeMail {
            inbox: vec![record(1), record(2), record(3)],
            ..Default::default()
        };
        let c = Controller::new(&cache, &mail, &FakeResponder);

        let msg = c.fetch(&creds()).unwrap();
        assert_eq!(msg, "Emails fetched and saved to 'emails.xlsx'");

        let rows = cache.all().unwrap();
        assert_eq!(rows.len(), 3);
        let ids: Vec<_> = rows.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, ["<m1@example.com>", "<m2@example.com>", "<m3@example.com>"]);
    }

    #[test]
    fn fetch_replaces_or_appends_per_mode() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(9)]).unwrap();
        let mail = FakeMail {
            inbox: vec![record(1)],
            ..Default::default()
        };

        Controller::new(&cache, &mail, &FakeResponder)
            .fetch(&creds())
            .unwrap();
        assert_eq!(cache.all().unwrap(), vec![record(1)]);

        let mut cfg = Config::default();
        cfg.session.fetch_mode = FetchMode::Append;
        Controller::new(&cache, &mail, &FakeResponder)
            .with_session(&cfg)
            .fetch(&creds())
            .unwrap();
        assert_eq!(cache.all().unwrap(), vec![record(1), record(1)]);
    }

    #[test]
    fn failed_fetch_leaves_cache_untouched() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(1)]).unwrap();
        let mail = FakeMail {
            fail: true,
            ..Default::default()
        };
        let c = Controller::new(&cache, &mail, &FakeResponder);
        assert!(c.fetch(&creds()).is_err());
        assert_eq!(cache.all().unwrap(), vec![record(1)]);
    }

    #[test]
    fn load_on_empty_cache_is_the_sentinel() {
        let (_dir, cache) = cache();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);
        assert_eq!(c.load().unwrap(), EmailView::not_available(0));

        cache.replace_all(&[]).unwrap();
        assert_eq!(c.load().unwrap(), EmailView::not_available(0));
    }

    #[test]
    fn navigation_is_clamped_without_wraparound() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(1), record(2), record(3)]).unwrap();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);

        let v = c.load().unwrap();
        assert_eq!((v.index, v.subject.as_str()), (0, "Subject 1"));
        let v = c.navigate(Direction::Next, v.index).unwrap();
        assert_eq!(v.index, 1);
        let v = c.navigate(Direction::Next, v.index).unwrap();
        assert_eq!(v.index, 2);
        let v = c.navigate(Direction::Next, v.index).unwrap();
        assert_eq!((v.index, v.subject.as_str()), (2, "Subject 3"));

        let v = c.navigate(Direction::Prev, 0).unwrap();
        assert_eq!((v.index, v.from.as_str()), (0, "user1@example.com"));
        let v = c.navigate(Direction::Prev, 0).unwrap();
        assert_eq!(v.index, 0);
    }

    #[test]
    fn navigating_an_empty_cache_stays_on_the_sentinel() {
        let (_dir, cache) = cache();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);
        assert_eq!(
            c.navigate(Direction::Next, 0).unwrap(),
            EmailView::not_available(0)
        );
    }

    #[test]
    fn generate_delegates_to_the_responder() {
        let (_dir, cache) = cache();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);
        let ctx = c.generate("hello", "hi").unwrap();
        assert_eq!(ctx.reply, "Re: hello");
        assert_eq!(ctx.sentiment.label, "Neutral");
    }

    #[test]
    fn reply_targets_the_row_and_stays_on_it() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(1), record(2), record(3)]).unwrap();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);

        let out = c.reply(&creds(), 1, "Thanks for writing").unwrap();
        assert_eq!(out.message, "Reply sent successfully.");
        assert_eq!(out.view, EmailView::of(&record(2), 1));
        assert_eq!(
            *mail.sent.borrow(),
            vec![(
                "<m2@example.com>".to_string(),
                "Thanks for writing".to_string()
            )]
        );
    }

    #[test]
    fn reply_can_advance_to_the_next_row() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(1), record(2)]).unwrap();
        let mail = FakeMail::default();
        let mut cfg = Config::default();
        cfg.session.advance_after_reply = true;
        let c = Controller::new(&cache, &mail, &FakeResponder).with_session(&cfg);

        assert_eq!(c.reply(&creds(), 0, "ok").unwrap().view.index, 1);
        assert_eq!(c.reply(&creds(), 1, "ok").unwrap().view.index, 1);
    }

    #[test]
    fn reply_at_invalid_index_sends_nothing() {
        let (_dir, cache) = cache();
        cache.replace_all(&[record(1)]).unwrap();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);

        let out = c.reply(&creds(), 5, "hello").unwrap();
        assert_eq!(out.message, INVALID_INDEX);
        assert_eq!(out.view, EmailView::empty(5));
        assert!(mail.sent.borrow().is_empty());
    }

    #[test]
    fn reply_to_row_without_message_id_is_an_error() {
        let (_dir, cache) = cache();
        let row = EmailRecord {
            message_id: String::new(),
            ..record(1)
        };
        cache.replace_all(&[row]).unwrap();
        let mail = FakeMail::default();
        let c = Controller::new(&cache, &mail, &FakeResponder);

        assert!(c.reply(&creds(), 0, "hello").is_err());
        assert!(mail.sent.borrow().is_empty());
    }
}
