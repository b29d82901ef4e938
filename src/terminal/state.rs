use crate::domain::email::{Credentials, EmailView, ReplyContext};

/// Input fields the cursor can sit in. The email itself is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    User,
    Password,
    Reply,
}

impl Focus {
    const ORDER: [Focus; 3] = [Focus::User, Focus::Password, Focus::Reply];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let n = Self::ORDER.len();
        Self::ORDER[(self.position() + n - 1) % n]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

pub struct AppState {
    pub user: String,
    pub password: String,

    pub view: EmailView,
    pub sentiment: String,
    pub score: String,
    pub reply: String,

    pub focus: Focus,
    pub popup: Option<Popup>,
    /// Label of the action currently running, drawn while it blocks.
    pub busy: Option<&'static str>,

    /// Save the password to the keyring after a successful fetch.
    pub remember_password: bool,
}

impl AppState {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            view: EmailView::empty(0),
            sentiment: String::new(),
            score: String::new(),
            reply: String::new(),
            focus: Focus::User,
            popup: None,
            busy: None,
            remember_password: false,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.trim(), self.password.clone())
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Focus::User => &mut self.user,
            Focus::Password => &mut self.password,
            Focus::Reply => &mut self.reply,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    /// Newlines only make sense in the reply.
    pub fn insert_newline(&mut self) {
        if self.focus == Focus::Reply {
            self.reply.push('\n');
        } else {
            self.focus_next();
        }
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn show_view(&mut self, view: EmailView) {
        self.view = view;
    }

    pub fn apply_reply_context(&mut self, ctx: ReplyContext) {
        self.sentiment = ctx.sentiment.label;
        self.score = format!("{:.4}", ctx.sentiment.score);
        self.reply = ctx.reply;
    }

    pub fn clear_reply(&mut self) {
        self.sentiment.clear();
        self.score.clear();
        self.reply.clear();
    }

    pub fn show_status(&mut self, message: impl Into<String>) {
        self.popup = Some(Popup {
            title: "Status".to_string(),
            message: message.into(),
            is_error: false,
        });
    }

    pub fn show_error(&mut self, err: &anyhow::Error) {
        self.popup = Some(Popup {
            title: "Error".to_string(),
            message: format!("{err:#}"),
            is_error: true,
        });
    }

    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new("", "")
    }
}
