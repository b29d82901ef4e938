use chrono::NaiveDate;

/// Prompt text with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute both placeholders in one pass; substituted text is never
    /// scanned again.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Retrieval query for one email.
pub fn build_query(today: NaiveDate, sentiment: &str, subject: &str, body: &str) -> String {
    format!(
        "Today's date - {}\nSentiment - {sentiment}\nSubject - {subject}\nBody - {body}",
        today.format("%Y-%m-%d")
    )
}
