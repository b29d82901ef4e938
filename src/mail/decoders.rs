use log::warn;
use mailparse::{MailHeaderMap, ParsedMail};

/// First value of `name`, RFC 2047 decoded, or an empty string.
pub fn header(parsed: &ParsedMail, name: &str) -> String {
    parsed
        .headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Body text of a parsed message.
///
/// Multipart messages yield the first `text/*` part in depth-first order;
/// single-part messages yield their whole decoded payload. A part that fails
/// to decode yields an empty string.
pub fn extract_body(parsed: &ParsedMail) -> String {
    let part = if parsed.subparts.is_empty() {
        Some(parsed)
    } else {
        first_text_part(parsed)
    };

    let Some(part) = part else {
        return String::new();
    };

    match part.get_body() {
        Ok(body) if part.ctype.mimetype.eq_ignore_ascii_case("text/html") => html_to_text(&body),
        Ok(body) => body,
        Err(e) => {
            warn!("cannot decode {} body: {e}", part.ctype.mimetype);
            String::new()
        }
    }
}

fn first_text_part<'a>(p: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if p.subparts.is_empty() {
        return p
            .ctype
            .mimetype
            .to_ascii_lowercase()
            .starts_with("text/")
            .then_some(p);
    }
    p.subparts.iter().find_map(first_text_part)
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 100) {
        Ok(text) => text,
        Err(e) => {
            warn!("cannot convert html body: {e}");
            html.to_string()
        }
    }
}
