//! RFC 5322 (`.eml`) message loader.

use std::path::Path;

use mail_parser::{Message, MessageParser};

use projectiq_core::error::LoaderError;
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::{Document, META_DATE, META_SENDER, META_SUBJECT};

use crate::read_bytes;

/// Bodies this short are signatures or empty replies.
const MIN_BODY_CHARS: usize = 5;

pub struct EmailLoader;

impl DocumentLoader for EmailLoader {
    fn extensions(&self) -> &[&str] { &[".eml"] }

    fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let raw = read_bytes(path)?;
        let message = MessageParser::default()
            .parse(&raw)
            .ok_or_else(|| LoaderError::parse(path, "not an RFC 5322 message"))?;

        let body = body_of(&message);
        if body.chars().count() <= MIN_BODY_CHARS {
            return Ok(Vec::new());
        }
        Ok(vec![Document::new(body, path)
            .with_meta(META_SUBJECT, message.subject().unwrap_or_default())
            .with_meta(META_SENDER, sender_of(&message))
            .with_meta(META_DATE, message.date().map(|d| d.to_rfc3339()).unwrap_or_default())])
    }
}

fn body_of(message: &Message<'_>) -> String {
    if let Some(text) = message.body_text(0) {
        return text.into_owned();
    }
    message.body_html(0).map(|html| strip_html(&html)).unwrap_or_default()
}

fn sender_of(message: &Message<'_>) -> String {
    let Some(addr) = message.from().and_then(|a| a.first()) else { return String::new() };
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => format!("{name} <{address}>"),
        (Some(name), None) => name.to_string(),
        (None, Some(address)) => address.to_string(),
        (None, None) => String::new(),
    }
}

fn strip_html(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}
