//! IMAP mailbox access — TLS connect, UID enumeration, raw fetch, parsing.
//!
//! Thin wrapper over async-imap; the protocol itself is the library's
//! concern, and raw RFC 822 bytes are mail-parser's. Everything here is
//! driven by the single poll task.

use std::collections::HashSet;

use async_imap::Session;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mail_parser::MessageParser;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

use crate::config::MailConfig;
use crate::error::MailboxError;

/// A parsed inbound message. Read-only; discarded after classification.
#[derive(Debug, Clone)]
pub struct ParsedMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub date: Option<DateTime<Utc>>,
}

/// Long-lived IMAP session with INBOX selected.
pub struct Mailbox {
    session: Session<TlsStream<TcpStream>>,
}

impl Mailbox {
    /// Connect over TLS, log in and select INBOX.
    pub async fn connect(config: &MailConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let connector = tokio_native_tls::TlsConnector::from(native_tls::TlsConnector::new()?);
        let tls = connector.connect(&config.host, tcp).await?;

        let client = async_imap::Client::new(tls);
        let mut session = client
            .login(&config.user, config.password.expose_secret())
            .await
            .map_err(|(err, _client)| MailboxError::from(err))?;
        session.select("INBOX").await?;

        tracing::info!(host = %config.host, port = config.port, "IMAP connection established");
        Ok(Self { session })
    }

    /// All UIDs currently in the mailbox. Called once at startup to
    /// establish the seen baseline.
    pub async fn all_uids(&mut self) -> Result<HashSet<u32>, MailboxError> {
        Ok(self.session.uid_search("ALL").await?)
    }

    /// Lightweight "any updates" probe.
    pub async fn probe(&mut self) -> Result<(), MailboxError> {
        Ok(self.session.noop().await?)
    }

    /// UIDs at the tail of the mailbox, ascending, starting at `from`.
    ///
    /// Servers answer `n:*` with at least the last message even when `n` is
    /// past the end of the mailbox, so callers must deduplicate against the
    /// seen set.
    pub async fn tail_uids(&mut self, from: u32) -> Result<Vec<u32>, MailboxError> {
        let mut uids: Vec<u32> = {
            let stream = self.session.uid_fetch(format!("{from}:*"), "(UID)").await?;
            let fetches: Vec<_> = stream.try_collect().await?;
            fetches.iter().filter_map(|fetch| fetch.uid).collect()
        };
        uids.sort_unstable();
        Ok(uids)
    }

    /// Fetch and parse one message. `None` when the server returns no body
    /// or the bytes do not parse as a message.
    pub async fn fetch_message(&mut self, uid: u32) -> Result<Option<ParsedMail>, MailboxError> {
        let fetches: Vec<_> = {
            let stream = self.session.uid_fetch(uid.to_string(), "BODY[]").await?;
            stream.try_collect().await?
        };
        Ok(fetches.iter().find_map(|fetch| fetch.body()).and_then(parse_raw))
    }

    /// Log out, consuming the session. Failures are uninteresting here.
    pub async fn logout(mut self) {
        if let Err(e) = self.session.logout().await {
            tracing::debug!("IMAP logout failed: {e}");
        }
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse raw RFC 822 bytes into the fields the classifier needs.
pub fn parse_raw(raw: &[u8]) -> Option<ParsedMail> {
    let parsed = MessageParser::default().parse(raw)?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());

    let recipients = parsed
        .to()
        .map(|addr| {
            addr.iter()
                .filter_map(|a| a.address())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    let subject = parsed.subject().unwrap_or_default().to_string();
    let body = extract_text(&parsed);
    let date = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

    Some(ParsedMail {
        sender,
        recipients,
        subject,
        body,
        date,
    })
}

/// Plaintext body: the text part when present, stripped HTML as fallback,
/// empty string when the message carries neither.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags from content (basic), normalizing whitespace.
fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN_FIXTURE: &[u8] = b"From: Acme <no-reply@acme.io>\r\n\
To: Alice <alice@example.com>, bob@example.com\r\n\
Subject: Your code\r\n\
Date: Tue, 5 Aug 2025 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Your code is 482913\r\n";

    const HTML_FIXTURE: &[u8] = b"From: no-reply@acme.io\r\n\
To: alice@example.com\r\n\
Subject: Verify\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Your code is <b>482913</b></p></body></html>\r\n";

    #[test]
    fn parse_raw_plain_text() {
        let mail = parse_raw(PLAIN_FIXTURE).unwrap();
        assert_eq!(mail.sender, "no-reply@acme.io");
        assert_eq!(
            mail.recipients,
            vec!["alice@example.com".to_string(), "bob@example.com".to_string()]
        );
        assert_eq!(mail.subject, "Your code");
        assert!(mail.body.contains("482913"));
        assert!(mail.date.is_some());
    }

    #[test]
    fn parse_raw_html_only_falls_back_to_stripped_text() {
        let mail = parse_raw(HTML_FIXTURE).unwrap();
        assert!(mail.body.contains("Your code is"));
        assert!(mail.body.contains("482913"));
        assert!(!mail.body.contains('<'));
    }

    #[test]
    fn parse_raw_missing_from_yields_unknown_sender() {
        let raw = b"Subject: Hi\r\n\r\nhello\r\n";
        let mail = parse_raw(raw).unwrap();
        assert_eq!(mail.sender, "unknown");
        assert!(mail.recipients.is_empty());
        assert_eq!(mail.date, None);
    }

    // ── HTML stripping ──────────────────────────────────────────────

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_with_attributes() {
        assert_eq!(
            strip_html(r#"<a href="https://example.com">Link</a>"#),
            "Link"
        );
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }
}
