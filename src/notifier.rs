//! Bark push notifications — fire-and-forget HTTP GETs against the relay.
//!
//! Two notification shapes: auto-copy (code in the title, `copy` query
//! parameter) and open-URL (link embedded as a path segment). A result
//! carrying both a code and a link fires both.

use async_trait::async_trait;
use url::Url;

use crate::classifier::Classification;
use crate::config::BarkConfig;
use crate::error::NotifyError;

/// Display name when the classifier could not identify a sender.
const UNKNOWN_SENDER: &str = "unknown sender";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push an auto-copy notification carrying a verification code.
    async fn push_code(&self, code: &str, sender: &str) -> Result<(), NotifyError>;

    /// Push an open-URL notification carrying a verification link.
    async fn push_link(&self, link: &str, sender: &str) -> Result<(), NotifyError>;
}

/// Forward a classification result to the notifier.
///
/// Only verification results produce pushes. Push failures are logged and
/// swallowed — there is no retry and nothing propagates to the poll loop.
pub async fn dispatch<N: Notifier + ?Sized>(notifier: &N, result: &Classification) {
    if !result.is_verification {
        return;
    }

    let sender = result.sender.as_deref().unwrap_or(UNKNOWN_SENDER);

    if let Some(code) = result.verification_code.as_deref() {
        if let Err(e) = notifier.push_code(code, sender).await {
            tracing::error!("Failed to push verification code: {e}");
        }
    }

    if let Some(link) = result.verification_link.as_deref() {
        if let Err(e) = notifier.push_link(link, sender).await {
            tracing::error!("Failed to push verification link: {e}");
        }
    }
}

// ── Bark implementation ─────────────────────────────────────────────

/// Bark client. Pushes are GETs of the form `{base}/{device_key}/{title}/{body}`,
/// with title/body/link percent-encoded as path segments.
pub struct BarkNotifier {
    client: reqwest::Client,
    base: Url,
    device_key: String,
}

impl BarkNotifier {
    /// Validates the configured base URL up front; Bark pushes are
    /// path-templated, so a URL that cannot carry segments is fatal.
    pub fn new(config: BarkConfig) -> Result<Self, NotifyError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| NotifyError::InvalidBase(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(NotifyError::InvalidBase(config.base_url));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            device_key: config.device_key,
        })
    }

    fn push_endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .expect("base URL validated in new()");
            path.pop_if_empty().push(&self.device_key);
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    fn auto_copy_url(&self, title: &str, body: &str, code: &str) -> Url {
        let mut url = self.push_endpoint(&[title, body]);
        url.query_pairs_mut()
            .append_pair("copy", code)
            .append_pair("autoCopy", "1");
        url
    }

    fn open_link_url(&self, title: &str, body: &str, link: &str) -> Url {
        self.push_endpoint(&[title, body, link])
    }

    /// Issue one push. The relay answers with a small JSON status document;
    /// it is decoded to confirm the relay replied, then discarded.
    async fn send(&self, url: Url) -> Result<(), NotifyError> {
        let response = self.client.get(url).send().await?;
        let _: serde_json::Value = response.json().await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn push_code(&self, code: &str, sender: &str) -> Result<(), NotifyError> {
        let title = format!("Verification code: {code}");
        let body = format!("Verification email from {sender}");
        tracing::info!(%sender, "Pushing auto-copy notification");
        self.send(self.auto_copy_url(&title, &body, code)).await
    }

    async fn push_link(&self, link: &str, sender: &str) -> Result<(), NotifyError> {
        let title = format!("Verification email from {sender}");
        tracing::info!(%sender, "Pushing open-url notification");
        self.send(self.open_link_url(&title, link, link)).await
    }
}

// ── Tests ───────────────────────────────────────────────────────────
