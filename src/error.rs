//! Error types for mail2bark.

/// Configuration errors. Fatal at startup — the process exits immediately.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// IMAP mailbox errors. The poll loop logs these and retries after its
/// fixed delay; nothing escalates past the loop.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),
}

/// Classifier transport errors. Parse failures are not errors — they degrade
/// to a non-verification result instead.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Push notification errors. Logged by the dispatcher, never surfaced to
/// the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bark base URL is not usable: {0}")]
    InvalidBase(String),
}
