//! Mailbox poll loop — dedupes UIDs and drives parse → classify → notify.
//!
//! One fixed-delay tick per iteration, sequential message processing, no
//! backoff and no reconnection state machine: when an iteration errors the
//! session is dropped and the next tick re-establishes it. The seen set is
//! baselined exactly once per process, so mail that arrives during a
//! connection hiccup is still picked up, while historic mail never notifies.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::MailboxError;
use crate::mailbox::{Mailbox, ParsedMail};
use crate::notifier::{self, Notifier};

/// Seen-UID bookkeeping plus the downstream classify → notify hand-off.
/// Owned by the single poll task; no locking.
pub struct Poller<C, N> {
    seen: HashSet<u32>,
    classifier: C,
    notifier: N,
}

impl<C: Classifier, N: Notifier> Poller<C, N> {
    pub fn new(classifier: C, notifier: N) -> Self {
        Self {
            seen: HashSet::new(),
            classifier,
            notifier,
        }
    }

    /// Mark every existing message as seen so historic mail never notifies.
    pub fn observe_baseline(&mut self, uids: impl IntoIterator<Item = u32>) {
        self.seen.extend(uids);
    }

    /// First UID past everything seen so far; the tail query starts here.
    pub fn tail_start(&self) -> u32 {
        self.seen.iter().max().map_or(1, |max| max.saturating_add(1))
    }

    /// Claim a UID for processing. Returns false when it was already seen —
    /// a claimed UID is never reprocessed in this process lifetime.
    pub fn claim(&mut self, uid: u32) -> bool {
        self.seen.insert(uid)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Classify one parsed message and forward the result to the notifier.
    /// Classification transport errors are logged; nothing is retried.
    pub async fn process(&self, mail: &ParsedMail) {
        debug!(
            sender = %mail.sender,
            recipients = ?mail.recipients,
            subject = %mail.subject,
            date = ?mail.date,
            preview = %mail.body.chars().take(100).collect::<String>(),
            "Processing message"
        );

        match self.classifier.classify(&mail.subject, &mail.body).await {
            Ok(result) => {
                info!(subject = %mail.subject, outcome = %result.message, "Message classified");
                notifier::dispatch(&self.notifier, &result).await;
            }
            Err(e) => error!(subject = %mail.subject, "Classification failed: {e}"),
        }
    }
}

/// Spawn the background poll task.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling
/// after the current iteration.
pub fn spawn_poller<C, N>(
    config: Config,
    classifier: C,
    notifier: N,
) -> (JoinHandle<()>, Arc<AtomicBool>)
where
    C: Classifier + 'static,
    N: Notifier + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = tokio::spawn(async move { run(config, classifier, notifier, shutdown).await });
    (handle, flag)
}

/// The poll loop proper. Every error is logged and the next tick retries
/// after the same fixed delay.
pub async fn run<C: Classifier, N: Notifier>(
    config: Config,
    classifier: C,
    notifier: N,
    shutdown: Arc<AtomicBool>,
) {
    info!(
        host = %config.mail.host,
        interval_secs = config.poll_interval_secs,
        "Mailbox poller started"
    );

    let mut poller = Poller::new(classifier, notifier);
    let mut mailbox: Option<Mailbox> = None;
    let mut baselined = false;
    let mut tick = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        tick.tick().await;

        if shutdown.load(Ordering::Relaxed) {
            info!("Mailbox poller shutting down");
            if let Some(mb) = mailbox.take() {
                mb.logout().await;
            }
            return;
        }

        if mailbox.is_none() {
            match Mailbox::connect(&config.mail).await {
                Ok(mut mb) => {
                    if !baselined {
                        match mb.all_uids().await {
                            Ok(uids) => {
                                info!(
                                    existing = uids.len(),
                                    "Baseline established; historic mail will not be notified"
                                );
                                poller.observe_baseline(uids);
                                baselined = true;
                            }
                            Err(e) => {
                                error!("Failed to enumerate mailbox: {e}");
                                continue;
                            }
                        }
                    }
                    mailbox = Some(mb);
                }
                Err(e) => {
                    error!("IMAP connection failed: {e}");
                    continue;
                }
            }
        }

        let Some(mb) = mailbox.as_mut() else { continue };

        if let Err(e) = poll_once(mb, &mut poller).await {
            error!("Poll iteration failed: {e}");
            // Next tick reconnects; the seen set is not re-baselined.
            mailbox = None;
        }
    }
}

/// One poll iteration: probe, list tail UIDs, process each unseen message.
async fn poll_once<C: Classifier, N: Notifier>(
    mailbox: &mut Mailbox,
    poller: &mut Poller<C, N>,
) -> Result<(), MailboxError> {
    mailbox.probe().await?;

    let uids = mailbox.tail_uids(poller.tail_start()).await?;

    for uid in uids {
        if !poller.claim(uid) {
            continue;
        }

        match mailbox.fetch_message(uid).await? {
            Some(mail) => poller.process(&mail).await,
            None => debug!(uid, "Message did not parse; skipping"),
        }
    }

    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
