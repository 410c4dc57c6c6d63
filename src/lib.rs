//! mail2bark — watches an IMAP inbox and pushes verification codes and
//! links from incoming mail to a Bark device.

pub mod classifier;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod notifier;
pub mod poller;
