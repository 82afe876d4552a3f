//! IMAP mailbox scanner for suspicious MIME transfer encodings
//!
//! Compiles loosely-typed search criteria (classic token lists or
//! predicate objects) into a normalized [`SearchPredicate`], then
//! scans each candidate message's MIME part tree -- with a raw-header
//! fallback -- for transfer encodings matching a configured pattern.
//! Connects over STARTTLS with self-signed certificate support.
//!
//! The scan loop is decoupled from the network behind the
//! [`MailStore`] trait; [`ImapClient`] provides the live
//! implementation.

mod client;
mod config;
mod connection;
mod criteria;
mod error;
mod folder;
mod matcher;
mod part;
mod scan;
mod store;

pub use client::ImapClient;
pub use config::ImapConfig;
pub use criteria::{CriteriaInput, HeaderValue, SearchPredicate, compile_tokens, flatten_tokens};
pub use error::{Error, Result};
pub use folder::Folder;
pub use matcher::{EncodingMatcher, extract_message_id};
pub use part::PartNode;
pub use scan::{MatchRecord, RawAttachment, ScanOptions, ScanSummary, Scanner};
pub use store::{MailStore, MessageEnvelope, MessageMeta};
