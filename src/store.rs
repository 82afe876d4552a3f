//! Mail retrieval boundary
//!
//! The scanner never talks to the network directly; it drives a
//! [`MailStore`], which maps a compiled predicate to an ordered
//! candidate list and serves per-candidate fetches. The live
//! implementation wraps an IMAP session; tests use in-memory stores.

use crate::criteria::SearchPredicate;
use crate::error::Result;
use crate::part::PartNode;
use serde::Serialize;

/// Envelope summary for a fetched message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageEnvelope {
    pub subject: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub message_id: Option<String>,
}

/// Structural metadata for one candidate, as returned by a fetch.
///
/// Everything beyond the identifier is optional; real servers omit
/// body structure or headers often enough that the matcher must cope.
#[derive(Debug, Clone, Default)]
pub struct MessageMeta {
    pub uid: u32,
    pub envelope: Option<MessageEnvelope>,
    pub parts: Option<PartNode>,
    pub raw_headers: Option<String>,
}

/// The mail-retrieval collaborator driven by the scan loop.
///
/// Failures from these methods are surfaced as-is; the scanner does
/// not retry them.
#[allow(async_fn_in_trait)]
pub trait MailStore {
    /// Map a predicate to an ordered list of candidate identifiers.
    async fn search(&mut self, predicate: &SearchPredicate) -> Result<Vec<u32>>;

    /// Fetch one candidate's structural metadata.
    async fn fetch_meta(&mut self, uid: u32) -> Result<MessageMeta>;

    /// Fetch one candidate's complete raw message bytes.
    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>>;
}
