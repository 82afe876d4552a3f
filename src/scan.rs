//! Scan orchestration
//!
//! Sequences search, per-candidate fetch, matching, and the early-exit
//! policy. Candidates are visited strictly in search order, one fetch
//! at a time; the only await points are the store calls.

use crate::criteria::SearchPredicate;
use crate::error::Result;
use crate::matcher::{EncodingMatcher, extract_message_id};
use crate::store::{MailStore, MessageMeta};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::{debug, info};

/// Scan configuration.
///
/// `max_results == 0` means unbounded; `progress_interval == 0`
/// disables progress notifications.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Regular expression tested against normalized encoding values.
    pub pattern: String,
    pub case_sensitive: bool,
    /// Stop at the first matching message (the default).
    pub stop_after_first: bool,
    pub max_results: usize,
    /// Emit a progress line every N scanned candidates.
    pub progress_interval: usize,
    /// Attach the raw header block to each match record.
    pub include_raw_headers: bool,
    /// Fetch the full raw message for each match and attach it
    /// base64-encoded.
    pub include_raw_message: bool,
    /// Field name the raw attachment is published under.
    pub raw_field: String,
}

impl ScanOptions {
    /// Options for `pattern` with the default policy: case-insensitive,
    /// stop after the first match, no limits, no raw payloads.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: false,
            stop_after_first: true,
            max_results: 0,
            progress_interval: 0,
            include_raw_headers: false,
            include_raw_message: false,
            raw_field: "raw".to_string(),
        }
    }
}

/// Base64 raw-message attachment on a match record.
#[derive(Debug, Clone, Serialize)]
pub struct RawAttachment {
    /// Configured output field name.
    pub field: String,
    /// Always `base64`.
    pub encoding: String,
    /// Decoded size in bytes.
    pub size: usize,
    pub data: String,
}

/// One matching message with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    pub uid: u32,
    /// Which part or header matched, and with what encoding value.
    pub anomalies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawAttachment>,
}

/// Result of one scan invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Number of matching messages (`matches.len()`).
    pub matched: usize,
    /// Size of the candidate list the search returned.
    pub total_candidates: usize,
    /// Candidates actually fetched and inspected.
    pub scanned: usize,
    /// Match records in candidate-visit order.
    pub matches: Vec<MatchRecord>,
}

/// Drives one scan: search, sequential fetch-and-match, limits.
#[derive(Debug)]
pub struct Scanner {
    options: ScanOptions,
    matcher: EncodingMatcher,
}

impl Scanner {
    /// Compile the anomaly pattern up front, before any network use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] when the pattern does
    /// not compile.
    pub fn new(options: ScanOptions) -> Result<Self> {
        let matcher = EncodingMatcher::new(&options.pattern, options.case_sensitive)?;
        Ok(Self { options, matcher })
    }

    /// Run one scan over `store` and produce its summary.
    ///
    /// # Errors
    ///
    /// Store failures are surfaced as-is and abort the scan.
    pub async fn run<S: MailStore>(
        &self,
        store: &mut S,
        predicate: &SearchPredicate,
    ) -> Result<ScanSummary> {
        let candidates = store.search(predicate).await?;
        let mut summary = ScanSummary {
            total_candidates: candidates.len(),
            ..ScanSummary::default()
        };
        info!("Search returned {} candidate(s)", summary.total_candidates);

        for uid in candidates {
            summary.scanned += 1;
            let meta = store.fetch_meta(uid).await?;
            let anomalies = self
                .matcher
                .scan(meta.parts.as_ref(), meta.raw_headers.as_deref());

            if anomalies.is_empty() {
                debug!("UID {} clean", uid);
            } else {
                let record = self.build_record(store, meta, anomalies).await?;
                summary.matches.push(record);
            }

            if self.options.progress_interval > 0
                && summary.scanned % self.options.progress_interval == 0
            {
                info!(
                    "Scanned {}/{} candidates, {} match(es)",
                    summary.scanned,
                    summary.total_candidates,
                    summary.matches.len()
                );
            }

            if self.options.stop_after_first && !summary.matches.is_empty() {
                debug!("Stopping after first match at UID {}", uid);
                break;
            }
            if self.options.max_results > 0 && summary.matches.len() >= self.options.max_results {
                debug!("Match limit of {} reached", self.options.max_results);
                break;
            }
        }

        summary.matched = summary.matches.len();
        info!(
            "Scan complete: {} match(es) in {} of {} candidate(s)",
            summary.matched, summary.scanned, summary.total_candidates
        );
        Ok(summary)
    }

    async fn build_record<S: MailStore>(
        &self,
        store: &mut S,
        meta: MessageMeta,
        anomalies: Vec<String>,
    ) -> Result<MatchRecord> {
        let envelope = meta.envelope.unwrap_or_default();
        let message_id =
            extract_message_id(envelope.message_id.as_deref(), meta.raw_headers.as_deref());

        let raw = if self.options.include_raw_message {
            let bytes = store.fetch_raw(meta.uid).await?;
            Some(RawAttachment {
                field: self.options.raw_field.clone(),
                encoding: "base64".to_string(),
                size: bytes.len(),
                data: BASE64.encode(&bytes),
            })
        } else {
            None
        };

        Ok(MatchRecord {
            uid: meta.uid,
            anomalies,
            subject: envelope.subject,
            date: envelope.date,
            from: envelope.from,
            message_id,
            raw_headers: if self.options.include_raw_headers {
                meta.raw_headers
            } else {
                None
            },
            raw,
        })
    }
}
