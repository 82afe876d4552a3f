//! Encoding anomaly matching
//!
//! Finds MIME parts whose transfer encoding matches a configured
//! pattern. The primary pass walks the message's part tree; when the
//! server reported no usable body structure, a fallback pass scans the
//! raw header block for `Content-Transfer-Encoding` values instead --
//! structure metadata is sometimes absent while the transport header
//! is still present and diagnostic.

use crate::error::{Error, Result};
use crate::part::PartNode;
use regex::{Regex, RegexBuilder};
use std::collections::{HashSet, VecDeque};

/// Line-anchored scan for the transport encoding header, applied to
/// unfolded header text.
const ENCODING_HEADER_PATTERN: &str = r"(?mi)^content-transfer-encoding:[ \t]*(.+)$";

const MESSAGE_ID_PATTERN: &str = r"(?mi)^message-id:[ \t]*(.+)$";

/// A compiled anomaly pattern plus the fixed header-scan pattern.
#[derive(Debug)]
pub struct EncodingMatcher {
    pattern: Regex,
    header_pattern: Regex,
}

impl EncodingMatcher {
    /// Compile the anomaly pattern. Matching is case-insensitive
    /// unless `case_sensitive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] with the offending pattern
    /// text when it does not compile.
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        let header_pattern =
            Regex::new(ENCODING_HEADER_PATTERN).map_err(|source| Error::InvalidPattern {
                pattern: ENCODING_HEADER_PATTERN.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: compiled,
            header_pattern,
        })
    }

    /// Collect a provenance string for every part whose encoding
    /// matches, falling back to the raw header block only when the
    /// tree yields nothing. The result is de-duplicated, keeping
    /// first-appearance order; an empty list means no anomaly.
    #[must_use]
    pub fn scan(&self, root: Option<&PartNode>, raw_headers: Option<&str>) -> Vec<String> {
        let mut found = self.scan_tree(root);
        if found.is_empty() {
            if let Some(headers) = raw_headers {
                found = self.scan_headers(headers);
            }
        }
        dedup_ordered(found)
    }

    fn scan_tree(&self, root: Option<&PartNode>) -> Vec<String> {
        let mut found = Vec::new();
        let mut queue: VecDeque<&PartNode> = VecDeque::new();
        if let Some(node) = root {
            queue.push_back(node);
        }
        while let Some(node) = queue.pop_front() {
            if let Some(encoding) = node.encoding.as_deref() {
                let normalized = collapse_whitespace(encoding);
                if self.pattern.is_match(&normalized) {
                    found.push(format!("{}: {normalized}", describe(node)));
                }
            }
            // every child is visited even when the parent matched;
            // multiple parts may carry independent anomalies
            queue.extend(node.children.iter());
        }
        found
    }

    fn scan_headers(&self, raw: &str) -> Vec<String> {
        let unfolded = unfold(raw);
        self.header_pattern
            .captures_iter(&unfolded)
            .filter_map(|captures| captures.get(1))
            .filter_map(|value| {
                let normalized = collapse_whitespace(value.as_str());
                self.pattern
                    .is_match(&normalized)
                    .then(|| format!("headers: {normalized}"))
            })
            .collect()
    }
}

/// Canonical message identifier for a fetched message.
///
/// Prefers the envelope's identifier; otherwise extracts the first
/// `Message-ID:` value from the unfolded raw headers. Absence is not
/// an error.
#[must_use]
pub fn extract_message_id(envelope_id: Option<&str>, raw_headers: Option<&str>) -> Option<String> {
    if let Some(id) = envelope_id {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    let unfolded = unfold(raw_headers?);
    let pattern = Regex::new(MESSAGE_ID_PATTERN).ok()?;
    pattern
        .captures(&unfolded)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim().to_string())
}

/// Structural descriptor for a part: its labels space-joined, or the
/// literal `message` when it has none.
fn describe(node: &PartNode) -> String {
    let mut labels: Vec<String> = Vec::new();
    if let Some(ty) = node.content_type.as_deref() {
        labels.push(ty.to_string());
    }
    if let Some(section) = node.section.as_deref() {
        labels.push(format!("part {section}"));
    }
    if let Some(disposition) = node.disposition.as_deref() {
        labels.push(disposition.to_string());
    }
    if labels.is_empty() {
        "message".to_string()
    } else {
        labels.join(" ")
    }
}

/// Collapse internal whitespace runs to single spaces and trim.
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse RFC 2822 continuation lines: a line break followed by
/// leading whitespace folds into a single space.
fn unfold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            let rest = line.trim_start_matches([' ', '\t']);
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(rest);
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out
}

fn dedup_ordered(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
