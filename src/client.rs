//! IMAP-backed scanning client
//!
//! [`ImapClient`] owns the connection configuration and opens one
//! session per operation. The live session is wrapped in a
//! [`SessionStore`] implementing [`MailStore`], so the scan loop
//! itself never sees the protocol; this module also converts the
//! server's `ENVELOPE` and `BODYSTRUCTURE` fetch items into the
//! crate's own types.

use crate::config::ImapConfig;
use crate::connection::{ImapSession, connect, select};
use crate::criteria::{CriteriaInput, SearchPredicate};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::part::PartNode;
use crate::scan::{ScanOptions, ScanSummary, Scanner};
use crate::store::{MailStore, MessageEnvelope, MessageMeta};
use async_imap::imap_proto::{
    Address, BodyContentCommon, BodyContentSinglePart, BodyStructure, ContentEncoding, Envelope,
};
use futures::StreamExt;
use tracing::{debug, warn};

/// Fetch item set for the structural pass.
const META_ITEMS: &str = "(UID ENVELOPE BODYSTRUCTURE BODY.PEEK[HEADER])";
/// Fetch item set for the optional raw-message pass.
const RAW_ITEMS: &str = "(UID BODY.PEEK[])";

/// Read-only scanning client for one IMAP account.
pub struct ImapClient {
    config: ImapConfig,
}

impl ImapClient {
    #[must_use]
    pub const fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    /// Scan `folder` for messages matching `criteria` whose MIME
    /// transfer encoding matches the configured pattern.
    ///
    /// Criteria compilation and pattern compilation both happen before
    /// the connection attempt, so input errors never cost a session.
    /// The session is logged out on every exit path; a logout failure
    /// is reported but never masks the scan result.
    ///
    /// # Errors
    ///
    /// Returns criteria/pattern errors, or any connection, SELECT,
    /// SEARCH, or FETCH failure.
    pub async fn scan(
        &self,
        folder: &Folder,
        criteria: &CriteriaInput,
        options: ScanOptions,
    ) -> Result<ScanSummary> {
        let predicate = criteria.compile()?;
        let scanner = Scanner::new(options)?;

        let session = connect(&self.config).await?;
        let mut store = SessionStore { session };

        let result = run_scan(&mut store, folder, &scanner, &predicate).await;

        if let Err(e) = store.session.logout().await {
            warn!("Logout failed: {e}");
        }
        result
    }

    /// List all available IMAP folders
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or LIST command fails.
    pub async fn list_folders(&self) -> Result<Vec<String>> {
        let mut session = connect(&self.config).await?;

        let mut folder_stream = session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?;

        let mut names = Vec::new();
        while let Some(item) = folder_stream.next().await {
            if let Ok(name) = item {
                names.push(name.name().to_string());
            }
        }
        drop(folder_stream);

        if let Err(e) = session.logout().await {
            warn!("Logout failed: {e}");
        }
        Ok(names)
    }
}

async fn run_scan(
    store: &mut SessionStore,
    folder: &Folder,
    scanner: &Scanner,
    predicate: &SearchPredicate,
) -> Result<ScanSummary> {
    select(&mut store.session, folder.as_str()).await?;
    scanner.run(store, predicate).await
}

/// [`MailStore`] over a live, selected IMAP session.
struct SessionStore {
    session: ImapSession,
}

impl MailStore for SessionStore {
    async fn search(&mut self, predicate: &SearchPredicate) -> Result<Vec<u32>> {
        let query = predicate.to_imap_query();
        debug!("UID SEARCH {}", query);

        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;

        // the server hands back an unordered set; candidates are
        // visited in ascending UID order
        let mut candidates: Vec<u32> = uids.into_iter().collect();
        candidates.sort_unstable();
        Ok(candidates)
    }

    async fn fetch_meta(&mut self, uid: u32) -> Result<MessageMeta> {
        let uid_set = format!("{uid}");
        let mut messages = self
            .session
            .uid_fetch(&uid_set, META_ITEMS)
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

        let mut meta = MessageMeta {
            uid,
            ..MessageMeta::default()
        };
        let mut found = false;

        while let Some(result) = messages.next().await {
            let msg = result.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            found = true;
            if let Some(envelope) = msg.envelope() {
                meta.envelope = Some(convert_envelope(envelope));
            }
            if let Some(structure) = msg.bodystructure() {
                meta.parts = Some(part_tree(structure, None));
            }
            if let Some(header) = msg.header() {
                meta.raw_headers = Some(String::from_utf8_lossy(header).into_owned());
            }
        }
        drop(messages);

        if found {
            Ok(meta)
        } else {
            Err(Error::Imap(format!("No metadata returned for UID {uid}")))
        }
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>> {
        let uid_set = format!("{uid}");
        let mut messages = self
            .session
            .uid_fetch(&uid_set, RAW_ITEMS)
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

        let mut body = None;
        while let Some(result) = messages.next().await {
            let msg = result.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            if let Some(bytes) = msg.body() {
                body = Some(bytes.to_vec());
            }
        }
        drop(messages);

        body.ok_or_else(|| Error::Imap(format!("No body returned for UID {uid}")))
    }
}

/// Convert a wire envelope into the crate's owned summary.
fn convert_envelope(envelope: &Envelope<'_>) -> MessageEnvelope {
    MessageEnvelope {
        subject: decode_text(envelope.subject.as_deref()),
        date: decode_text(envelope.date.as_deref()),
        from: envelope.from.as_deref().and_then(format_address_list),
        message_id: decode_text(envelope.message_id.as_deref()),
    }
}

fn decode_text(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(|b| String::from_utf8_lossy(b).into_owned())
}

fn format_address_list(addresses: &[Address<'_>]) -> Option<String> {
    let rendered: Vec<String> = addresses.iter().filter_map(format_address).collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(", "))
    }
}

fn format_address(address: &Address<'_>) -> Option<String> {
    let mailbox = decode_text(address.mailbox.as_deref())?;
    let host = decode_text(address.host.as_deref())?;
    let bare = format!("{mailbox}@{host}");
    match decode_text(address.name.as_deref()) {
        Some(name) if !name.is_empty() => Some(format!("{name} <{bare}>")),
        _ => Some(bare),
    }
}

/// Convert a `BODYSTRUCTURE` item into a [`PartNode`] tree.
///
/// Children are numbered from 1 at each level and dot-joined into
/// IMAP section paths; the root part carries no section label.
fn part_tree(structure: &BodyStructure<'_>, section: Option<String>) -> PartNode {
    match structure {
        BodyStructure::Basic { common, other, .. } => single_part(common, other, section),
        BodyStructure::Text { common, other, .. } => single_part(common, other, section),
        BodyStructure::Message {
            common,
            other,
            body,
            ..
        } => {
            let child_path = child_section(section.as_deref(), 1);
            let mut node = single_part(common, other, section);
            node.children.push(part_tree(body, Some(child_path)));
            node
        }
        BodyStructure::Multipart { common, bodies, .. } => PartNode {
            content_type: Some(content_type_label(common)),
            disposition: disposition_label(common),
            children: bodies
                .iter()
                .enumerate()
                .map(|(index, body)| {
                    part_tree(body, Some(child_section(section.as_deref(), index + 1)))
                })
                .collect(),
            section,
            ..PartNode::default()
        },
    }
}

fn single_part(
    common: &BodyContentCommon<'_>,
    other: &BodyContentSinglePart<'_>,
    section: Option<String>,
) -> PartNode {
    PartNode {
        content_type: Some(content_type_label(common)),
        section,
        disposition: disposition_label(common),
        encoding: Some(encoding_label(&other.transfer_encoding)),
        children: Vec::new(),
    }
}

fn content_type_label(common: &BodyContentCommon<'_>) -> String {
    format!("{}/{}", common.ty.ty, common.ty.subtype).to_ascii_lowercase()
}

fn disposition_label(common: &BodyContentCommon<'_>) -> Option<String> {
    common
        .disposition
        .as_ref()
        .map(|disposition| disposition.ty.to_ascii_lowercase())
}

fn encoding_label(encoding: &ContentEncoding<'_>) -> String {
    match encoding {
        ContentEncoding::SevenBit => "7bit".to_string(),
        ContentEncoding::EightBit => "8bit".to_string(),
        ContentEncoding::Binary => "binary".to_string(),
        ContentEncoding::Base64 => "base64".to_string(),
        ContentEncoding::QuotedPrintable => "quoted-printable".to_string(),
        ContentEncoding::Other(other) => other.to_ascii_lowercase(),
    }
}

fn child_section(parent: Option<&str>, index: usize) -> String {
    parent.map_or_else(|| index.to_string(), |path| format!("{path}.{index}"))
}
