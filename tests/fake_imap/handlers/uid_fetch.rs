//! UID FETCH command handler.
//!
//! Serves the two item sets the scanner asks for:
//!
//! - the structural set (`ENVELOPE`, `BODYSTRUCTURE`, `BODY[HEADER]`)
//!   for the matching pass, and
//! - `BODY[]` for the optional raw-message fetch.
//!
//! Which one is meant is decided by sniffing the raw command text for
//! `BODYSTRUCTURE`. Header blocks and bodies are transferred as
//! counted literals: `{bytecount}\r\n` followed by exactly that many
//! raw bytes, then the closing `)`.
//!
//! Emails without a stored `ENVELOPE`/`BODYSTRUCTURE` wire string
//! simply omit that item, the way real servers omit metadata they
//! cannot provide -- that is what drives the scanner's header
//! fallback in end-to-end tests.

use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Extract UIDs from a `SequenceSet`. Only single values are
/// supported, which is all the scanner sends.
fn extract_uids(seq_set: &SequenceSet) -> Vec<u32> {
    seq_set
        .0
        .as_ref()
        .iter()
        .filter_map(|seq| match seq {
            Sequence::Single(SeqOrUid::Value(v)) => Some(v.get()),
            _ => None,
        })
        .collect()
}

/// Handle the UID FETCH command.
///
/// `command_line` is the raw text of the client's command, used to
/// decide which item set was requested.
pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    command_line: &str,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let wants_structure = command_line.to_uppercase().contains("BODYSTRUCTURE");
    let uids = extract_uids(sequence_set);

    for uid in uids {
        if let Some((idx, email)) = folder.emails.iter().enumerate().find(|(_, e)| e.uid == uid) {
            let seq = idx + 1; // 1-based sequence number
            let sent = if wants_structure {
                send_structure(seq, email, stream).await
            } else {
                send_body(seq, email, stream).await
            };
            if !sent {
                return;
            }
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

/// Send the structural response: UID, optional ENVELOPE and
/// BODYSTRUCTURE, and the header block as a literal.
async fn send_structure<S: AsyncRead + AsyncWrite + Unpin>(
    seq: usize,
    email: &TestEmail,
    stream: &mut BufReader<S>,
) -> bool {
    let uid = email.uid;
    let mut items = format!("* {seq} FETCH (UID {uid}");
    if let Some(envelope) = &email.envelope {
        items.push_str(&format!(" ENVELOPE {envelope}"));
    }
    if let Some(bodystructure) = &email.bodystructure {
        items.push_str(&format!(" BODYSTRUCTURE {bodystructure}"));
    }

    let header = email.header_block();
    items.push_str(&format!(" BODY[HEADER] {{{}}}\r\n", header.len()));

    if write_line(stream, &items).await.is_err() {
        return false;
    }
    if write_bytes(stream, &header).await.is_err() {
        return false;
    }
    write_line(stream, ")\r\n").await.is_ok()
}

/// Send the full raw message as a `BODY[]` literal.
async fn send_body<S: AsyncRead + AsyncWrite + Unpin>(
    seq: usize,
    email: &TestEmail,
    stream: &mut BufReader<S>,
) -> bool {
    let uid = email.uid;
    let body_len = email.raw.len();

    let header = format!("* {seq} FETCH (UID {uid} BODY[] {{{body_len}}}\r\n");
    if write_line(stream, &header).await.is_err() {
        return false;
    }
    if write_bytes(stream, &email.raw).await.is_err() {
        return false;
    }
    write_line(stream, ")\r\n").await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::{MailboxBuilder, envelope, text_part};
    use std::num::NonZeroU32;
    use tokio::io::BufReader;

    fn make_raw_email() -> Vec<u8> {
        b"From: a@b.com\r\nSubject: Test\r\n\r\nBody".to_vec()
    }

    fn uid_set(uid: u32) -> SequenceSet {
        SequenceSet(
            vec![Sequence::Single(SeqOrUid::Value(
                NonZeroU32::new(uid).unwrap(),
            ))]
            .try_into()
            .unwrap(),
        )
    }

    async fn run(
        tag: &str,
        sequence_set: &SequenceSet,
        command_line: &str,
        mailbox: &Mailbox,
        selected: Option<&str>,
    ) -> String {
        let (client, server) = tokio::io::duplex(8192);
        let mut stream = BufReader::new(server);

        handle_uid_fetch(tag, sequence_set, command_line, mailbox, selected, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn body_fetch_returns_full_message() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(42, false, &raw)
            .build();

        let output = run(
            "A1",
            &uid_set(42),
            "A1 UID FETCH 42 (UID BODY.PEEK[])",
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(output.contains("* 1 FETCH (UID 42 BODY[]"));
        assert!(output.contains("From: a@b.com"));
        assert!(output.contains(&format!("{{{}}}", raw.len())));
        assert!(output.contains("A1 OK FETCH completed"));
    }

    #[tokio::test]
    async fn structure_fetch_includes_stored_items() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(7, false, &raw)
            .with_envelope(envelope(
                "Mon, 01 Jan 2024 12:00:00 +0000",
                "Test",
                "a",
                "b.com",
                Some("<id@b.com>"),
            ))
            .with_bodystructure(text_part("PLAIN", "7BIT", 4, 1))
            .build();

        let output = run(
            "A1",
            &uid_set(7),
            "A1 UID FETCH 7 (UID ENVELOPE BODYSTRUCTURE BODY.PEEK[HEADER])",
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(output.contains("ENVELOPE (\"Mon, 01 Jan 2024 12:00:00 +0000\""));
        assert!(output.contains("BODYSTRUCTURE (\"TEXT\" \"PLAIN\""));
        assert!(output.contains("BODY[HEADER]"));
        // header block ends at the blank line
        assert!(output.contains("Subject: Test\r\n\r\n"));
    }

    #[tokio::test]
    async fn structure_fetch_omits_missing_items() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(3, false, &raw)
            .build();

        let output = run(
            "A1",
            &uid_set(3),
            "A1 UID FETCH 3 (UID ENVELOPE BODYSTRUCTURE BODY.PEEK[HEADER])",
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(!output.contains("ENVELOPE"));
        assert!(!output.contains("BODYSTRUCTURE"));
        assert!(output.contains("BODY[HEADER]"));
    }

    #[tokio::test]
    async fn missing_uid_returns_only_ok() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run(
            "A1",
            &uid_set(99),
            "A1 UID FETCH 99 (UID BODY.PEEK[])",
            &mailbox,
            Some("INBOX"),
        )
        .await;

        assert!(!output.contains("FETCH (UID"));
        assert!(output.contains("A1 OK FETCH completed"));
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run(
            "A1",
            &uid_set(1),
            "A1 UID FETCH 1 (UID BODY.PEEK[])",
            &mailbox,
            None,
        )
        .await;

        assert!(output.contains("A1 BAD No folder selected"));
    }
}
