//! Test data model for the fake IMAP server
//!
//! Builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .email(1, false, &raw)
//!         .with_bodystructure(multipart("MIXED", &[
//!             text_part("PLAIN", "7BIT", 20, 1),
//!             attachment_part("APPLICATION", "ZIP", "BASE64", 512, "a.zip"),
//!         ]))
//!         .with_envelope(envelope("Mon, 01 Jan 2024 12:00:00 +0000",
//!             "Hello", "alice", "example.com", Some("<id@example.com>")))
//!     .build();
//! ```
//!
//! `ENVELOPE` and `BODYSTRUCTURE` fetch items are carried as
//! pre-rendered IMAP wire strings. Emails without them simply omit
//! the item in FETCH responses, which is how real servers behave when
//! structure metadata is unavailable -- exactly the case the
//! scanner's header fallback exists for.

/// A complete mailbox: a collection of named folders, each holding
/// zero or more test emails.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }
}

/// A single IMAP folder (e.g. "INBOX", "Spam").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
}

/// A test email stored in a folder.
///
/// - `uid`: unique-per-folder number that never changes.
/// - `seen`: whether the `\Seen` flag is set (UNSEEN search filters
///   on it).
/// - `raw`: the complete RFC 2822 message (headers + body) as bytes;
///   returned for `BODY[]` fetches, and its header block for
///   `BODY[HEADER]`.
/// - `bodystructure`/`envelope`: optional pre-rendered wire strings
///   for the corresponding FETCH items.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub raw: Vec<u8>,
    pub bodystructure: Option<String>,
    pub envelope: Option<String>,
}

impl TestEmail {
    /// The RFC 2822 header block including the terminating blank
    /// line, as `BODY[HEADER]` returns it.
    pub fn header_block(&self) -> Vec<u8> {
        let boundary = b"\r\n\r\n";
        match self
            .raw
            .windows(boundary.len())
            .position(|window| window == boundary)
        {
            Some(pos) => self.raw[..pos + boundary.len()].to_vec(),
            None => self.raw.clone(),
        }
    }
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(uid, seen, raw)` calls to add messages to it;
/// `.with_bodystructure()`/`.with_envelope()` decorate the most
/// recently added email. Finish with `.build()`.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(TestEmail {
                uid,
                seen,
                raw: raw.to_vec(),
                bodystructure: None,
                envelope: None,
            });
        self
    }

    /// Attach a `BODYSTRUCTURE` wire string to the last email.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.email()` call.
    pub fn with_bodystructure(mut self, bodystructure: impl Into<String>) -> Self {
        self.last_email().bodystructure = Some(bodystructure.into());
        self
    }

    /// Attach an `ENVELOPE` wire string to the last email.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.email()` call.
    pub fn with_envelope(mut self, envelope: impl Into<String>) -> Self {
        self.last_email().envelope = Some(envelope.into());
        self
    }

    fn last_email(&mut self) -> &mut TestEmail {
        self.folders
            .last_mut()
            .expect("call .folder() first")
            .emails
            .last_mut()
            .expect("call .email() before decorating it")
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
        }
    }
}

// -- wire string helpers --

/// An `ENVELOPE` item: date, subject, one from/sender/reply-to
/// address, and an optional message id. To/cc/bcc are NIL.
pub fn envelope(
    date: &str,
    subject: &str,
    from_mailbox: &str,
    from_host: &str,
    message_id: Option<&str>,
) -> String {
    let from = format!("((NIL NIL \"{from_mailbox}\" \"{from_host}\"))");
    let msgid = message_id.map_or("NIL".to_string(), |id| format!("\"{id}\""));
    format!("(\"{date}\" \"{subject}\" {from} {from} {from} NIL NIL NIL NIL {msgid})")
}

/// A `text/<subtype>` single-part body with the given encoding.
pub fn text_part(subtype: &str, encoding: &str, size: usize, lines: usize) -> String {
    format!("(\"TEXT\" \"{subtype}\" (\"CHARSET\" \"utf-8\") NIL NIL \"{encoding}\" {size} {lines})")
}

/// A non-text single part flagged as an attachment, with extension
/// data carrying its disposition.
pub fn attachment_part(
    ty: &str,
    subtype: &str,
    encoding: &str,
    size: usize,
    filename: &str,
) -> String {
    format!(
        "(\"{ty}\" \"{subtype}\" (\"NAME\" \"{filename}\") NIL NIL \"{encoding}\" {size} \
         NIL (\"ATTACHMENT\" (\"FILENAME\" \"{filename}\")) NIL NIL)"
    )
}

/// A multipart container wrapping `parts` (concatenated, per RFC
/// 3501 body grammar).
pub fn multipart(subtype: &str, parts: &[String]) -> String {
    format!(
        "({} \"{subtype}\" (\"BOUNDARY\" \"----=_Part_0\") NIL NIL)",
        parts.concat()
    )
}
