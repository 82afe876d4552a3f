//! Scan-target mailbox folders
//!
//! A scan is pointed at exactly one folder. Well-known folders have
//! dedicated variants that map to their standard IMAP names; anything
//! else uses the `Custom` variant. Parsing from strings folds case for
//! every well-known name, since scan targets usually arrive from
//! configuration or CLI flags typed by hand.

use std::fmt;

/// An IMAP mailbox folder to scan.
///
/// # Examples
///
/// ```
/// use encscan::Folder;
///
/// let inbox = Folder::Inbox;
/// assert_eq!(inbox.as_str(), "INBOX");
///
/// assert_eq!(Folder::from("junk"), Folder::Spam);
/// assert_eq!(Folder::from("Quarantine"), Folder::custom("Quarantine"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Folder {
    /// The INBOX folder (RFC 3501 required, case-insensitive).
    Inbox,
    /// Sent messages.
    Sent,
    /// Draft messages.
    Drafts,
    /// Deleted messages.
    Trash,
    /// Spam / junk messages.
    Spam,
    /// Archived messages.
    Archive,
    /// A user-defined or server-specific folder.
    Custom(String),
}

impl Folder {
    /// Create a folder for a user-defined or non-standard mailbox.
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The IMAP folder name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
            Self::Trash => "Trash",
            Self::Spam => "Spam",
            Self::Archive => "Archive",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        // "Junk" is what several servers call the spam folder.
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else if s.eq_ignore_ascii_case("sent") {
            Self::Sent
        } else if s.eq_ignore_ascii_case("drafts") {
            Self::Drafts
        } else if s.eq_ignore_ascii_case("trash") {
            Self::Trash
        } else if s.eq_ignore_ascii_case("spam") || s.eq_ignore_ascii_case("junk") {
            Self::Spam
        } else if s.eq_ignore_ascii_case("archive") {
            Self::Archive
        } else {
            Self::Custom(s.to_string())
        }
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
