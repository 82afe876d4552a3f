//! MIME part tree
//!
//! A fetched message's `BODYSTRUCTURE` is converted into a [`PartNode`]
//! tree before matching. Each node owns its children; there are no
//! back-references, so arbitrarily nested multipart messages stay a
//! plain acyclic tree.

use serde::{Deserialize, Serialize};

/// One node of a message's MIME decomposition.
///
/// All labels are optional: real-world `BODYSTRUCTURE` responses are
/// frequently incomplete, and the matcher treats a missing encoding as
/// "nothing to test" rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartNode {
    /// Content type label, e.g. `text/plain` or `multipart/mixed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Dotted IMAP section path, e.g. `2.1`. The root part has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Content disposition label, e.g. `attachment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    /// Transfer encoding as reported by the server, e.g. `base64`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Child parts in server order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PartNode>,
}

impl PartNode {
    /// A leaf part with a content type and transfer encoding.
    #[must_use]
    pub fn leaf(content_type: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            encoding: Some(encoding.into()),
            ..Self::default()
        }
    }

    /// A multipart container holding `children`.
    #[must_use]
    pub fn multipart(content_type: impl Into<String>, children: Vec<Self>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            children,
            ..Self::default()
        }
    }

    /// Set the dotted section path.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Set the disposition label.
    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }
}
