//! Search criteria compilation
//!
//! Search intent arrives in one of two JSON shapes: an ordered list of
//! classic IMAP search tokens (`["UNSEEN", "FROM", "x@y.com"]`,
//! arbitrarily nested) or a predicate object (`{"seen": false}`). Both
//! compile into a [`SearchPredicate`], the normalized form handed to
//! the mail store. Compilation is pure and happens before any network
//! interaction, so a bad criterion never costs a connection.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw search criteria as supplied by the caller.
///
/// The discriminant is checked at the JSON boundary: an array is the
/// token form, an object is the predicate form, and anything else is
/// rejected outright.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaInput {
    /// Ordered token list; elements are primitives or nested arrays.
    Tokens(Vec<Value>),
    /// A pre-built predicate, passed through after emptiness
    /// normalization.
    Predicate(SearchPredicate),
}

impl CriteriaInput {
    /// Parse criteria from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCriteria`] if the text is not valid
    /// JSON or is neither an array nor an object.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::MalformedCriteria(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCriteria`] for scalars and for
    /// predicate objects whose field types do not fit.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self::Tokens(items)),
            Value::Object(_) => {
                let predicate: SearchPredicate = serde_json::from_value(value)
                    .map_err(|e| Error::MalformedCriteria(e.to_string()))?;
                Ok(Self::Predicate(predicate))
            }
            other => Err(Error::MalformedCriteria(format!(
                "expected a token list or a predicate object, got: {other}"
            ))),
        }
    }

    /// Compile into a normalized [`SearchPredicate`].
    ///
    /// An empty token list or an empty predicate object yields the
    /// canonical match-all predicate, never an empty one.
    ///
    /// # Errors
    ///
    /// See [`compile_tokens`] for the token-form failure modes.
    pub fn compile(&self) -> Result<SearchPredicate> {
        match self {
            Self::Tokens(values) => compile_tokens(values),
            Self::Predicate(predicate) => Ok(normalize_empty(predicate.clone())),
        }
    }
}

/// A header criterion value: `true`/`false` literals are kept as
/// booleans, everything else stays a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Text(String),
}

/// Normalized, typed search intent.
///
/// Boolean flags distinguish explicit `false` ("UNSEEN") from absent
/// ("don't care"); the compiler never collapses the two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPredicate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub larger: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smaller: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, HeaderValue>>,
}

impl SearchPredicate {
    /// The canonical match-all predicate.
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            all: Some(true),
            ..Self::default()
        }
    }

    /// True when no field is set at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render as an RFC 3501 `SEARCH` query string.
    ///
    /// Explicit-false flags render as their `UN`-prefixed keyword
    /// (`seen: false` becomes `UNSEEN`), so the false/absent
    /// distinction survives onto the wire. An otherwise empty render
    /// falls back to `ALL`.
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        let mut terms: Vec<String> = Vec::new();

        if self.all == Some(true) {
            terms.push("ALL".to_string());
        }
        push_flag(&mut terms, self.seen, "SEEN", Some("UNSEEN"));
        push_flag(&mut terms, self.answered, "ANSWERED", Some("UNANSWERED"));
        push_flag(&mut terms, self.deleted, "DELETED", Some("UNDELETED"));
        push_flag(&mut terms, self.draft, "DRAFT", Some("UNDRAFT"));
        push_flag(&mut terms, self.flagged, "FLAGGED", Some("UNFLAGGED"));
        push_flag(&mut terms, self.recent, "RECENT", Some("OLD"));
        push_flag(&mut terms, self.old, "OLD", None);
        push_flag(&mut terms, self.new, "NEW", None);

        push_text(&mut terms, self.from.as_deref(), "FROM");
        push_text(&mut terms, self.to.as_deref(), "TO");
        push_text(&mut terms, self.cc.as_deref(), "CC");
        push_text(&mut terms, self.bcc.as_deref(), "BCC");
        push_text(&mut terms, self.subject.as_deref(), "SUBJECT");
        push_text(&mut terms, self.body.as_deref(), "BODY");

        if let Some(n) = self.larger {
            terms.push(format!("LARGER {n}"));
        }
        if let Some(n) = self.smaller {
            terms.push(format!("SMALLER {n}"));
        }

        push_text(&mut terms, self.before.as_deref(), "BEFORE");
        push_text(&mut terms, self.on.as_deref(), "ON");
        push_text(&mut terms, self.since.as_deref(), "SINCE");
        push_text(&mut terms, self.sent_before.as_deref(), "SENTBEFORE");
        push_text(&mut terms, self.sent_on.as_deref(), "SENTON");
        push_text(&mut terms, self.sent_since.as_deref(), "SENTSINCE");

        if let Some(uid) = self.uid.as_deref() {
            terms.push(format!("UID {uid}"));
        }

        if let Some(header) = &self.header {
            for (name, value) in header {
                match value {
                    HeaderValue::Bool(true) => {
                        terms.push(format!("HEADER {} \"\"", quote(name)));
                    }
                    HeaderValue::Bool(false) => {
                        terms.push(format!("NOT HEADER {} \"\"", quote(name)));
                    }
                    HeaderValue::Text(text) => {
                        terms.push(format!("HEADER {} {}", quote(name), quote(text)));
                    }
                }
            }
        }

        if terms.is_empty() {
            "ALL".to_string()
        } else {
            terms.join(" ")
        }
    }
}

/// Flatten a nested token list into a flat ordered string sequence.
///
/// Depth-first pre-order: primitives are stringified in encounter
/// order, nested arrays expand in place, `null` elements are dropped
/// silently. Order is preserved exactly -- the compiler consumes
/// keyword/argument pairs positionally.
///
/// # Errors
///
/// Returns [`Error::MalformedCriteria`] when an object appears
/// anywhere in the structure.
pub fn flatten_tokens(values: &[Value]) -> Result<Vec<String>> {
    let mut flat = Vec::new();
    flatten_into(values, &mut flat)?;
    Ok(flat)
}

fn flatten_into(values: &[Value], out: &mut Vec<String>) -> Result<()> {
    for value in values {
        match value {
            Value::Null => {}
            Value::Bool(b) => out.push(b.to_string()),
            Value::Number(n) => out.push(n.to_string()),
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => flatten_into(items, out)?,
            Value::Object(_) => {
                return Err(Error::MalformedCriteria(
                    "nested objects are not permitted inside a token list".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Compile a token list into a normalized predicate.
///
/// Tokens are consumed strictly left-to-right with a single cursor.
/// Keyword matching is case-insensitive; produced values are not
/// case-folded.
///
/// # Errors
///
/// [`Error::MalformedCriteria`] for nested objects or non-numeric
/// size arguments, [`Error::MissingArgument`] when a keyword's value
/// is cut off by the end of the stream, [`Error::UnsupportedToken`]
/// for anything unrecognized (reported verbatim).
pub fn compile_tokens(values: &[Value]) -> Result<SearchPredicate> {
    let tokens = flatten_tokens(values)?;
    let mut predicate = SearchPredicate::default();
    let mut pos = 0usize;

    while pos < tokens.len() {
        let token = &tokens[pos];
        pos += 1;
        let keyword = token.to_ascii_uppercase();
        match keyword.as_str() {
            "ALL" => predicate.all = Some(true),
            "SEEN" => predicate.seen = Some(true),
            "UNSEEN" => predicate.seen = Some(false),
            "ANSWERED" => predicate.answered = Some(true),
            "UNANSWERED" => predicate.answered = Some(false),
            "DELETED" => predicate.deleted = Some(true),
            "UNDELETED" => predicate.deleted = Some(false),
            "DRAFT" => predicate.draft = Some(true),
            "UNDRAFT" => predicate.draft = Some(false),
            "FLAGGED" => predicate.flagged = Some(true),
            "UNFLAGGED" => predicate.flagged = Some(false),
            "RECENT" => predicate.recent = Some(true),
            "OLD" => predicate.old = Some(true),
            "NEW" => predicate.new = Some(true),
            "FROM" => predicate.from = Some(take_value(&tokens, &mut pos, &keyword)?),
            "TO" => predicate.to = Some(take_value(&tokens, &mut pos, &keyword)?),
            "CC" => predicate.cc = Some(take_value(&tokens, &mut pos, &keyword)?),
            "BCC" => predicate.bcc = Some(take_value(&tokens, &mut pos, &keyword)?),
            "SUBJECT" => predicate.subject = Some(take_value(&tokens, &mut pos, &keyword)?),
            "BODY" => predicate.body = Some(take_value(&tokens, &mut pos, &keyword)?),
            "LARGER" => predicate.larger = Some(take_number(&tokens, &mut pos, &keyword)?),
            "SMALLER" => predicate.smaller = Some(take_number(&tokens, &mut pos, &keyword)?),
            "BEFORE" => predicate.before = Some(take_value(&tokens, &mut pos, &keyword)?),
            "ON" => predicate.on = Some(take_value(&tokens, &mut pos, &keyword)?),
            "SINCE" => predicate.since = Some(take_value(&tokens, &mut pos, &keyword)?),
            "SENTBEFORE" => {
                predicate.sent_before = Some(take_value(&tokens, &mut pos, &keyword)?);
            }
            "SENTON" => predicate.sent_on = Some(take_value(&tokens, &mut pos, &keyword)?),
            "SENTSINCE" => {
                predicate.sent_since = Some(take_value(&tokens, &mut pos, &keyword)?);
            }
            "UID" => predicate.uid = Some(take_value(&tokens, &mut pos, &keyword)?),
            "HEADER" => {
                let name = take_value(&tokens, &mut pos, &keyword)?.to_ascii_lowercase();
                let value = take_value(&tokens, &mut pos, &keyword)?;
                let coerced = if value.eq_ignore_ascii_case("true") {
                    HeaderValue::Bool(true)
                } else if value.eq_ignore_ascii_case("false") {
                    HeaderValue::Bool(false)
                } else {
                    HeaderValue::Text(value)
                };
                // last write wins for repeated header names
                predicate
                    .header
                    .get_or_insert_with(BTreeMap::new)
                    .insert(name, coerced);
            }
            _ => return Err(Error::UnsupportedToken(token.clone())),
        }
    }

    Ok(normalize_empty(predicate))
}

/// An empty predicate is never semantically valid on its own.
fn normalize_empty(predicate: SearchPredicate) -> SearchPredicate {
    if predicate.is_empty() {
        SearchPredicate::match_all()
    } else {
        predicate
    }
}

fn take_value(tokens: &[String], pos: &mut usize, keyword: &str) -> Result<String> {
    let value = tokens
        .get(*pos)
        .cloned()
        .ok_or_else(|| Error::MissingArgument(keyword.to_string()))?;
    *pos += 1;
    Ok(value)
}

fn take_number(tokens: &[String], pos: &mut usize, keyword: &str) -> Result<u64> {
    let value = take_value(tokens, pos, keyword)?;
    value.parse().map_err(|_| {
        Error::MalformedCriteria(format!("'{keyword}' requires a numeric argument, got '{value}'"))
    })
}

fn push_flag(terms: &mut Vec<String>, value: Option<bool>, keyword: &str, negated: Option<&str>) {
    match value {
        Some(true) => terms.push(keyword.to_string()),
        Some(false) => {
            if let Some(un) = negated {
                terms.push(un.to_string());
            } else {
                terms.push(format!("NOT {keyword}"));
            }
        }
        None => {}
    }
}

fn push_text(terms: &mut Vec<String>, value: Option<&str>, keyword: &str) {
    if let Some(value) = value {
        terms.push(format!("{keyword} {}", quote(value)));
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
