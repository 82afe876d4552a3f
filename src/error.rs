//! Error types for encscan

use thiserror::Error;

/// Errors produced while compiling search criteria, matching
/// encodings, or talking to the IMAP server.
///
/// The first four variants are input errors: they fire before any
/// network interaction and carry the offending literal for
/// diagnostics. Retrying them cannot succeed. The remaining variants
/// surface collaborator failures as-is; no automatic retry is
/// performed here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed search criteria: {0}")]
    MalformedCriteria(String),

    #[error("search keyword '{0}' requires an argument")]
    MissingArgument(String),

    #[error("unsupported search token: '{0}'")]
    UnsupportedToken(String),

    #[error("invalid encoding pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

pub type Result<T> = std::result::Result<T, Error>;
