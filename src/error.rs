//! Error types for Potsie

use std::fmt;

use thiserror::Error;

/// Statement container that may be missing when a field is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Result,
    ResultExtensions,
    Context,
    ContextExtensions,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Container::Result => "result",
            Container::ResultExtensions => "result extensions",
            Container::Context => "context",
            Container::ContextExtensions => "context extensions",
        };
        f.write_str(name)
    }
}

/// Errors raised while reading fields out of an LRS record
///
/// `id` is the statement id as rendered in messages (`None` when the
/// statement carries no id).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordParsingError {
    #[error("Current '{verb}' statement {id} has no {container}")]
    MissingContainer {
        verb: String,
        id: String,
        container: Container,
    },

    #[error("Statement {id} has no verb")]
    MissingVerb { id: String },

    #[error("Current '{verb}' statement {id} has no {field}")]
    MissingField {
        verb: String,
        id: String,
        field: &'static str,
    },

    #[error("Current '{verb}' statement {id} has an invalid {field}: {value}")]
    InvalidField {
        verb: String,
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("Unsupported verb '{verb}' in statement {id}")]
    UnsupportedVerb { verb: String, id: String },
}

/// Non-success response from the LRS API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("LRS API '{verb}' request '{url}' failed! Code: {status}, Content: {body}")]
pub struct LrsApiError {
    pub verb: String,
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Missing or invalid runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{0} environment variable should be defined")]
    MissingVariable(&'static str),

    #[error("{name} environment variable is invalid: {reason}")]
    InvalidVariable { name: &'static str, reason: String },
}

/// Errors that can occur anywhere between the LRS and the metrics table
#[derive(Debug, Error)]
pub enum PotsieError {
    #[error(transparent)]
    Parsing(#[from] RecordParsingError),

    #[error(transparent)]
    Api(#[from] LrsApiError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse LRS payload: {0}")]
    ParseError(String),

    #[error("LRS transport error: {0}")]
    Transport(String),
}
