//! Error types for parsing shared domain values

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("{kind} id must not be empty")]
    EmptyId { kind: &'static str },

    #[error("{kind} id contains whitespace or reserved characters: {value:?}")]
    MalformedId { kind: &'static str, value: String },

    #[error("Unknown account role: {0}")]
    UnknownRole(String),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
