//! Canonical document synthesis and parsing.
//!
//! # Responsibility
//! - Map relational template/instance records to provider-shaped trees.
//! - Parse provider trees back into relational records.
//! - Provide pure tree utilities over `serde_json::Value`.
//!
//! # Invariants
//! - Absent relational values are omitted, never emitted as `null`.
//! - `parse_provider_document(&synthesize_class_document(t)) == t` for every
//!   template `t` whose discriminating fields are set.
//! - Documents produced here carry local (unprefixed) identifiers; issuer
//!   qualification happens at the gateway boundary.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod class_doc;
pub mod instance_doc;
pub mod tree;

pub use class_doc::{
    detect_class_type, is_remote_shaped, parse_provider_document, strip_issuer_prefix,
    synthesize_class_document,
};
pub use instance_doc::{parse_instance_document, synthesize_instance_document, InstanceDocument};

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Provider document could not be mapped to relational fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Root is not a JSON object.
    NotAnObject,
    /// Required key missing or not a string.
    MissingField(&'static str),
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "provider document is not an object"),
            Self::MissingField(field) => {
                write!(f, "provider document is missing required field `{field}`")
            }
        }
    }
}

impl Error for DocumentError {}
