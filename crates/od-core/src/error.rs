//! Error taxonomy for document operations.
//!
//! Structural failures are rejected synchronously and leave the graph
//! untouched. A dangling object reference is deliberately *not* an error:
//! reference resolution returns `None` and the `check` pass reports it as
//! a diagnostic instead.

use crate::id::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocError {
    /// A serialized record's discriminant could not be resolved to a
    /// registered class. Aborts the load of that subtree.
    #[error("unknown class `{0}`")]
    UnknownClass(String),

    /// An undeclared or mistyped property, or an array element whose class
    /// does not belong under the array's element class.
    #[error("schema violation on `{class}`: {reason}")]
    SchemaViolation { class: String, reason: String },

    /// `replace_objects` was given nodes that do not share one owning array.
    #[error("objects do not share one owning array")]
    InvalidParent,

    /// An operation referenced an object that is not part of this graph.
    #[error("object {0} not found in this document")]
    ObjectNotFound(ObjectId),
}

impl DocError {
    pub fn schema(class: &str, reason: impl Into<String>) -> Self {
        DocError::SchemaViolation {
            class: class.to_string(),
            reason: reason.into(),
        }
    }
}
