//! Fatal validation errors.

use strata_document::{DocumentPartId, DocumentPartKind};
use thiserror::Error;

/// Internal state that a correctly built document never has.
///
/// These are not user errors: they abort the validation pass instead of becoming messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("field `{field}` at part {part} has no source graph type")]
    MissingSourceGraphType { field: String, part: DocumentPartId },

    #[error("part {part} is not a {expected} part")]
    UnexpectedPartKind {
        part: DocumentPartId,
        expected: DocumentPartKind,
    },
}
