//! Document validation for strata.
//!
//! The [`DocumentValidator`] walks a [`QueryDocument`](strata_document::QueryDocument) depth
//! first and runs the rules registered for each part kind. Rules report violations as
//! `INVALID_DOCUMENT` messages tagged with the rule they enforce; a rule that fails can stop
//! the walker from descending into the failing part, so one mistake does not cascade.
//!
//! [`complete_value`] applies the value completion checks to resolved results.

pub mod completion;
pub mod context;
pub mod engine;
pub mod error;
pub mod options;
pub mod rule;
pub mod rules;

pub use completion::{
    complete_value, complete_value_at, completion_messages, CompletionFailure,
    CompletionFailureKind,
};
pub use context::DocumentValidationContext;
pub use engine::{validate_document, DocumentValidator, RuleSet};
pub use error::InvariantViolation;
pub use options::ValidationOptions;
pub use rule::DocumentRule;
