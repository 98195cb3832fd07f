//! Core utilities for strata.
//!
//! This crate provides foundational types used throughout strata:
//! - `span`: Source spans and line/column locations
//! - `text`: String interning
//! - `messages`: Graph messages reported by parsing, validation and execution

pub mod messages;
pub mod span;
pub mod text;

pub use messages::{
    codes, GraphMessage, GraphMessageCollection, GraphMessageSeverity, PathSegment, RuleReference,
};
pub use span::{LineIndex, SourceLocation, Span};
pub use text::{Interner, Text};
