//! Graph messages reported while parsing, validating and executing a query.

use crate::span::SourceLocation;

/// Message severity. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphMessageSeverity {
    Trace,
    Debug,
    Information,
    Warning,
    /// A message that prevents the document from being executed.
    Critical,
}

impl GraphMessageSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Information => "INFORMATION",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns true if a message of this severity rejects the document.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl std::fmt::Display for GraphMessageSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points a message at the GraphQL specification rule it enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReference {
    /// Rule number, e.g. `5.3.2`.
    pub number: &'static str,
    /// Anchor url into the specification text.
    pub url: &'static str,
}

impl RuleReference {
    #[must_use]
    pub const fn new(number: &'static str, url: &'static str) -> Self {
        Self { number, url }
    }
}

/// A segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        Self::Field(value.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A single message.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphMessage {
    pub severity: GraphMessageSeverity,
    /// Machine readable code, see [`codes`].
    pub code: String,
    /// Human readable text.
    pub message: String,
    pub location: Option<SourceLocation>,
    pub rule: Option<RuleReference>,
    /// Response path, for messages raised while completing a result.
    pub path: Vec<PathSegment>,
    /// Detail of an internal failure. Only written to clients when exceptions are exposed.
    pub exception: Option<String>,
}

impl GraphMessage {
    /// Creates a critical message.
    pub fn critical(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(GraphMessageSeverity::Critical, code, message)
    }

    /// Creates a warning message.
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(GraphMessageSeverity::Warning, code, message)
    }

    /// Creates an informational message.
    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(GraphMessageSeverity::Information, code, message)
    }

    pub fn new(
        severity: GraphMessageSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location: None,
            rule: None,
            path: Vec::new(),
            exception: None,
        }
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the rule this message enforces.
    #[must_use]
    pub fn with_rule(mut self, rule: RuleReference) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Attaches detail of an internal failure.
    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Returns the rule number, if any.
    #[must_use]
    pub fn rule_number(&self) -> Option<&'static str> {
        self.rule.as_ref().map(|r| r.number)
    }
}

/// An ordered collection of messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphMessageCollection {
    messages: Vec<GraphMessage>,
}

impl GraphMessageCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message.
    pub fn add(&mut self, message: GraphMessage) {
        self.messages.push(message);
    }

    /// Adds a critical message at a location.
    pub fn critical(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        location: Option<SourceLocation>,
    ) {
        let mut message = GraphMessage::critical(code, message);
        message.location = location;
        self.add(message);
    }

    /// Appends every message of another collection.
    pub fn extend(&mut self, other: GraphMessageCollection) {
        self.messages.extend(other.messages);
    }

    /// Returns the highest severity present.
    #[must_use]
    pub fn severity(&self) -> Option<GraphMessageSeverity> {
        self.messages.iter().map(|m| m.severity).max()
    }

    /// Returns true if any message is critical.
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.messages.iter().any(|m| m.severity.is_critical())
    }

    /// Returns the number of critical messages.
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity.is_critical())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphMessage> {
        self.messages.iter()
    }

    /// Returns every message citing the given rule number.
    pub fn for_rule<'a>(&'a self, number: &'a str) -> impl Iterator<Item = &'a GraphMessage> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.rule_number() == Some(number))
    }

    #[must_use]
    pub fn first(&self) -> Option<&GraphMessage> {
        self.messages.first()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<GraphMessage> {
        self.messages
    }
}

impl From<Vec<GraphMessage>> for GraphMessageCollection {
    fn from(messages: Vec<GraphMessage>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for GraphMessageCollection {
    type Item = GraphMessage;
    type IntoIter = std::vec::IntoIter<GraphMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a GraphMessageCollection {
    type Item = &'a GraphMessage;
    type IntoIter = std::slice::Iter<'a, GraphMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Common message codes.
pub mod codes {
    pub const SYNTAX_ERROR: &str = "SYNTAX_ERROR";
    pub const INVALID_DOCUMENT: &str = "INVALID_DOCUMENT";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const INVALID_FIELD_VALUE: &str = "INVALID_FIELD_VALUE";
    pub const UNHANDLED_EXCEPTION: &str = "UNHANDLED_EXCEPTION";
    pub const SUBSCRIPTION_ERROR: &str = "SUBSCRIPTION_ERROR";
    pub const OPERATION_NOT_FOUND: &str = "OPERATION_NOT_FOUND";
}
