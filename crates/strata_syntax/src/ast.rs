//! Syntax tree for executable GraphQL documents.

use strata_core::{Span, Text};

/// A complete executable document.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub definitions: Vec<Definition<'a>>,
    pub span: Span,
}

impl<'a> Document<'a> {
    /// Iterates the operation definitions.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition<'a>> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
    }

    /// Iterates the fragment definitions.
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition<'a>> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Fragment(fragment) => Some(fragment),
            Definition::Operation(_) => None,
        })
    }
}

/// A top-level definition.
#[derive(Debug, Clone)]
pub enum Definition<'a> {
    Operation(OperationDefinition<'a>),
    Fragment(FragmentDefinition<'a>),
}

/// Type of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type reference in a variable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Named type: `User`
    Named(Name),
    /// List type: `[User]`
    List(Box<Type>, Span),
    /// Non-null type: `User!`
    NonNull(Box<Type>, Span),
}

impl Type {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Named(name) => name.span,
            Self::List(_, span) | Self::NonNull(_, span) => *span,
        }
    }

    /// Returns the innermost named type.
    #[must_use]
    pub fn named(&self) -> Name {
        match self {
            Self::Named(name) => *name,
            Self::List(inner, _) | Self::NonNull(inner, _) => inner.named(),
        }
    }
}

/// Directive usage.
#[derive(Debug, Clone)]
pub struct Directive<'a> {
    pub name: Name,
    pub arguments: Vec<Argument<'a>>,
    pub span: Span,
}

/// Argument.
#[derive(Debug, Clone)]
pub struct Argument<'a> {
    pub name: Name,
    pub value: Value<'a>,
    pub span: Span,
}

/// Operation definition.
#[derive(Debug, Clone)]
pub struct OperationDefinition<'a> {
    pub operation: OperationType,
    pub name: Option<Name>,
    pub variables: Vec<VariableDefinition<'a>>,
    pub directives: Vec<Directive<'a>>,
    pub selection_set: SelectionSet<'a>,
    pub span: Span,
}

/// Variable definition.
#[derive(Debug, Clone)]
pub struct VariableDefinition<'a> {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value<'a>>,
    pub directives: Vec<Directive<'a>>,
    pub span: Span,
}

/// Fragment definition.
#[derive(Debug, Clone)]
pub struct FragmentDefinition<'a> {
    pub name: Name,
    pub type_condition: Name,
    pub directives: Vec<Directive<'a>>,
    pub selection_set: SelectionSet<'a>,
    pub span: Span,
}

/// Selection set.
#[derive(Debug, Clone)]
pub struct SelectionSet<'a> {
    pub selections: Vec<Selection<'a>>,
    pub span: Span,
}

/// Selection.
#[derive(Debug, Clone)]
pub enum Selection<'a> {
    Field(FieldSelection<'a>),
    FragmentSpread(FragmentSpread<'a>),
    InlineFragment(InlineFragment<'a>),
}

/// Field selection.
#[derive(Debug, Clone)]
pub struct FieldSelection<'a> {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<Argument<'a>>,
    pub directives: Vec<Directive<'a>>,
    pub selection_set: Option<SelectionSet<'a>>,
    pub span: Span,
}

/// Fragment spread.
#[derive(Debug, Clone)]
pub struct FragmentSpread<'a> {
    pub name: Name,
    pub directives: Vec<Directive<'a>>,
    pub span: Span,
}

/// Inline fragment.
#[derive(Debug, Clone)]
pub struct InlineFragment<'a> {
    pub type_condition: Option<Name>,
    pub directives: Vec<Directive<'a>>,
    pub selection_set: SelectionSet<'a>,
    pub span: Span,
}

/// Value.
///
/// Numeric literals keep their source text; range checks happen during validation.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Variable(Name),
    Int(&'a str, Span),
    Float(&'a str, Span),
    String(String, Span),
    Boolean(bool, Span),
    Null(Span),
    Enum(Name),
    List(Vec<Value<'a>>, Span),
    Object(Vec<ObjectField<'a>>, Span),
}

impl Value<'_> {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Variable(name) | Self::Enum(name) => name.span,
            Self::Int(_, span)
            | Self::Float(_, span)
            | Self::String(_, span)
            | Self::Boolean(_, span)
            | Self::Null(span)
            | Self::List(_, span)
            | Self::Object(_, span) => *span,
        }
    }
}

/// A field of an object value.
#[derive(Debug, Clone)]
pub struct ObjectField<'a> {
    pub name: Name,
    pub value: Value<'a>,
    pub span: Span,
}

/// Name with span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Name {
    pub value: Text,
    pub span: Span,
}

impl Name {
    pub fn new(value: Text, span: Span) -> Self {
        Self { value, span }
    }
}
