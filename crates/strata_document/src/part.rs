//! Document parts: the nodes of a query document.

use crate::value::SuppliedValue;
use rustc_hash::FxHashMap;
use strata_core::{SourceLocation, Span};
use strata_schema::TypeExpression;
use strata_syntax::{DirectiveLocation, OperationType};

/// Identifies a part within its [`QueryDocument`](crate::QueryDocument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPartId(u32);

impl DocumentPartId {
    /// Creates an id from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DocumentPartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a document part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentPartKind {
    Document,
    Operation,
    VariableCollection,
    Variable,
    Directive,
    InputArgument,
    SuppliedValue,
    FieldSelectionSet,
    Field,
    InlineFragment,
    FragmentSpread,
    NamedFragment,
}

impl DocumentPartKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Operation => "Operation",
            Self::VariableCollection => "VariableCollection",
            Self::Variable => "Variable",
            Self::Directive => "Directive",
            Self::InputArgument => "InputArgument",
            Self::SuppliedValue => "SuppliedValue",
            Self::FieldSelectionSet => "FieldSelectionSet",
            Self::Field => "Field",
            Self::InlineFragment => "InlineFragment",
            Self::FragmentSpread => "FragmentSpread",
            Self::NamedFragment => "NamedFragment",
        }
    }
}

impl std::fmt::Display for DocumentPartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The children of a part: declaration order plus an index by kind.
#[derive(Debug, Clone, Default)]
pub struct DocumentPartsCollection {
    all: Vec<DocumentPartId>,
    by_kind: FxHashMap<DocumentPartKind, Vec<DocumentPartId>>,
}

impl DocumentPartsCollection {
    pub(crate) fn push(&mut self, kind: DocumentPartKind, id: DocumentPartId) {
        self.all.push(id);
        self.by_kind.entry(kind).or_default().push(id);
    }

    /// All children in declaration order.
    #[must_use]
    pub fn all(&self) -> &[DocumentPartId] {
        &self.all
    }

    /// Children of one kind, in declaration order.
    #[must_use]
    pub fn of_kind(&self, kind: DocumentPartKind) -> &[DocumentPartId] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// The first child of one kind.
    #[must_use]
    pub fn first_of_kind(&self, kind: DocumentPartKind) -> Option<DocumentPartId> {
        self.of_kind(kind).first().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// A node of the query document.
///
/// Every part except the document root has exactly one parent. The parent is a plain index
/// and never owns the part.
#[derive(Debug, Clone)]
pub struct DocumentPart {
    pub id: DocumentPartId,
    pub parent: Option<DocumentPartId>,
    pub children: DocumentPartsCollection,
    pub span: Span,
    pub location: SourceLocation,
    pub data: PartData,
}

impl DocumentPart {
    #[must_use]
    pub fn kind(&self) -> DocumentPartKind {
        self.data.kind()
    }
}

/// Kind specific data carried by a part.
#[derive(Debug, Clone)]
pub enum PartData {
    Document,
    Operation(OperationPart),
    VariableCollection,
    Variable(VariablePart),
    Directive(DirectivePart),
    InputArgument(InputArgumentPart),
    SuppliedValue(SuppliedValuePart),
    FieldSelectionSet(FieldSelectionSetPart),
    Field(FieldPart),
    InlineFragment(InlineFragmentPart),
    FragmentSpread(FragmentSpreadPart),
    NamedFragment(NamedFragmentPart),
}

impl PartData {
    #[must_use]
    pub fn kind(&self) -> DocumentPartKind {
        match self {
            Self::Document => DocumentPartKind::Document,
            Self::Operation(_) => DocumentPartKind::Operation,
            Self::VariableCollection => DocumentPartKind::VariableCollection,
            Self::Variable(_) => DocumentPartKind::Variable,
            Self::Directive(_) => DocumentPartKind::Directive,
            Self::InputArgument(_) => DocumentPartKind::InputArgument,
            Self::SuppliedValue(_) => DocumentPartKind::SuppliedValue,
            Self::FieldSelectionSet(_) => DocumentPartKind::FieldSelectionSet,
            Self::Field(_) => DocumentPartKind::Field,
            Self::InlineFragment(_) => DocumentPartKind::InlineFragment,
            Self::FragmentSpread(_) => DocumentPartKind::FragmentSpread,
            Self::NamedFragment(_) => DocumentPartKind::NamedFragment,
        }
    }
}

/// An operation. Children: variable collection, directives, selection set.
#[derive(Debug, Clone)]
pub struct OperationPart {
    pub operation_type: OperationType,
    pub name: Option<String>,
    /// The root graph type, if the schema declares one for this operation type.
    pub root_type: Option<String>,
}

/// A declared variable. Children: optional default value, directives.
#[derive(Debug, Clone)]
pub struct VariablePart {
    pub name: String,
    pub type_expression: TypeExpression,
    pub has_default: bool,
}

/// A directive applied somewhere in the document. Children: input arguments.
#[derive(Debug, Clone)]
pub struct DirectivePart {
    pub name: String,
    pub location: DirectiveLocation,
}

/// A named argument or input object field. Children: exactly one supplied value.
#[derive(Debug, Clone)]
pub struct InputArgumentPart {
    pub name: String,
    /// The expected type, if the schema declares this argument.
    pub expected_type: Option<TypeExpression>,
}

/// A literal or variable reference.
/// Children: list items for lists, input arguments for complex values.
#[derive(Debug, Clone)]
pub struct SuppliedValuePart {
    pub value: SuppliedValue,
    /// The type this value must coerce to, when known.
    pub expected_type: Option<TypeExpression>,
}

/// A selection set. Children: fields, inline fragments, fragment spreads.
#[derive(Debug, Clone)]
pub struct FieldSelectionSetPart {
    /// The graph type whose fields are selected.
    pub graph_type: Option<String>,
}

/// A selected field. Children: input arguments, directives, optional selection set.
#[derive(Debug, Clone)]
pub struct FieldPart {
    pub name: String,
    pub alias: Option<String>,
    /// The graph type that declares this field (the owning selection set's type).
    pub source_graph_type: Option<String>,
    /// The declared return type.
    pub field_type: Option<TypeExpression>,
    /// The named graph type the field resolves to.
    pub graph_type: Option<String>,
    /// Result of evaluating `@skip` and `@include`.
    pub is_included: bool,
}

impl FieldPart {
    /// The key this field is written under in the response.
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An inline fragment. Children: directives, selection set.
#[derive(Debug, Clone)]
pub struct InlineFragmentPart {
    pub type_condition: Option<String>,
    pub is_included: bool,
}

/// A fragment spread. Children: directives.
#[derive(Debug, Clone)]
pub struct FragmentSpreadPart {
    pub fragment_name: String,
    /// The named fragment this spread targets, if one is defined.
    pub fragment: Option<DocumentPartId>,
    pub is_included: bool,
}

/// A named fragment definition. Children: directives, selection set.
#[derive(Debug, Clone)]
pub struct NamedFragmentPart {
    pub name: String,
    pub type_condition: String,
}
