//! State shared by the rules of one validation pass.

use crate::error::InvariantViolation;
use crate::options::ValidationOptions;
use strata_core::{codes, GraphMessage, GraphMessageCollection, RuleReference};
use strata_document::{
    DocumentPart, DocumentPartId, DocumentPartKind, FieldPart, PartData, QueryDocument,
};
use strata_schema::{FieldDefinition, GraphType, InputValueDefinition, Schema};

/// The context handed to each rule: the active part, the schema and the accumulated
/// messages of the pass.
#[derive(Debug)]
pub struct DocumentValidationContext<'a> {
    pub schema: &'a Schema,
    pub document: &'a QueryDocument,
    pub options: &'a ValidationOptions,
    active: DocumentPartId,
    messages: GraphMessageCollection,
}

impl<'a> DocumentValidationContext<'a> {
    pub fn new(
        schema: &'a Schema,
        document: &'a QueryDocument,
        options: &'a ValidationOptions,
    ) -> Self {
        Self {
            schema,
            document,
            options,
            active: document.root(),
            messages: GraphMessageCollection::new(),
        }
    }

    /// The part being validated.
    #[must_use]
    pub fn active_part(&self) -> DocumentPartId {
        self.active
    }

    pub(crate) fn set_active(&mut self, id: DocumentPartId) {
        self.active = id;
    }

    #[must_use]
    pub fn part(&self) -> &'a DocumentPart {
        self.document.part(self.active)
    }

    /// The active part as a field.
    pub fn expect_field(&self) -> Result<&'a FieldPart, InvariantViolation> {
        self.document
            .field(self.active)
            .ok_or(InvariantViolation::UnexpectedPartKind {
                part: self.active,
                expected: DocumentPartKind::Field,
            })
    }

    /// Builds the error for an active part of the wrong kind.
    #[must_use]
    pub fn unexpected(&self, expected: DocumentPartKind) -> InvariantViolation {
        InvariantViolation::UnexpectedPartKind {
            part: self.active,
            expected,
        }
    }

    /// Reports a violation at the active part.
    pub fn report(&mut self, rule: RuleReference, message: impl Into<String>) {
        self.report_at(self.active, rule, message);
    }

    /// Reports a violation at another part.
    pub fn report_at(&mut self, part: DocumentPartId, rule: RuleReference, message: impl Into<String>) {
        self.messages.add(
            GraphMessage::critical(codes::INVALID_DOCUMENT, message)
                .with_location(self.document.location(part))
                .with_rule(rule),
        );
    }

    #[must_use]
    pub fn messages(&self) -> &GraphMessageCollection {
        &self.messages
    }

    pub(crate) fn into_messages(self) -> GraphMessageCollection {
        self.messages
    }

    /// The schema definition of a field part.
    #[must_use]
    pub fn field_definition(&self, field: DocumentPartId) -> Option<&'a FieldDefinition> {
        let field = self.document.field(field)?;
        let source = field.source_graph_type.as_deref()?;
        self.schema.find_field(source, &field.name)
    }

    /// The definition of an input argument: a field or directive argument, or an input object
    /// field when the argument belongs to a complex value.
    ///
    /// Internal field arguments are hidden, as clients may not supply them.
    #[must_use]
    pub fn argument_definition(&self, argument: DocumentPartId) -> Option<&'a InputValueDefinition> {
        let name = self.document.argument_name(argument)?;
        let owner = self.document.parent(argument)?;
        match &self.document.part(owner).data {
            PartData::Field(_) => self.field_definition(owner)?.find_argument(name),
            PartData::Directive(directive) => {
                self.schema.find_directive(&directive.name)?.arguments.get(name)
            }
            PartData::SuppliedValue(value) => {
                let expected = value.expected_type.as_ref()?;
                match self.schema.find_graph_type(expected.type_name())? {
                    GraphType::InputObject(input) => input.fields.get(name),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Describes the owner of arguments for messages, e.g. `field 'Query.hero'`.
    #[must_use]
    pub fn describe_owner(&self, owner: DocumentPartId) -> String {
        match &self.document.part(owner).data {
            PartData::Field(field) => format!(
                "field '{}.{}'",
                field.source_graph_type.as_deref().unwrap_or("?"),
                field.name
            ),
            PartData::Directive(directive) => format!("directive '@{}'", directive.name),
            PartData::SuppliedValue(value) => format!(
                "input object '{}'",
                value
                    .expected_type
                    .as_ref()
                    .map_or("?", |ty| ty.type_name())
            ),
            other => other.kind().to_string(),
        }
    }
}
