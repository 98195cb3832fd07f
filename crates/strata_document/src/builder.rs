//! Builds a [`QueryDocument`] from a parsed syntax tree and a schema.

use crate::document::QueryDocument;
use crate::part::{
    DirectivePart, DocumentPartId, FieldPart, FieldSelectionSetPart, FragmentSpreadPart,
    InlineFragmentPart, InputArgumentPart, NamedFragmentPart, OperationPart, PartData,
    SuppliedValuePart, VariablePart,
};
use crate::value::SuppliedValue;
use indexmap::IndexMap;
use strata_core::{GraphMessageCollection, Interner, LineIndex, Span};
use strata_schema::{GraphType, InputValueDefinition, Schema, TypeExpression, TYPENAME_FIELD};
use strata_syntax::ast;
use strata_syntax::{DirectiveLocation, OperationType};
use tracing::trace;

/// Builds query documents against one schema.
#[derive(Debug, Clone)]
pub struct DocumentBuilder<'s> {
    schema: &'s Schema,
    variables: Option<&'s serde_json::Map<String, serde_json::Value>>,
}

impl<'s> DocumentBuilder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            variables: None,
        }
    }

    /// Supplies variable values used to evaluate `@skip` and `@include`.
    #[must_use]
    pub fn with_variables(mut self, variables: &'s serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Parses `source` and builds the document.
    ///
    /// Returns the syntax error messages if the source does not parse.
    pub fn build(&self, source: &str) -> Result<QueryDocument, GraphMessageCollection> {
        let interner = Interner::new();
        let parsed = strata_syntax::parse(source, &interner);
        if !parsed.is_ok() {
            return Err(parsed.messages);
        }
        Ok(self.build_from_ast(&parsed.document, &interner, &parsed.line_index))
    }

    /// Builds the document from an already parsed syntax tree.
    pub fn build_from_ast(
        &self,
        document: &ast::Document<'_>,
        interner: &Interner,
        line_index: &LineIndex,
    ) -> QueryDocument {
        let mut assembly = Assembly {
            schema: self.schema,
            variables: self.variables,
            interner,
            line_index,
            document: QueryDocument::new(document.span),
            spreads: Vec::new(),
        };

        let root = assembly.document.root();
        for definition in &document.definitions {
            match definition {
                ast::Definition::Operation(op) => assembly.add_operation(root, op),
                ast::Definition::Fragment(fragment) => assembly.add_named_fragment(root, fragment),
            }
        }
        assembly.link_spreads();

        trace!(parts = assembly.document.len(), "query document built");
        assembly.document
    }
}

/// Converts a syntax type reference into a schema type expression.
pub fn type_expression(ty: &ast::Type, interner: &Interner) -> TypeExpression {
    match ty {
        ast::Type::Named(name) => TypeExpression::Named(interner.get(name.value)),
        ast::Type::List(inner, _) => TypeExpression::list(type_expression(inner, interner)),
        ast::Type::NonNull(inner, _) => {
            TypeExpression::NonNull(Box::new(type_expression(inner, interner)))
        }
    }
}

struct Assembly<'b> {
    schema: &'b Schema,
    variables: Option<&'b serde_json::Map<String, serde_json::Value>>,
    interner: &'b Interner,
    line_index: &'b LineIndex,
    document: QueryDocument,
    spreads: Vec<DocumentPartId>,
}

impl Assembly<'_> {
    fn add(&mut self, parent: DocumentPartId, data: PartData, span: Span) -> DocumentPartId {
        let location = self.line_index.span_start(span);
        self.document.add_part(parent, data, span, location)
    }

    fn name(&self, name: &ast::Name) -> String {
        self.interner.get(name.value)
    }

    /// Returns the type name if the schema knows a composite type by that name.
    fn composite(&self, name: &str) -> Option<String> {
        self.schema
            .find_graph_type(name)
            .filter(|ty| ty.is_composite())
            .map(|_| name.to_string())
    }

    fn add_operation(&mut self, parent: DocumentPartId, op: &ast::OperationDefinition<'_>) {
        let root_type = self
            .schema
            .root_type_name(op.operation)
            .map(str::to_string);
        let data = PartData::Operation(OperationPart {
            operation_type: op.operation,
            name: op.name.as_ref().map(|n| self.name(n)),
            root_type: root_type.clone(),
        });
        let id = self.add(parent, data, op.span);

        let variables = self.add(id, PartData::VariableCollection, op.span);
        for variable in &op.variables {
            self.add_variable(variables, variable);
        }

        let location = match op.operation {
            OperationType::Query => DirectiveLocation::Query,
            OperationType::Mutation => DirectiveLocation::Mutation,
            OperationType::Subscription => DirectiveLocation::Subscription,
        };
        self.add_directives(id, &op.directives, location);
        self.add_selection_set(id, &op.selection_set, root_type);
    }

    fn add_variable(&mut self, parent: DocumentPartId, variable: &ast::VariableDefinition<'_>) {
        let type_expression = type_expression(&variable.ty, self.interner);
        let data = PartData::Variable(VariablePart {
            name: self.name(&variable.name),
            type_expression: type_expression.clone(),
            has_default: variable.default_value.is_some(),
        });
        let id = self.add(parent, data, variable.span);

        if let Some(default) = &variable.default_value {
            self.add_value(id, default, Some(type_expression));
        }
        self.add_directives(id, &variable.directives, DirectiveLocation::VariableDefinition);
    }

    fn add_named_fragment(&mut self, parent: DocumentPartId, fragment: &ast::FragmentDefinition<'_>) {
        let type_condition = self.name(&fragment.type_condition);
        let graph_type = self.composite(&type_condition);
        let data = PartData::NamedFragment(NamedFragmentPart {
            name: self.name(&fragment.name),
            type_condition,
        });
        let id = self.add(parent, data, fragment.span);

        self.add_directives(id, &fragment.directives, DirectiveLocation::FragmentDefinition);
        self.add_selection_set(id, &fragment.selection_set, graph_type);
    }

    fn add_selection_set(
        &mut self,
        parent: DocumentPartId,
        set: &ast::SelectionSet<'_>,
        graph_type: Option<String>,
    ) {
        let data = PartData::FieldSelectionSet(FieldSelectionSetPart {
            graph_type: graph_type.clone(),
        });
        let id = self.add(parent, data, set.span);

        for selection in &set.selections {
            match selection {
                ast::Selection::Field(field) => self.add_field(id, field, graph_type.as_deref()),
                ast::Selection::InlineFragment(inline) => {
                    self.add_inline_fragment(id, inline, graph_type.as_deref());
                }
                ast::Selection::FragmentSpread(spread) => self.add_fragment_spread(id, spread),
            }
        }
    }

    fn add_field(
        &mut self,
        parent: DocumentPartId,
        field: &ast::FieldSelection<'_>,
        source_graph_type: Option<&str>,
    ) {
        let name = self.name(&field.name);
        let schema = self.schema;

        let (field_type, arguments) = if name == TYPENAME_FIELD {
            let ty = TypeExpression::non_null(TypeExpression::named("String"));
            (source_graph_type.map(|_| ty), None)
        } else {
            let definition = source_graph_type.and_then(|ty| schema.find_field(ty, &name));
            (
                definition.map(|d| d.ty.clone()),
                definition.map(|d| &d.arguments),
            )
        };
        let graph_type = field_type.as_ref().map(|ty| ty.type_name().to_string());

        let data = PartData::Field(FieldPart {
            alias: field.alias.as_ref().map(|a| self.name(a)),
            name,
            source_graph_type: source_graph_type.map(str::to_string),
            field_type,
            graph_type: graph_type.clone(),
            is_included: self.is_included(&field.directives),
        });
        let id = self.add(parent, data, field.span);

        self.add_arguments(id, &field.arguments, arguments);
        self.add_directives(id, &field.directives, DirectiveLocation::Field);
        if let Some(set) = &field.selection_set {
            let child_type = graph_type.and_then(|ty| self.composite(&ty));
            self.add_selection_set(id, set, child_type);
        }
    }

    fn add_inline_fragment(
        &mut self,
        parent: DocumentPartId,
        inline: &ast::InlineFragment<'_>,
        parent_graph_type: Option<&str>,
    ) {
        let type_condition = inline.type_condition.as_ref().map(|n| self.name(n));
        let graph_type = match &type_condition {
            Some(condition) => self.composite(condition),
            None => parent_graph_type.map(str::to_string),
        };
        let data = PartData::InlineFragment(InlineFragmentPart {
            type_condition,
            is_included: self.is_included(&inline.directives),
        });
        let id = self.add(parent, data, inline.span);

        self.add_directives(id, &inline.directives, DirectiveLocation::InlineFragment);
        self.add_selection_set(id, &inline.selection_set, graph_type);
    }

    fn add_fragment_spread(&mut self, parent: DocumentPartId, spread: &ast::FragmentSpread<'_>) {
        let data = PartData::FragmentSpread(FragmentSpreadPart {
            fragment_name: self.name(&spread.name),
            fragment: None,
            is_included: self.is_included(&spread.directives),
        });
        let id = self.add(parent, data, spread.span);
        self.spreads.push(id);

        self.add_directives(id, &spread.directives, DirectiveLocation::FragmentSpread);
    }

    fn add_directives(
        &mut self,
        parent: DocumentPartId,
        directives: &[ast::Directive<'_>],
        location: DirectiveLocation,
    ) {
        let schema = self.schema;
        for directive in directives {
            let name = self.name(&directive.name);
            let arguments = schema.find_directive(&name).map(|d| &d.arguments);
            let id = self.add(
                parent,
                PartData::Directive(DirectivePart { name, location }),
                directive.span,
            );
            self.add_arguments(id, &directive.arguments, arguments);
        }
    }

    fn add_arguments(
        &mut self,
        parent: DocumentPartId,
        arguments: &[ast::Argument<'_>],
        definitions: Option<&IndexMap<String, InputValueDefinition>>,
    ) {
        for argument in arguments {
            let name = self.name(&argument.name);
            let expected_type = definitions
                .and_then(|defs| defs.get(&name))
                .filter(|def| !def.is_internal)
                .map(|def| def.ty.clone());
            self.add_argument(parent, name, &argument.value, expected_type, argument.span);
        }
    }

    fn add_argument(
        &mut self,
        parent: DocumentPartId,
        name: String,
        value: &ast::Value<'_>,
        expected_type: Option<TypeExpression>,
        span: Span,
    ) {
        let data = PartData::InputArgument(InputArgumentPart {
            name,
            expected_type: expected_type.clone(),
        });
        let id = self.add(parent, data, span);
        self.add_value(id, value, expected_type);
    }

    fn add_value(
        &mut self,
        parent: DocumentPartId,
        value: &ast::Value<'_>,
        expected_type: Option<TypeExpression>,
    ) -> DocumentPartId {
        let supplied = match value {
            ast::Value::Variable(name) => SuppliedValue::Variable(self.name(name)),
            ast::Value::Int(text, _) => SuppliedValue::int(*text),
            ast::Value::Float(text, _) => SuppliedValue::float(*text),
            ast::Value::String(text, _) => SuppliedValue::string(text.clone()),
            ast::Value::Boolean(b, _) => SuppliedValue::boolean(*b),
            ast::Value::Null(_) => SuppliedValue::Null,
            ast::Value::Enum(name) => SuppliedValue::Enum(self.name(name)),
            ast::Value::List(..) => SuppliedValue::List,
            ast::Value::Object(..) => SuppliedValue::Complex,
        };
        let data = PartData::SuppliedValue(SuppliedValuePart {
            value: supplied,
            expected_type: expected_type.clone(),
        });
        let id = self.add(parent, data, value.span());

        match value {
            ast::Value::List(items, _) => {
                let item_type = expected_type.as_ref().and_then(|ty| ty.list_item()).cloned();
                for item in items {
                    self.add_value(id, item, item_type.clone());
                }
            }
            ast::Value::Object(fields, _) => {
                let schema = self.schema;
                let input_fields = expected_type
                    .as_ref()
                    .and_then(|ty| schema.find_graph_type(ty.type_name()))
                    .and_then(|ty| match ty {
                        GraphType::InputObject(input) => Some(&input.fields),
                        _ => None,
                    });
                for field in fields {
                    let name = self.name(&field.name);
                    let field_type = input_fields
                        .and_then(|defs| defs.get(&name))
                        .map(|def| def.ty.clone());
                    self.add_argument(id, name, &field.value, field_type, field.span);
                }
            }
            _ => {}
        }

        id
    }

    /// Evaluates `@skip(if:)` and `@include(if:)`. Conditions that cannot be resolved leave
    /// the selection included.
    fn is_included(&self, directives: &[ast::Directive<'_>]) -> bool {
        for directive in directives {
            let name = self.interner.get(directive.name.value);
            let Some(condition) = directive
                .arguments
                .iter()
                .find(|arg| self.interner.is(arg.name.value, "if"))
                .and_then(|arg| self.evaluate_condition(&arg.value))
            else {
                continue;
            };
            match name.as_str() {
                "skip" if condition => return false,
                "include" if !condition => return false,
                _ => {}
            }
        }
        true
    }

    fn evaluate_condition(&self, value: &ast::Value<'_>) -> Option<bool> {
        match value {
            ast::Value::Boolean(b, _) => Some(*b),
            ast::Value::Variable(name) => self
                .variables
                .and_then(|vars| vars.get(&self.interner.get(name.value)))
                .and_then(serde_json::Value::as_bool),
            _ => None,
        }
    }

    fn link_spreads(&mut self) {
        for spread in std::mem::take(&mut self.spreads) {
            let target = self
                .document
                .fragment_spread(spread)
                .and_then(|s| self.document.find_fragment(&s.fragment_name));
            if let PartData::FragmentSpread(data) = self.document.data_mut(spread) {
                data.fragment = target;
            }
        }
    }
}
