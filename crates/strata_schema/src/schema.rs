//! The schema catalog.

use crate::error::{SchemaError, SchemaResult};
use crate::type_expression::TypeExpression;
use crate::types::{
    DirectiveDefinition, FieldDefinition, GraphType, InputValueDefinition, ScalarType,
};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_syntax::{DirectiveLocation, OperationType};

/// Names of the built-in scalars.
pub const BUILT_IN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// The meta field available on every composite type.
pub const TYPENAME_FIELD: &str = "__typename";

/// Controls what is written to clients when a result is serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOptions {
    /// Include exception detail on error messages.
    pub expose_exceptions: bool,
    /// Include execution metrics under `extensions`.
    pub expose_metrics: bool,
}

impl ResponseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exposes exception detail.
    #[must_use]
    pub fn with_exceptions(mut self) -> Self {
        self.expose_exceptions = true;
        self
    }

    /// Exposes execution metrics.
    #[must_use]
    pub fn with_metrics(mut self) -> Self {
        self.expose_metrics = true;
        self
    }
}

/// A read-only catalog of graph types, fields, arguments and directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub name: String,
    #[serde(rename = "query", skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(rename = "mutation", skip_serializing_if = "Option::is_none")]
    pub mutation_type: Option<String>,
    #[serde(rename = "subscription", skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, GraphType>,
    pub directives: IndexMap<String, DirectiveDefinition>,
    pub options: ResponseOptions,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            query_type: None,
            mutation_type: None,
            subscription_type: None,
            types: IndexMap::new(),
            directives: IndexMap::new(),
            options: ResponseOptions::default(),
        }
    }
}

impl Schema {
    /// Loads a schema from its JSON representation.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        SchemaBuilder::from_schema(schema).build()
    }

    /// Loads a schema from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Finds a graph type by name.
    #[must_use]
    pub fn find_graph_type(&self, name: &str) -> Option<&GraphType> {
        self.types.get(name)
    }

    /// Finds a directive by name.
    #[must_use]
    pub fn find_directive(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directives.get(name)
    }

    /// Returns the root type name for an operation type.
    #[must_use]
    pub fn root_type_name(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => self.query_type.as_deref(),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Returns the root type for an operation type.
    #[must_use]
    pub fn root_type(&self, operation: OperationType) -> Option<&GraphType> {
        self.root_type_name(operation)
            .and_then(|name| self.find_graph_type(name))
    }

    /// Finds a field declared on an object or interface.
    #[must_use]
    pub fn find_field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.find_graph_type(type_name)
            .and_then(|ty| ty.find_field(field_name))
    }

    /// Expands a type into the concrete object types it may resolve to.
    ///
    /// Objects expand to themselves, unions to their members and interfaces to every object
    /// implementing them. Leaf and input types expand to nothing.
    #[must_use]
    pub fn expand_abstract_type(&self, name: &str) -> Vec<&str> {
        match self.find_graph_type(name) {
            Some(GraphType::Object(object)) => vec![object.name.as_str()],
            Some(GraphType::Union(union)) => union
                .members
                .iter()
                .filter(|member| matches!(self.find_graph_type(member), Some(GraphType::Object(_))))
                .map(String::as_str)
                .collect(),
            Some(GraphType::Interface(_)) => self
                .types
                .values()
                .filter_map(|ty| match ty {
                    GraphType::Object(object) if object.implements.iter().any(|i| i == name) => {
                        Some(object.name.as_str())
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if an object of type `concrete` may be returned where `ty` is expected.
    #[must_use]
    pub fn is_possible_type(&self, ty: &str, concrete: &str) -> bool {
        self.expand_abstract_type(ty).contains(&concrete)
    }

    /// Returns true if the two types share at least one concrete object type.
    #[must_use]
    pub fn types_can_overlap(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let left: FxHashSet<&str> = self.expand_abstract_type(a).into_iter().collect();
        self.expand_abstract_type(b)
            .into_iter()
            .any(|ty| left.contains(ty))
    }

    /// Returns true if the expression names a type usable as an input.
    #[must_use]
    pub fn is_input_expression(&self, expr: &TypeExpression) -> bool {
        self.find_graph_type(expr.type_name())
            .is_some_and(GraphType::is_input_type)
    }
}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    #[must_use]
    pub fn new() -> Self {
        Self::from_schema(Schema::default())
    }

    /// Continues building from an existing (for example deserialized) schema.
    #[must_use]
    pub fn from_schema(schema: Schema) -> Self {
        Self { schema }
    }

    /// Sets the schema name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.schema.name = name.into();
        self
    }

    /// Sets the query type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Sets the response exposure options.
    #[must_use]
    pub fn options(mut self, options: ResponseOptions) -> Self {
        self.schema.options = options;
        self
    }

    /// Adds a type.
    #[must_use]
    pub fn add_type(mut self, graph_type: impl Into<GraphType>) -> Self {
        let graph_type = graph_type.into();
        self.schema
            .types
            .insert(graph_type.name().to_string(), graph_type);
        self
    }

    /// Adds a directive definition.
    #[must_use]
    pub fn add_directive(mut self, directive: DirectiveDefinition) -> Self {
        self.schema
            .directives
            .insert(directive.name.clone(), directive);
        self
    }

    /// Builds the schema, registering built-ins and checking every type reference.
    pub fn build(mut self) -> SchemaResult<Schema> {
        self.register_built_ins();
        self.normalize_names();
        self.infer_root_types();

        let schema = self.schema;
        check_references(&schema)?;
        Ok(schema)
    }

    fn register_built_ins(&mut self) {
        for name in BUILT_IN_SCALARS {
            self.schema
                .types
                .entry(name.to_string())
                .or_insert_with(|| GraphType::Scalar(ScalarType::new(name)));
        }

        let if_argument = || {
            InputValueDefinition::new("if", TypeExpression::non_null(TypeExpression::named("Boolean")))
        };
        let conditional_locations = || {
            vec![
                DirectiveLocation::Field,
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ]
        };

        let built_ins = [
            DirectiveDefinition::new("skip", conditional_locations()).argument(if_argument()),
            DirectiveDefinition::new("include", conditional_locations()).argument(if_argument()),
            DirectiveDefinition::new(
                "deprecated",
                vec![
                    DirectiveLocation::FieldDefinition,
                    DirectiveLocation::ArgumentDefinition,
                    DirectiveLocation::InputFieldDefinition,
                    DirectiveLocation::EnumValue,
                ],
            )
            .argument(
                InputValueDefinition::new("reason", TypeExpression::named("String"))
                    .with_default(serde_json::json!("No longer supported")),
            ),
            DirectiveDefinition::new("specifiedBy", vec![DirectiveLocation::Scalar]).argument(
                InputValueDefinition::new("url", TypeExpression::non_null(TypeExpression::named("String"))),
            ),
        ];

        for directive in built_ins {
            self.schema
                .directives
                .entry(directive.name.clone())
                .or_insert(directive);
        }
    }

    /// Fills in names left implicit by map keys in the JSON form.
    fn normalize_names(&mut self) {
        for (name, ty) in &mut self.schema.types {
            ty.set_name(name);
            match ty {
                GraphType::Object(t) => name_fields(&mut t.fields),
                GraphType::Interface(t) => name_fields(&mut t.fields),
                GraphType::InputObject(t) => name_values(&mut t.fields),
                _ => {}
            }
        }
        for (name, directive) in &mut self.schema.directives {
            if directive.name.is_empty() {
                directive.name.clone_from(name);
            }
            name_values(&mut directive.arguments);
        }
    }

    fn infer_root_types(&mut self) {
        let schema = &mut self.schema;
        for (slot, conventional) in [
            (&mut schema.query_type, "Query"),
            (&mut schema.mutation_type, "Mutation"),
            (&mut schema.subscription_type, "Subscription"),
        ] {
            if slot.is_none() && schema.types.contains_key(conventional) {
                *slot = Some(conventional.to_string());
            }
        }
    }
}

impl From<crate::types::ObjectType> for GraphType {
    fn from(value: crate::types::ObjectType) -> Self {
        Self::Object(value)
    }
}

impl From<crate::types::InterfaceType> for GraphType {
    fn from(value: crate::types::InterfaceType) -> Self {
        Self::Interface(value)
    }
}

impl From<crate::types::UnionType> for GraphType {
    fn from(value: crate::types::UnionType) -> Self {
        Self::Union(value)
    }
}

impl From<crate::types::EnumType> for GraphType {
    fn from(value: crate::types::EnumType) -> Self {
        Self::Enum(value)
    }
}

impl From<crate::types::InputObjectType> for GraphType {
    fn from(value: crate::types::InputObjectType) -> Self {
        Self::InputObject(value)
    }
}

impl From<ScalarType> for GraphType {
    fn from(value: ScalarType) -> Self {
        Self::Scalar(value)
    }
}

fn name_fields(fields: &mut IndexMap<String, FieldDefinition>) {
    for (name, field) in fields {
        if field.name.is_empty() {
            field.name.clone_from(name);
        }
        name_values(&mut field.arguments);
    }
}

fn name_values(values: &mut IndexMap<String, InputValueDefinition>) {
    for (name, value) in values {
        if value.name.is_empty() {
            value.name.clone_from(name);
        }
    }
}

fn check_references(schema: &Schema) -> SchemaResult<()> {
    let query = schema
        .query_type
        .as_deref()
        .ok_or(SchemaError::MissingQueryType)?;

    for (root, usage) in [
        (Some(query), "the query root"),
        (schema.mutation_type.as_deref(), "the mutation root"),
        (schema.subscription_type.as_deref(), "the subscription root"),
    ] {
        let Some(root) = root else { continue };
        match schema.find_graph_type(root) {
            Some(GraphType::Object(_)) => {}
            Some(_) => {
                return Err(SchemaError::InvalidTypeUsage {
                    type_name: root.to_string(),
                    usage: usage.to_string(),
                })
            }
            None => {
                return Err(SchemaError::UnknownType {
                    type_name: root.to_string(),
                    referenced_by: usage.to_string(),
                })
            }
        }
    }

    let require = |type_name: &str, referenced_by: String, input: bool| -> SchemaResult<()> {
        let ty = schema
            .find_graph_type(type_name)
            .ok_or_else(|| SchemaError::UnknownType {
                type_name: type_name.to_string(),
                referenced_by: referenced_by.clone(),
            })?;
        let valid = if input {
            ty.is_input_type()
        } else {
            ty.is_output_type()
        };
        if valid {
            Ok(())
        } else {
            Err(SchemaError::InvalidTypeUsage {
                type_name: type_name.to_string(),
                usage: if input {
                    format!("an input type on {referenced_by}")
                } else {
                    format!("an output type on {referenced_by}")
                },
            })
        }
    };

    for ty in schema.types.values() {
        match ty {
            GraphType::Object(_) | GraphType::Interface(_) => {
                for field in ty.fields().into_iter().flat_map(|fields| fields.values()) {
                    let owner = format!("`{}.{}`", ty.name(), field.name);
                    require(field.ty.type_name(), owner.clone(), false)?;
                    for argument in field.arguments.values() {
                        require(argument.ty.type_name(), format!("{owner}({})", argument.name), true)?;
                    }
                }
                let implements = match ty {
                    GraphType::Object(t) => &t.implements,
                    GraphType::Interface(t) => &t.implements,
                    _ => continue,
                };
                for interface in implements {
                    if !matches!(schema.find_graph_type(interface), Some(GraphType::Interface(_))) {
                        return Err(SchemaError::UnknownType {
                            type_name: interface.clone(),
                            referenced_by: format!("`{}` implements", ty.name()),
                        });
                    }
                }
            }
            GraphType::Union(union) => {
                for member in &union.members {
                    if !matches!(schema.find_graph_type(member), Some(GraphType::Object(_))) {
                        return Err(SchemaError::InvalidTypeUsage {
                            type_name: member.clone(),
                            usage: format!("a member of union `{}`", union.name),
                        });
                    }
                }
            }
            GraphType::InputObject(input) => {
                for field in input.fields.values() {
                    require(
                        field.ty.type_name(),
                        format!("`{}.{}`", input.name, field.name),
                        true,
                    )?;
                }
            }
            GraphType::Scalar(_) | GraphType::Enum(_) => {}
        }
    }

    for directive in schema.directives.values() {
        for argument in directive.arguments.values() {
            require(
                argument.ty.type_name(),
                format!("`@{}({})`", directive.name, argument.name),
                true,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumType, InterfaceType, ObjectType, UnionType};

    fn starwars() -> Schema {
        SchemaBuilder::new()
            .name("starwars")
            .add_type(EnumType::new("Episode", ["NEWHOPE", "EMPIRE", "JEDI"]))
            .add_type(
                InterfaceType::new("Character")
                    .field(FieldDefinition::new("name", "String!".parse().unwrap())),
            )
            .add_type(
                ObjectType::new("Human")
                    .implements("Character")
                    .field(FieldDefinition::new("name", "String!".parse().unwrap())),
            )
            .add_type(
                ObjectType::new("Droid")
                    .implements("Character")
                    .field(FieldDefinition::new("name", "String!".parse().unwrap())),
            )
            .add_type(ObjectType::new("Starship").field(FieldDefinition::new(
                "name",
                "String!".parse().unwrap(),
            )))
            .add_type(UnionType::new("SearchResult", ["Human", "Starship"]))
            .add_type(
                ObjectType::new("Query").field(
                    FieldDefinition::new("hero", "Character".parse().unwrap()).argument(
                        InputValueDefinition::new("episode", "Episode".parse().unwrap()),
                    ),
                ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_builder() {
        let schema = starwars();
        assert_eq!(schema.name, "starwars");
        assert_eq!(schema.query_type.as_deref(), Some("Query"));
        assert!(schema.mutation_type.is_none());
        assert!(schema.find_graph_type("Int").is_some());
        assert!(schema.find_directive("skip").is_some());
        assert!(schema.find_field("Query", "hero").is_some());
    }

    #[test]
    fn test_expand_abstract_type() {
        let schema = starwars();
        assert_eq!(schema.expand_abstract_type("Character"), vec!["Human", "Droid"]);
        assert_eq!(
            schema.expand_abstract_type("SearchResult"),
            vec!["Human", "Starship"]
        );
        assert_eq!(schema.expand_abstract_type("Droid"), vec!["Droid"]);
        assert!(schema.expand_abstract_type("Episode").is_empty());
    }

    #[test]
    fn test_types_can_overlap() {
        let schema = starwars();
        assert!(schema.types_can_overlap("Character", "Human"));
        assert!(schema.types_can_overlap("Character", "SearchResult"));
        assert!(!schema.types_can_overlap("Droid", "Starship"));
        assert!(!schema.types_can_overlap("Human", "Droid"));
        assert!(schema.types_can_overlap("Droid", "Droid"));
    }

    #[test]
    fn test_unknown_field_type_is_rejected() {
        let result = SchemaBuilder::new()
            .add_type(ObjectType::new("Query").field(FieldDefinition::new(
                "hero",
                "Character".parse().unwrap(),
            )))
            .build();
        assert!(matches!(result, Err(SchemaError::UnknownType { .. })));
    }

    #[test]
    fn test_missing_query_type() {
        let result = SchemaBuilder::new().build();
        assert!(matches!(result, Err(SchemaError::MissingQueryType)));
    }

    #[test]
    fn test_from_json() {
        let schema = Schema::from_json(
            r#"{
                "name": "reviews",
                "options": { "expose_exceptions": true },
                "types": {
                    "Query": { "kind": "OBJECT", "fields": { "ok": { "type": "Boolean" } } },
                    "Subscription": {
                        "kind": "OBJECT",
                        "fields": {
                            "reviewAdded": { "type": "Review", "event_name": "REVIEW_ADDED" }
                        }
                    },
                    "Review": { "kind": "OBJECT", "fields": { "stars": { "type": "Int!" } } }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(schema.subscription_type.as_deref(), Some("Subscription"));
        assert!(schema.options.expose_exceptions);
        let field = schema.find_field("Subscription", "reviewAdded").unwrap();
        assert_eq!(field.name, "reviewAdded");
        assert_eq!(field.event_name(), "REVIEW_ADDED");
        assert_eq!(schema.find_graph_type("Review").unwrap().name(), "Review");
    }
}
