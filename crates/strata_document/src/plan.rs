//! Query planning.
//!
//! A plan is the executable view of one operation: fields merged by response key, arguments
//! resolved to JSON and nested selections flattened through fragments.

use crate::document::QueryDocument;
use crate::part::{DocumentPartId, DocumentPartKind, PartData};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use strata_schema::{Schema, TypeExpression};
use strata_syntax::OperationType;
use thiserror::Error;

/// Query planner configuration.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// Maximum selection depth. `None` means unlimited.
    pub max_depth: Option<usize>,
}

/// The query planner.
#[derive(Debug, Default)]
pub struct QueryPlanner {
    config: PlannerConfig,
}

impl QueryPlanner {
    /// Creates a new query planner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query planner with configuration.
    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Plans one operation of `document`.
    ///
    /// `operation_name` selects the operation; without it the document must hold exactly one.
    /// Variables missing from `variables` fall back to their declared default.
    pub fn plan(
        &self,
        schema: &Schema,
        document: &QueryDocument,
        operation_name: Option<&str>,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<QueryPlan, PlanError> {
        let operation_id = match (operation_name, document.operations().len()) {
            (_, 0) => return Err(PlanError::NoOperations),
            (Some(name), _) => document
                .find_operation(Some(name))
                .ok_or_else(|| PlanError::OperationNotFound(name.to_string()))?,
            (None, 1) => document.operations()[0],
            (None, count) => return Err(PlanError::AmbiguousOperation(count)),
        };
        let Some(operation) = document.operation(operation_id) else {
            return Err(PlanError::OperationNotFound(
                operation_name.unwrap_or_default().to_string(),
            ));
        };
        let root_type = operation
            .root_type
            .clone()
            .ok_or(PlanError::MissingRootType(operation.operation_type))?;

        let variables = resolve_variables(document, operation_id, variables);
        let planning = Planning {
            schema,
            document,
            variables: &variables,
            max_depth: self.config.max_depth,
            operation_type: operation.operation_type,
        };
        let steps = match document.child_selection_set(operation_id) {
            Some(set) => planning.plan_selection(&[set], 1)?,
            None => Vec::new(),
        };

        Ok(QueryPlan {
            operation_type: operation.operation_type,
            operation_name: operation.name.clone(),
            root_type,
            variables,
            steps,
        })
    }
}

/// A planned operation.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub operation_type: OperationType,
    pub operation_name: Option<String>,
    pub root_type: String,
    /// Variables after defaults were applied.
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<FieldStep>,
}

impl QueryPlan {
    /// The root field of a subscription plan.
    ///
    /// Subscriptions select exactly one root field, so this is the first step.
    #[must_use]
    pub fn subscription_root(&self) -> Option<&FieldStep> {
        match self.operation_type {
            OperationType::Subscription => self.steps.first(),
            _ => None,
        }
    }

    /// Total number of steps, nested ones included.
    #[must_use]
    pub fn step_count(&self) -> usize {
        fn count(steps: &[FieldStep]) -> usize {
            steps.iter().map(|s| 1 + count(&s.children)).sum()
        }
        count(&self.steps)
    }
}

/// One field to resolve.
#[derive(Debug, Clone, Serialize)]
pub struct FieldStep {
    /// The key the value is written under (alias or field name).
    pub response_key: String,
    pub field_name: String,
    /// The graph type declaring the field.
    pub source_graph_type: String,
    pub type_expression: Option<TypeExpression>,
    /// The concrete type the field applies to, when selected through a narrowing fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_condition: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub arguments: serde_json::Map<String, serde_json::Value>,
    /// The routing event name of a subscription root field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldStep>,
}

/// Plan generation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("document contains no operations")]
    NoOperations,
    #[error("operation `{0}` was not found")]
    OperationNotFound(String),
    #[error("document contains {0} operations, an operation name is required")]
    AmbiguousOperation(usize),
    #[error("schema declares no root type for {0} operations")]
    MissingRootType(OperationType),
    #[error("selection depth exceeds the limit of {0}")]
    DepthExceeded(usize),
}

fn resolve_variables(
    document: &QueryDocument,
    operation: DocumentPartId,
    supplied: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut resolved = supplied.clone();
    let Some(collection) = document.first_child_of_kind(operation, DocumentPartKind::VariableCollection)
    else {
        return resolved;
    };
    for &variable in document.children_of_kind(collection, DocumentPartKind::Variable) {
        let PartData::Variable(data) = &document.part(variable).data else {
            continue;
        };
        if resolved.contains_key(&data.name) {
            continue;
        }
        if let Some(default) = document.first_child_of_kind(variable, DocumentPartKind::SuppliedValue) {
            let value = document.value_to_json(default, supplied);
            resolved.insert(data.name.clone(), value);
        }
    }
    resolved
}

struct Planning<'p> {
    schema: &'p Schema,
    document: &'p QueryDocument,
    variables: &'p serde_json::Map<String, serde_json::Value>,
    max_depth: Option<usize>,
    operation_type: OperationType,
}

impl Planning<'_> {
    /// Plans the merged fields of one or more selection sets that share a response position.
    fn plan_selection(
        &self,
        sets: &[DocumentPartId],
        depth: usize,
    ) -> Result<Vec<FieldStep>, PlanError> {
        if let Some(max) = self.max_depth {
            if depth > max {
                return Err(PlanError::DepthExceeded(max));
            }
        }

        // (response key, type condition) -> field parts
        let mut grouped: IndexMap<(String, Option<String>), Vec<DocumentPartId>> = IndexMap::new();
        for &set in sets {
            let mut fields = Vec::new();
            let mut seen = FxHashSet::default();
            self.collect(set, None, &mut seen, &mut fields);
            for (field, condition) in fields {
                if let Some(data) = self.document.field(field) {
                    grouped
                        .entry((data.output_name().to_string(), condition))
                        .or_default()
                        .push(field);
                }
            }
        }

        let mut steps = Vec::with_capacity(grouped.len());
        for ((response_key, type_condition), fields) in grouped {
            let first = fields[0];
            let Some(data) = self.document.field(first) else {
                continue;
            };
            let source_graph_type = data.source_graph_type.clone().unwrap_or_default();
            let event_name = match (self.operation_type, depth) {
                (OperationType::Subscription, 1) => self
                    .schema
                    .find_field(&source_graph_type, &data.name)
                    .map(|f| f.event_name().to_string()),
                _ => None,
            };
            let child_sets: Vec<_> = fields
                .iter()
                .filter_map(|&f| self.document.child_selection_set(f))
                .collect();
            let children = if child_sets.is_empty() {
                Vec::new()
            } else {
                self.plan_selection(&child_sets, depth + 1)?
            };

            steps.push(FieldStep {
                response_key,
                field_name: data.name.clone(),
                source_graph_type,
                type_expression: data.field_type.clone(),
                type_condition,
                arguments: self.document.arguments_to_json(first, self.variables),
                event_name,
                children,
            });
        }
        Ok(steps)
    }

    /// Collects included fields with the type condition they were selected under.
    fn collect(
        &self,
        set: DocumentPartId,
        condition: Option<&str>,
        seen: &mut FxHashSet<DocumentPartId>,
        out: &mut Vec<(DocumentPartId, Option<String>)>,
    ) {
        let set_type = self
            .document
            .selection_set(set)
            .and_then(|s| s.graph_type.as_deref());

        for &child in self.document.children(set) {
            match &self.document.part(child).data {
                PartData::Field(field) if field.is_included => {
                    out.push((child, condition.map(str::to_string)));
                }
                PartData::InlineFragment(inline) if inline.is_included => {
                    let narrowed = narrow(condition, set_type, inline.type_condition.as_deref());
                    if let Some(inner) = self.document.child_selection_set(child) {
                        self.collect(inner, narrowed, seen, out);
                    }
                }
                PartData::FragmentSpread(spread) if spread.is_included => {
                    let Some(fragment) = spread.fragment else { continue };
                    if !seen.insert(fragment) {
                        continue;
                    }
                    let type_condition = self
                        .document
                        .named_fragment(fragment)
                        .map(|f| f.type_condition.as_str());
                    let narrowed = narrow(condition, set_type, type_condition);
                    if let Some(inner) = self.document.child_selection_set(fragment) {
                        self.collect(inner, narrowed, seen, out);
                    }
                }
                _ => {}
            }
        }
    }
}

/// A fragment narrows the selection only when its condition differs from the enclosing type.
fn narrow<'a>(
    current: Option<&'a str>,
    set_type: Option<&str>,
    fragment_condition: Option<&'a str>,
) -> Option<&'a str> {
    match fragment_condition {
        Some(condition) if Some(condition) != set_type => Some(condition),
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DocumentBuilder;
    use strata_schema::{FieldDefinition, InputValueDefinition, InterfaceType, ObjectType, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .add_type(
                ObjectType::new("Query")
                    .field(
                        FieldDefinition::new("hero", "Character".parse().unwrap()).argument(
                            InputValueDefinition::new("episode", "Int".parse().unwrap()),
                        ),
                    ),
            )
            .add_type(
                ObjectType::new("Subscription").field(
                    FieldDefinition::new("reviewAdded", "Human".parse().unwrap())
                        .with_event_name("REVIEW_ADDED"),
                ),
            )
            .add_type(
                InterfaceType::new("Character")
                    .field(FieldDefinition::new("name", "String".parse().unwrap())),
            )
            .add_type(
                ObjectType::new("Human")
                    .implements("Character")
                    .field(FieldDefinition::new("name", "String".parse().unwrap()))
                    .field(FieldDefinition::new("height", "Float".parse().unwrap())),
            )
            .build()
            .unwrap()
    }

    fn plan(source: &str, operation: Option<&str>) -> Result<QueryPlan, PlanError> {
        let schema = schema();
        let document = DocumentBuilder::new(&schema).build(source).unwrap();
        QueryPlanner::new().plan(&schema, &document, operation, &serde_json::Map::new())
    }

    #[test]
    fn test_plan_merges_by_response_key() {
        let plan = plan(
            "query ($ep: Int = 4) { hero(episode: $ep) { name } hero(episode: $ep) { ...N } } fragment N on Character { name }",
            None,
        )
        .unwrap();

        assert_eq!(plan.root_type, "Query");
        assert_eq!(plan.steps.len(), 1);
        let hero = &plan.steps[0];
        assert_eq!(hero.arguments["episode"], serde_json::json!(4));
        assert_eq!(hero.children.len(), 1);
        assert_eq!(hero.children[0].response_key, "name");
        assert_eq!(plan.step_count(), 2);
    }

    #[test]
    fn test_plan_records_type_conditions() {
        let plan = plan("{ hero { name ... on Human { height } ... on Character { name } } }", None).unwrap();

        let children = &plan.steps[0].children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].type_condition, None);
        assert_eq!(children[1].response_key, "height");
        assert_eq!(children[1].type_condition.as_deref(), Some("Human"));
    }

    #[test]
    fn test_plan_operation_selection() {
        let source = "query A { hero { name } } query B { hero { name } }";
        assert_eq!(plan(source, None).unwrap_err(), PlanError::AmbiguousOperation(2));
        assert_eq!(
            plan(source, Some("C")).unwrap_err(),
            PlanError::OperationNotFound("C".to_string())
        );
        assert_eq!(plan(source, Some("B")).unwrap().operation_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_subscription_root_event_name() {
        let plan = plan("subscription { reviewAdded { name } }", None).unwrap();
        let root = plan.subscription_root().unwrap();
        assert_eq!(root.field_name, "reviewAdded");
        assert_eq!(root.event_name.as_deref(), Some("REVIEW_ADDED"));
        assert!(root.children[0].event_name.is_none());
    }

    #[test]
    fn test_plan_missing_root_type() {
        assert_eq!(
            plan("mutation { hero { name } }", None).unwrap_err(),
            PlanError::MissingRootType(OperationType::Mutation)
        );
    }

    #[test]
    fn test_plan_depth_limit() {
        let schema = schema();
        let document = DocumentBuilder::new(&schema)
            .build("{ hero { name } }")
            .unwrap();
        let planner = QueryPlanner::with_config(PlannerConfig { max_depth: Some(1) });
        assert_eq!(
            planner
                .plan(&schema, &document, None, &serde_json::Map::new())
                .unwrap_err(),
            PlanError::DepthExceeded(1)
        );
    }
}
