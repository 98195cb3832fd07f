//! The contract between the subscription layer and the execution runtime.

use crate::event::SubscriptionEvent;
use crate::pipeline::PreparedQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::{codes, GraphMessage, GraphMessageCollection, PathSegment};
use strata_document::FieldStep;
use strata_schema::{Schema, TYPENAME_FIELD};
use strata_syntax::OperationType;
use strata_validation::complete_value_at;

/// A GraphQL request as carried by `start` and `subscribe` payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty", deserialize_with = "null_as_empty")]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let variables: Option<serde_json::Map<String, serde_json::Value>> =
        Option::deserialize(deserializer)?;
    Ok(variables.unwrap_or_default())
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// What a subscription should do with the result of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    /// Send the result and keep the subscription open.
    #[default]
    Continue,
    /// Send nothing for this event.
    Skip,
    /// Send the result, then complete the subscription.
    Complete,
}

/// The outcome of executing a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub data: Option<serde_json::Value>,
    pub messages: GraphMessageCollection,
    pub metrics: Option<serde_json::Value>,
    pub action: SubscriptionAction,
}

impl ExecutionResult {
    pub fn from_data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// A result carrying only messages, as produced for a rejected document.
    pub fn from_messages(messages: GraphMessageCollection) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: SubscriptionAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Executes prepared queries. Treated as a black box by the subscription layer.
///
/// `event` is set when a subscription is re-executed for a published event.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        schema: &Schema,
        query: &PreparedQuery,
        event: Option<&SubscriptionEvent>,
    ) -> ExecutionResult;
}

/// Resolves plans by projecting JSON source data: the event data for subscriptions and a
/// fixed root value for queries and mutations.
///
/// Each root field value is checked with the value completion rules.
#[derive(Debug, Clone, Default)]
pub struct ProjectionExecutor {
    root_value: Option<serde_json::Value>,
}

impl ProjectionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_root_value(mut self, root: serde_json::Value) -> Self {
        self.root_value = Some(root);
        self
    }
}

#[async_trait]
impl QueryExecutor for ProjectionExecutor {
    async fn execute(
        &self,
        schema: &Schema,
        query: &PreparedQuery,
        event: Option<&SubscriptionEvent>,
    ) -> ExecutionResult {
        let plan = &query.plan;
        let source = match (plan.operation_type, event) {
            (OperationType::Subscription, Some(event)) => {
                let Some(root) = plan.subscription_root() else {
                    return ExecutionResult::default();
                };
                let mut payload = event.data.clone();
                if let (Value::Object(fields), Some(type_name)) =
                    (&mut payload, &event.data_type_name)
                {
                    fields
                        .entry(TYPENAME_FIELD)
                        .or_insert_with(|| type_name.clone().into());
                }
                let mut root_value = serde_json::Map::new();
                root_value.insert(root.field_name.clone(), payload);
                Value::Object(root_value)
            }
            (OperationType::Subscription, None) => Value::Object(serde_json::Map::new()),
            (_, _) => match &self.root_value {
                Some(root) => root.clone(),
                None => {
                    let message = GraphMessage::critical(
                        codes::EXECUTION_ERROR,
                        format!("No root value is configured for {} operations.", plan.operation_type),
                    );
                    return ExecutionResult::from_messages(vec![message].into());
                }
            },
        };

        let mut result = ExecutionResult::default();
        let checked = project(schema, &source, &plan.steps, true);
        if let Value::Object(checked) = &checked {
            complete_root_fields(schema, &plan.steps, checked, &mut result.messages);
        }
        result.data = Some(project(schema, &source, &plan.steps, false));
        result
    }
}

/// Selects the planned fields out of a JSON value, writing them under their response keys.
///
/// With `keep_typename` the source `__typename` is carried along even when not selected, so
/// the value can still be checked against abstract types.
fn project(schema: &Schema, value: &Value, steps: &[FieldStep], keep_typename: bool) -> Value {
    if steps.is_empty() {
        return value.clone();
    }
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project(schema, item, steps, keep_typename))
                .collect(),
        ),
        Value::Object(fields) => {
            let typename = fields.get(TYPENAME_FIELD).and_then(Value::as_str);
            let mut out = serde_json::Map::new();
            for step in steps {
                let applies = match (&step.type_condition, typename) {
                    (Some(condition), Some(typename)) => {
                        schema.is_possible_type(condition, typename)
                    }
                    _ => true,
                };
                if !applies || out.contains_key(&step.response_key) {
                    continue;
                }
                let field = fields.get(&step.field_name).unwrap_or(&Value::Null);
                out.insert(
                    step.response_key.clone(),
                    project(schema, field, &step.children, keep_typename),
                );
            }
            if let (true, Some(typename)) = (keep_typename, typename) {
                out.entry(TYPENAME_FIELD).or_insert_with(|| typename.into());
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn complete_root_fields(
    schema: &Schema,
    steps: &[FieldStep],
    data: &serde_json::Map<String, serde_json::Value>,
    messages: &mut GraphMessageCollection,
) {
    for step in steps {
        let (Some(ty), Some(value)) = (&step.type_expression, data.get(&step.response_key)) else {
            continue;
        };
        let path = vec![PathSegment::Field(step.response_key.clone())];
        for failure in complete_value_at(schema, value, ty, path) {
            messages.add(failure.to_message());
        }
    }
}
