//! Value completion checks, run against resolved field values after execution.
//!
//! A failure invalidates the result node it was raised for. Whether the node can be nulled
//! out or the null must propagate to the parent is left to the executor; each failure
//! carries `is_non_nullable` so it can decide.

use serde_json::Value;
use strata_core::{codes, GraphMessage, GraphMessageCollection, PathSegment, RuleReference};
use strata_schema::{GraphType, Schema, TypeExpression, TYPENAME_FIELD};

const VALUE_COMPLETION: RuleReference = RuleReference::new(
    "6.4.3",
    "https://spec.graphql.org/October2021/#sec-Value-Completion",
);

/// Why a resolved value could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFailureKind {
    /// A non-null position resolved to null.
    RequiredValueWasNull,
    /// A list position resolved to a single value, or the other way around.
    ListShapeMismatch,
    /// The value is not of the declared type: an object whose `__typename` is not a
    /// possible type, or a scalar or enum value of the wrong kind.
    ConcreteTypeMismatch,
}

/// A value completion failure at one response path.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionFailure {
    pub kind: CompletionFailureKind,
    pub path: Vec<PathSegment>,
    pub expected_type: TypeExpression,
    pub is_non_nullable: bool,
    /// What was found, e.g. `"a string"` or `"an object of type 'Review'"`.
    pub found: String,
}

impl CompletionFailure {
    /// The response path as written in messages, e.g. `hero.friends[1].name`.
    #[must_use]
    pub fn path_display(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(_) => out.push_str(&segment.to_string()),
            }
        }
        out
    }

    #[must_use]
    pub fn to_message(&self) -> GraphMessage {
        let path = self.path_display();
        let ty = &self.expected_type;
        let text = match self.kind {
            CompletionFailureKind::RequiredValueWasNull => {
                format!("Field '{path}' of type '{ty}' is non-nullable but resolved to null.")
            }
            CompletionFailureKind::ListShapeMismatch => {
                let shape = if ty.is_list() { "a list" } else { "a single value" };
                format!(
                    "Field '{path}' of type '{ty}' expected {shape} but resolved to {}.",
                    self.found
                )
            }
            CompletionFailureKind::ConcreteTypeMismatch => format!(
                "Field '{path}' resolved to {}, which is not a valid value of type '{ty}'.",
                self.found
            ),
        };
        GraphMessage::critical(codes::INVALID_FIELD_VALUE, text)
            .with_rule(VALUE_COMPLETION)
            .with_path(self.path.clone())
    }
}

/// Checks a resolved value against its declared type.
///
/// Object values are checked field by field for every key that names a field of the
/// concrete type; other keys (aliases) are left alone.
#[must_use]
pub fn complete_value(
    schema: &Schema,
    value: &Value,
    type_expression: &TypeExpression,
) -> Vec<CompletionFailure> {
    complete_value_at(schema, value, type_expression, Vec::new())
}

/// Like [`complete_value`], for a value found at `path`.
#[must_use]
pub fn complete_value_at(
    schema: &Schema,
    value: &Value,
    type_expression: &TypeExpression,
    path: Vec<PathSegment>,
) -> Vec<CompletionFailure> {
    let mut completion = Completion {
        schema,
        path,
        failures: Vec::new(),
    };
    completion.complete(value, type_expression);
    completion.failures
}

/// Runs [`complete_value`] and converts the failures to messages.
#[must_use]
pub fn completion_messages(
    schema: &Schema,
    value: &Value,
    type_expression: &TypeExpression,
) -> GraphMessageCollection {
    let mut messages = GraphMessageCollection::new();
    for failure in complete_value(schema, value, type_expression) {
        messages.add(failure.to_message());
    }
    messages
}

struct Completion<'a> {
    schema: &'a Schema,
    path: Vec<PathSegment>,
    failures: Vec<CompletionFailure>,
}

impl Completion<'_> {
    fn fail(&mut self, kind: CompletionFailureKind, expected: &TypeExpression, found: &Value) {
        self.failures.push(CompletionFailure {
            kind,
            path: self.path.clone(),
            expected_type: expected.clone(),
            is_non_nullable: expected.is_non_null(),
            found: describe(found),
        });
    }

    fn complete(&mut self, value: &Value, expected: &TypeExpression) {
        if value.is_null() {
            if expected.is_non_null() {
                self.fail(CompletionFailureKind::RequiredValueWasNull, expected, value);
            }
            return;
        }

        match expected.nullable() {
            TypeExpression::List(item) => {
                let Value::Array(items) = value else {
                    self.fail(CompletionFailureKind::ListShapeMismatch, expected, value);
                    return;
                };
                for (index, item_value) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    self.complete(item_value, item);
                    self.path.pop();
                }
            }
            TypeExpression::Named(name) => {
                if value.is_array() {
                    self.fail(CompletionFailureKind::ListShapeMismatch, expected, value);
                    return;
                }
                self.complete_named(value, name, expected);
            }
            TypeExpression::NonNull(_) => {}
        }
    }

    fn complete_named(&mut self, value: &Value, name: &str, expected: &TypeExpression) {
        let Some(graph_type) = self.schema.find_graph_type(name) else {
            return;
        };
        let accepted = match graph_type {
            GraphType::Scalar(_) => scalar_accepts(name, value),
            GraphType::Enum(enum_type) => value.as_str().is_some_and(|v| enum_type.has_value(v)),
            GraphType::Object(_) | GraphType::Interface(_) | GraphType::Union(_) => {
                return self.complete_object(value, graph_type, expected);
            }
            GraphType::InputObject(_) => false,
        };
        if !accepted {
            self.fail(CompletionFailureKind::ConcreteTypeMismatch, expected, value);
        }
    }

    fn complete_object(&mut self, value: &Value, graph_type: &GraphType, expected: &TypeExpression) {
        let Value::Object(fields) = value else {
            self.fail(CompletionFailureKind::ConcreteTypeMismatch, expected, value);
            return;
        };

        let typename = fields.get(TYPENAME_FIELD).and_then(Value::as_str);
        let concrete = match (graph_type, typename) {
            (GraphType::Object(object), None) => object.name.as_str(),
            (_, Some(typename)) if self.schema.is_possible_type(graph_type.name(), typename) => {
                typename
            }
            _ => {
                self.fail(CompletionFailureKind::ConcreteTypeMismatch, expected, value);
                return;
            }
        };

        for (key, field_value) in fields {
            let Some(field) = self.schema.find_field(concrete, key) else {
                continue;
            };
            self.path.push(PathSegment::Field(key.clone()));
            self.complete(field_value, &field.ty);
            self.path.pop();
        }
    }
}

fn scalar_accepts(scalar: &str, value: &Value) -> bool {
    match scalar {
        "Int" => value
            .as_i64()
            .is_some_and(|v| i32::try_from(v).is_ok()),
        "Float" => value.is_number(),
        "String" => value.is_string(),
        "Boolean" => value.is_boolean(),
        "ID" => value.is_string() || value.is_i64() || value.is_u64(),
        _ => true,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("the boolean {b}"),
        Value::Number(n) => format!("the number {n}"),
        Value::String(_) => "a string".to_string(),
        Value::Array(items) => format!("a list of {} item(s)", items.len()),
        Value::Object(fields) => match fields.get(TYPENAME_FIELD).and_then(Value::as_str) {
            Some(typename) => format!("an object of type '{typename}'"),
            None => "an object".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::schema;
    use serde_json::json;

    fn ty(source: &str) -> TypeExpression {
        source.parse().unwrap()
    }

    fn kinds(failures: &[CompletionFailure]) -> Vec<CompletionFailureKind> {
        failures.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_valid_values_complete() {
        let schema = schema();
        let value = json!({
            "__typename": "Human",
            "name": "Luke",
            "height": 1.72,
            "friends": [{ "__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech" }]
        });
        assert!(complete_value(&schema, &value, &ty("Character")).is_empty());
        assert!(complete_value(&schema, &json!(null), &ty("Review")).is_empty());
    }

    #[test]
    fn test_required_value_was_null() {
        let schema = schema();
        let failures = complete_value(&schema, &json!({ "stars": null }), &ty("Review"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::RequiredValueWasNull]);
        assert!(failures[0].is_non_nullable);
        assert_eq!(
            failures[0].to_message().message,
            "Field 'stars' of type 'Int!' is non-nullable but resolved to null."
        );
    }

    #[test]
    fn test_list_shape_mismatch() {
        let schema = schema();
        let failures = complete_value(&schema, &json!({ "stars": 3 }), &ty("[Review]"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::ListShapeMismatch]);
        assert!(!failures[0].is_non_nullable);

        let failures = complete_value(&schema, &json!([3]), &ty("Int"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::ListShapeMismatch]);
    }

    #[test]
    fn test_concrete_type_mismatch() {
        let schema = schema();
        let value = json!([{ "__typename": "Review", "stars": 1 }]);
        let failures = complete_value(&schema, &value, &ty("[SearchResult]"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::ConcreteTypeMismatch]);
        assert_eq!(failures[0].path, vec![PathSegment::Index(0)]);

        // abstract types need a typename to pick the concrete type
        let failures = complete_value(&schema, &json!({ "name": "Han" }), &ty("Character"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::ConcreteTypeMismatch]);
    }

    #[test]
    fn test_scalar_and_enum_kinds() {
        let schema = schema();
        let failures = complete_value(&schema, &json!({ "stars": "five" }), &ty("Review!"));
        assert_eq!(kinds(&failures), vec![CompletionFailureKind::ConcreteTypeMismatch]);
        assert!(failures[0].is_non_nullable);

        assert!(complete_value(&schema, &json!("JEDI"), &ty("Episode")).is_empty());
        assert_eq!(complete_value(&schema, &json!("SITH"), &ty("Episode")).len(), 1);
        assert_eq!(complete_value(&schema, &json!(3_000_000_000_i64), &ty("Int")).len(), 1);
    }

    #[test]
    fn test_nested_paths() {
        let schema = schema();
        let value = json!({
            "__typename": "Human",
            "name": "Luke",
            "friends": [{ "__typename": "Droid", "name": 7 }]
        });
        let failures = complete_value(&schema, &value, &ty("Human"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path_display(), "friends[0].name");

        let message = failures[0].to_message();
        assert_eq!(message.code, codes::INVALID_FIELD_VALUE);
        assert_eq!(message.rule_number(), Some("6.4.3"));
    }
}
