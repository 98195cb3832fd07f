//! Serialization of execution results into GraphQL response objects.

use crate::error::ResponseWriteError;
use crate::execution::ExecutionResult;
use serde_json::{json, Map, Value};
use strata_core::{GraphMessage, PathSegment};
use strata_schema::ResponseOptions;

/// Writes execution results and messages as JSON, honoring the exposure options.
pub trait ResponseWriter: Send + Sync {
    /// A full `{ data, errors, extensions }` response.
    fn write_result(
        &self,
        result: &ExecutionResult,
        options: &ResponseOptions,
    ) -> Result<Value, ResponseWriteError>;

    /// A single error object.
    fn write_message(&self, message: &GraphMessage, options: &ResponseOptions) -> Value;
}

/// The standard GraphQL response layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseWriter;

impl ResponseWriter for JsonResponseWriter {
    fn write_result(
        &self,
        result: &ExecutionResult,
        options: &ResponseOptions,
    ) -> Result<Value, ResponseWriteError> {
        let mut response = Map::new();
        let errors: Vec<Value> = result
            .messages
            .iter()
            .map(|message| self.write_message(message, options))
            .collect();
        if !errors.is_empty() {
            response.insert("errors".into(), Value::Array(errors));
        }
        if let Some(data) = &result.data {
            response.insert("data".into(), data.clone());
        }
        if options.expose_metrics {
            if let Some(metrics) = &result.metrics {
                response.insert("extensions".into(), json!({ "metrics": metrics }));
            }
        }
        Ok(Value::Object(response))
    }

    fn write_message(&self, message: &GraphMessage, options: &ResponseOptions) -> Value {
        let mut error = Map::new();
        error.insert("message".into(), message.message.clone().into());
        if let Some(location) = message.location {
            error.insert(
                "locations".into(),
                json!([{ "line": location.line, "column": location.column }]),
            );
        }
        if !message.path.is_empty() {
            let path = message
                .path
                .iter()
                .map(|segment| match segment {
                    PathSegment::Field(name) => Value::from(name.as_str()),
                    PathSegment::Index(index) => Value::from(*index),
                })
                .collect();
            error.insert("path".into(), Value::Array(path));
        }

        let mut extensions = Map::new();
        extensions.insert("code".into(), message.code.clone().into());
        extensions.insert("severity".into(), message.severity.as_str().into());
        if let Some(rule) = &message.rule {
            extensions.insert("rule".into(), rule.number.into());
            extensions.insert("specifiedBy".into(), rule.url.into());
        }
        if options.expose_exceptions {
            if let Some(exception) = &message.exception {
                extensions.insert("exception".into(), exception.clone().into());
            }
        }
        error.insert("extensions".into(), Value::Object(extensions));
        Value::Object(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{codes, RuleReference, SourceLocation};

    fn message() -> GraphMessage {
        GraphMessage::critical(codes::INVALID_FIELD_VALUE, "bad value")
            .with_location(SourceLocation::new(2, 5, 14))
            .with_rule(RuleReference::new("6.4.3", "https://spec.graphql.org/October2021/#sec-Value-Completion"))
            .with_path(vec![PathSegment::Field("friends".into()), PathSegment::Index(0)])
            .with_exception("resolver panicked")
    }

    #[test]
    fn test_write_message() {
        let written = JsonResponseWriter.write_message(&message(), &ResponseOptions::default());
        assert_eq!(
            written,
            json!({
                "message": "bad value",
                "locations": [{ "line": 2, "column": 5 }],
                "path": ["friends", 0],
                "extensions": {
                    "code": "INVALID_FIELD_VALUE",
                    "severity": "CRITICAL",
                    "rule": "6.4.3",
                    "specifiedBy": "https://spec.graphql.org/October2021/#sec-Value-Completion"
                }
            })
        );
    }

    #[test]
    fn test_exposure_options() {
        let mut result = ExecutionResult::from_data(json!({ "hero": null }))
            .with_metrics(json!({ "steps": 2 }));
        result.messages.add(message());

        let hidden = JsonResponseWriter
            .write_result(&result, &ResponseOptions::default())
            .unwrap();
        assert!(hidden.get("extensions").is_none());
        assert!(hidden["errors"][0]["extensions"].get("exception").is_none());

        let exposed = JsonResponseWriter
            .write_result(&result, &ResponseOptions::new().with_exceptions().with_metrics())
            .unwrap();
        assert_eq!(exposed["extensions"]["metrics"]["steps"], 2);
        assert_eq!(exposed["errors"][0]["extensions"]["exception"], "resolver panicked");
        assert_eq!(exposed["data"], json!({ "hero": null }));
    }
}
