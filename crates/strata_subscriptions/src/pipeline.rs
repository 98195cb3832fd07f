//! Turns query text into a validated plan.

use crate::execution::QueryRequest;
use std::sync::Arc;
use strata_core::{codes, GraphMessage, GraphMessageCollection};
use strata_document::{DocumentBuilder, PlanError, QueryPlan, QueryPlanner};
use strata_schema::Schema;
use strata_validation::{DocumentValidator, ValidationOptions};
use tracing::{debug, warn};

/// A request that parsed, validated and planned cleanly.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub request: QueryRequest,
    pub plan: QueryPlan,
}

impl PreparedQuery {
    /// The routing event name of a subscription, if this is one.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.plan
            .subscription_root()
            .and_then(|root| root.event_name.as_deref())
    }
}

/// Why a request could not be prepared.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparationFailure {
    /// The text is not a GraphQL document.
    Syntax(GraphMessageCollection),
    /// The document broke validation rules, or no operation could be planned.
    Invalid(GraphMessageCollection),
}

impl PreparationFailure {
    #[must_use]
    pub fn messages(&self) -> &GraphMessageCollection {
        match self {
            Self::Syntax(messages) | Self::Invalid(messages) => messages,
        }
    }

    #[must_use]
    pub fn into_messages(self) -> GraphMessageCollection {
        match self {
            Self::Syntax(messages) | Self::Invalid(messages) => messages,
        }
    }
}

/// Parses, validates and plans requests against one schema.
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    schema: Arc<Schema>,
    validator: Arc<DocumentValidator>,
    planner: Arc<QueryPlanner>,
}

impl DocumentPipeline {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_validation(schema, ValidationOptions::default())
    }

    pub fn with_validation(schema: Arc<Schema>, options: ValidationOptions) -> Self {
        Self {
            schema,
            validator: Arc::new(DocumentValidator::with_options(options)),
            planner: Arc::new(QueryPlanner::new()),
        }
    }

    #[must_use]
    pub fn with_planner(mut self, planner: QueryPlanner) -> Self {
        self.planner = Arc::new(planner);
        self
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn prepare(&self, request: QueryRequest) -> Result<PreparedQuery, PreparationFailure> {
        let document = DocumentBuilder::new(&self.schema)
            .with_variables(&request.variables)
            .build(&request.query)
            .map_err(PreparationFailure::Syntax)?;

        let messages = match self.validator.validate(&self.schema, &document) {
            Ok(messages) => messages,
            Err(violation) => {
                warn!(error = %violation, "validation aborted");
                let message = GraphMessage::critical(
                    codes::UNHANDLED_EXCEPTION,
                    "The document could not be validated.",
                )
                .with_exception(violation.to_string());
                return Err(PreparationFailure::Invalid(vec![message].into()));
            }
        };
        if messages.has_critical() {
            debug!(messages = messages.len(), "document rejected");
            return Err(PreparationFailure::Invalid(messages));
        }

        let plan = self
            .planner
            .plan(
                &self.schema,
                &document,
                request.operation_name.as_deref(),
                &request.variables,
            )
            .map_err(|error| PreparationFailure::Invalid(vec![plan_message(&error)].into()))?;

        debug!(
            operation = plan.operation_name.as_deref().unwrap_or("<anonymous>"),
            kind = %plan.operation_type,
            steps = plan.step_count(),
            "query planned"
        );
        Ok(PreparedQuery { request, plan })
    }
}

fn plan_message(error: &PlanError) -> GraphMessage {
    let code = match error {
        PlanError::OperationNotFound(_) | PlanError::AmbiguousOperation(_) => {
            codes::OPERATION_NOT_FOUND
        }
        PlanError::NoOperations | PlanError::MissingRootType(_) | PlanError::DepthExceeded(_) => {
            codes::BAD_REQUEST
        }
    };
    let mut text = error.to_string();
    if let Some(first) = text.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    GraphMessage::critical(code, format!("{text}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::schema;

    fn pipeline() -> DocumentPipeline {
        DocumentPipeline::new(Arc::new(schema()))
    }

    #[test]
    fn test_prepares_subscription() {
        let prepared = pipeline()
            .prepare(QueryRequest::new("subscription { reviewAdded { stars } }"))
            .unwrap();
        assert_eq!(prepared.event_name(), Some("REVIEW_ADDED"));
    }

    #[test]
    fn test_syntax_failure() {
        let failure = pipeline().prepare(QueryRequest::new("{ hero {")).unwrap_err();
        assert!(matches!(failure, PreparationFailure::Syntax(_)));
        assert_eq!(failure.messages().first().unwrap().code, codes::SYNTAX_ERROR);
    }

    #[test]
    fn test_invalid_document() {
        let failure = pipeline()
            .prepare(QueryRequest::new("{ hero { nope } }"))
            .unwrap_err();
        assert!(matches!(failure, PreparationFailure::Invalid(_)));
        assert_eq!(failure.messages().first().unwrap().rule_number(), Some("5.3.1"));
    }

    #[test]
    fn test_unknown_operation() {
        let failure = pipeline()
            .prepare(QueryRequest::new("query A { hero { name } }").operation("B"))
            .unwrap_err();
        let message = failure.messages().first().unwrap();
        assert_eq!(message.code, codes::OPERATION_NOT_FOUND);
        assert_eq!(message.message, "Operation `B` was not found.");
    }
}
