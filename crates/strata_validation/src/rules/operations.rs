//! Operation rules.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use rustc_hash::FxHashSet;
use strata_document::{DocumentPartKind, PartData};
use strata_schema::TYPENAME_FIELD;
use strata_syntax::OperationType;

/// 5.2.1.1: named operations must have unique names.
pub struct OperationNameUniqueness;

impl DocumentRule for OperationNameUniqueness {
    rule_metadata!(
        DocumentPartKind::Document,
        "5.2.1.1",
        "sec-Operation-Name-Uniqueness"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let mut seen = FxHashSet::default();
        let mut passed = true;
        for &operation in document.operations() {
            let Some(name) = document.operation(operation).and_then(|op| op.name.as_deref())
            else {
                continue;
            };
            if !seen.insert(name) {
                ctx.report_at(
                    operation,
                    self.reference(),
                    format!("There can be only one operation named '{name}'."),
                );
                passed = false;
            }
        }
        Ok(passed)
    }
}

/// 5.2.2.1: an anonymous operation must be the only operation in the document.
pub struct LoneAnonymousOperation;

impl DocumentRule for LoneAnonymousOperation {
    rule_metadata!(
        DocumentPartKind::Document,
        "5.2.2.1",
        "sec-Lone-Anonymous-Operation"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let operations = document.operations();
        if operations.len() < 2 {
            return Ok(true);
        }

        let mut passed = true;
        for &operation in operations {
            if document.operation(operation).is_some_and(|op| op.name.is_none()) {
                ctx.report_at(
                    operation,
                    self.reference(),
                    "This anonymous operation must be the only defined operation.",
                );
                passed = false;
            }
        }
        Ok(passed)
    }
}

/// 5.2: the schema must define a root type for the operation's type.
pub struct OperationRootTypeExists;

impl DocumentRule for OperationRootTypeExists {
    rule_metadata!(
        DocumentPartKind::Operation,
        "5.2",
        "sec-Validation.Operations"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let operation = ctx
            .document
            .operation(ctx.active_part())
            .ok_or_else(|| ctx.unexpected(DocumentPartKind::Operation))?;
        if operation.root_type.is_some() {
            return Ok(true);
        }
        ctx.report(
            self.reference(),
            format!(
                "The schema does not define a {} root type.",
                operation.operation_type
            ),
        );
        Ok(false)
    }

    fn should_allow_child_contexts_to_execute(
        &self,
        _ctx: &DocumentValidationContext<'_>,
        passed: bool,
    ) -> bool {
        passed
    }
}

/// 5.2.3.1: a subscription selects exactly one root field, which is not a meta field.
pub struct SubscriptionSingleRootField;

impl DocumentRule for SubscriptionSingleRootField {
    rule_metadata!(
        DocumentPartKind::Operation,
        "5.2.3.1",
        "sec-Single-root-field"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .operation(ctx.active_part())
            .is_some_and(|op| op.operation_type == OperationType::Subscription)
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let Some(set) = document.child_selection_set(ctx.active_part()) else {
            return Ok(true);
        };

        let mut keys = Vec::new();
        let mut has_meta_field = false;
        for field in document.executable_fields(set) {
            let Some(PartData::Field(data)) = document.get(field).map(|p| &p.data) else {
                continue;
            };
            has_meta_field |= data.name == TYPENAME_FIELD;
            if !keys.contains(&data.output_name()) {
                keys.push(data.output_name());
            }
        }

        let label = match document.operation(ctx.active_part()).and_then(|op| op.name.as_deref()) {
            Some(name) => format!("Subscription '{name}'"),
            None => "An anonymous subscription".to_string(),
        };
        if keys.len() != 1 {
            ctx.report(
                self.reference(),
                format!(
                    "{label} must select exactly one top level field, found {}.",
                    keys.len()
                ),
            );
            return Ok(false);
        }
        if has_meta_field {
            ctx.report(
                self.reference(),
                format!("{label} must not select the meta field '{TYPENAME_FIELD}' at the top level."),
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{messages_for, rule_numbers};

    #[test]
    fn test_duplicate_operation_names() {
        let messages = messages_for("query A { hero { name } } query A { human(id: 1) { name } }");
        assert_eq!(rule_numbers(&messages), vec!["5.2.1.1"]);
    }

    #[test]
    fn test_anonymous_operation_not_alone() {
        let messages = messages_for("{ hero { name } } query B { hero { name } }");
        assert_eq!(rule_numbers(&messages), vec!["5.2.2.1"]);
    }

    #[test]
    fn test_missing_root_type() {
        let messages = crate::tests::messages_in(
            &crate::tests::query_only_schema(),
            "mutation { hero { name } }",
        );
        assert_eq!(rule_numbers(&messages), vec!["5.2"]);
        assert_eq!(
            messages.first().map(|m| m.message.as_str()),
            Some("The schema does not define a mutation root type.")
        );
    }

    #[test]
    fn test_subscription_single_root_field() {
        assert!(messages_for("subscription { reviewAdded { stars } }").is_empty());

        let messages = messages_for(
            "subscription S { reviewAdded { stars } other: reviewAdded { stars } }",
        );
        assert_eq!(rule_numbers(&messages), vec!["5.2.3.1"]);
        assert_eq!(
            messages.first().map(|m| m.message.as_str()),
            Some("Subscription 'S' must select exactly one top level field, found 2.")
        );
    }

    #[test]
    fn test_subscription_fragments_are_expanded() {
        let messages = messages_for(
            "subscription { ...F } fragment F on Subscription { reviewAdded { stars } __typename }",
        );
        assert_eq!(rule_numbers(&messages), vec!["5.2.3.1"]);
    }
}
