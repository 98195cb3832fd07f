//! Field selection rules.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use strata_document::DocumentPartKind;
use strata_schema::TYPENAME_FIELD;

/// 5.3.1: a selected field must be declared on the type it is selected from.
pub struct FieldSelectionsOnObjects;

impl DocumentRule for FieldSelectionsOnObjects {
    rule_metadata!(
        DocumentPartKind::Field,
        "5.3.1",
        "sec-Field-Selections"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .field(ctx.active_part())
            .is_some_and(|f| f.source_graph_type.is_some())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let field = ctx.expect_field()?;
        if field.name == TYPENAME_FIELD || field.field_type.is_some() {
            return Ok(true);
        }

        ctx.report(
            self.reference(),
            format!(
                "Field '{}' is not defined on type '{}'.",
                field.name,
                field.source_graph_type.as_deref().unwrap_or_default()
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

/// 5.3.3: leaf fields must not select children, composite fields must select at least one.
pub struct LeafFieldSelections;

impl DocumentRule for LeafFieldSelections {
    rule_metadata!(
        DocumentPartKind::Field,
        "5.3.3",
        "sec-Leaf-Field-Selections"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .field(ctx.active_part())
            .is_some_and(|f| f.graph_type.is_some() && f.name != TYPENAME_FIELD)
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let field = ctx.expect_field()?;
        let type_name = field.graph_type.as_deref().unwrap_or_default();
        let Some(graph_type) = ctx.schema.find_graph_type(type_name) else {
            return Ok(true);
        };
        let selection_set = ctx.document.child_selection_set(ctx.active_part());

        if graph_type.is_leaf() {
            if selection_set.is_some() {
                ctx.report(
                    self.reference(),
                    format!(
                        "Field '{}' returns the leaf type '{type_name}' and must not have a selection set.",
                        field.name
                    ),
                );
                return Ok(false);
            }
            return Ok(true);
        }

        let selects_fields =
            selection_set.is_some_and(|set| !ctx.document.executable_fields(set).is_empty());
        // A spread of an undefined fragment is reported by 5.5.2.1 instead.
        let has_unresolved_spread = selection_set.is_some_and(|set| {
            ctx.document
                .children_of_kind(set, DocumentPartKind::FragmentSpread)
                .iter()
                .filter_map(|&spread| ctx.document.fragment_spread(spread))
                .any(|spread| spread.is_included && spread.fragment.is_none())
        });
        if graph_type.is_composite() && !selects_fields && !has_unresolved_spread {
            ctx.report(
                self.reference(),
                format!(
                    "Field '{}' returns the type '{type_name}' and must select at least one field.",
                    field.name
                ),
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn should_allow_child_contexts_to_execute(
        &self,
        _ctx: &DocumentValidationContext<'_>,
        passed: bool,
    ) -> bool {
        passed
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{messages_for, rule_numbers};

    #[test]
    fn test_unknown_field() {
        let messages = messages_for("{ hero { name mood } }");
        assert_eq!(rule_numbers(&messages), vec!["5.3.1"]);
        assert_eq!(
            messages.first().map(|m| m.message.as_str()),
            Some("Field 'mood' is not defined on type 'Character'.")
        );
    }

    #[test]
    fn test_typename_is_always_defined() {
        assert!(messages_for("{ hero { __typename } search { __typename } }").is_empty());
    }

    #[test]
    fn test_leaf_field_with_selection() {
        let messages = messages_for("{ review(id: \"1\") { stars { value } } }");
        assert_eq!(messages.for_rule("5.3.3").count(), 1);
        assert_eq!(messages.for_rule("5.3.1").count(), 0);
    }

    #[test]
    fn test_composite_field_without_selection() {
        let messages = messages_for("{ hero }");
        assert_eq!(rule_numbers(&messages), vec!["5.3.3"]);
        assert_eq!(
            messages.first().map(|m| m.message.as_str()),
            Some("Field 'hero' returns the type 'Character' and must select at least one field.")
        );
    }

    #[test]
    fn test_undefined_spread_is_not_an_empty_selection() {
        let messages = messages_for("{ hero { ...Missing } }");
        assert_eq!(rule_numbers(&messages), vec!["5.5.2.1"]);
    }

    #[test]
    fn test_skipped_fields_do_not_count() {
        let messages = messages_for("{ hero { name @skip(if: true) } }");
        assert_eq!(rule_numbers(&messages), vec!["5.3.3"]);
    }
}
