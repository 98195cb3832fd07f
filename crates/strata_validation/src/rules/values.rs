//! Value rules: literal types and input object fields.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rules::arguments::duplicate_arguments;
use crate::rule::{rule_metadata, DocumentRule};
use strata_document::{
    DocumentPartId, DocumentPartKind, QueryDocument, ScalarValueKind, SuppliedValue,
};
use strata_schema::{GraphType, InputObjectType, Schema, TypeExpression};

/// The input object type a complex value part is expected to be.
fn expected_input_object<'a>(
    ctx: &DocumentValidationContext<'a>,
    value: DocumentPartId,
) -> Option<&'a InputObjectType> {
    let part = ctx.document.supplied_value(value)?;
    if part.value != SuppliedValue::Complex {
        return None;
    }
    match ctx
        .schema
        .find_graph_type(part.expected_type.as_ref()?.type_name())?
    {
        GraphType::InputObject(input) => Some(input),
        _ => None,
    }
}

/// 5.6.1: literal values must be coercible to their expected type.
///
/// List items and input object fields are child parts with their own expected types; a
/// value that fails here hides its children from further checks.
pub struct ValuesOfCorrectType;

impl DocumentRule for ValuesOfCorrectType {
    rule_metadata!(
        DocumentPartKind::SuppliedValue,
        "5.6.1",
        "sec-Values-of-Correct-Type"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .supplied_value(ctx.active_part())
            .is_some_and(|v| v.expected_type.is_some() && v.value.variable_name().is_none())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let part = ctx
            .document
            .supplied_value(ctx.active_part())
            .ok_or_else(|| ctx.unexpected(DocumentPartKind::SuppliedValue))?;
        let Some(expected) = &part.expected_type else {
            return Ok(true);
        };

        match literal_mismatch(ctx.schema, ctx.document, ctx.active_part(), expected) {
            None => Ok(true),
            Some(reason) => {
                ctx.report(self.reference(), reason);
                Ok(false)
            }
        }
    }

    fn should_allow_child_contexts_to_execute(
        &self,
        _ctx: &DocumentValidationContext<'_>,
        passed: bool,
    ) -> bool {
        passed
    }
}

/// Returns why the value part cannot be coerced to `expected`, or `None` if it can.
fn literal_mismatch(
    schema: &Schema,
    document: &QueryDocument,
    value: DocumentPartId,
    expected: &TypeExpression,
) -> Option<String> {
    let supplied = &document.supplied_value(value)?.value;
    let mismatch = || {
        Some(format!(
            "Expected a value of type '{expected}', found {}.",
            supplied.describe()
        ))
    };

    if supplied.is_null() {
        return if expected.is_non_null() { mismatch() } else { None };
    }
    if let SuppliedValue::Variable(_) = supplied {
        return None;
    }

    match expected.nullable() {
        // items are checked against the item type as child parts
        TypeExpression::List(_) if *supplied == SuppliedValue::List => None,
        // a single value is coerced to a list of one
        TypeExpression::List(item) => literal_mismatch(schema, document, value, item),
        TypeExpression::Named(name) => {
            let accepted = match schema.find_graph_type(name)? {
                GraphType::Scalar(_) => scalar_accepts(name, supplied),
                GraphType::Enum(enum_type) => {
                    matches!(supplied, SuppliedValue::Enum(v) if enum_type.has_value(v))
                }
                GraphType::InputObject(_) => *supplied == SuppliedValue::Complex,
                _ => true,
            };
            if accepted {
                None
            } else {
                mismatch()
            }
        }
        TypeExpression::NonNull(_) => None,
    }
}

fn scalar_accepts(scalar: &str, value: &SuppliedValue) -> bool {
    let SuppliedValue::Scalar { kind, value } = value else {
        // custom scalars accept any literal, built-ins only scalar literals
        return !matches!(scalar, "Int" | "Float" | "String" | "Boolean" | "ID")
            && *value != SuppliedValue::List;
    };
    match scalar {
        "Int" => *kind == ScalarValueKind::Int && value.parse::<i32>().is_ok(),
        "Float" => matches!(kind, ScalarValueKind::Int | ScalarValueKind::Float),
        "String" => *kind == ScalarValueKind::String,
        "Boolean" => *kind == ScalarValueKind::Boolean,
        "ID" => matches!(kind, ScalarValueKind::String | ScalarValueKind::Int),
        _ => true,
    }
}

/// 5.6.2: input object fields must be declared by the input object type.
pub struct InputObjectFieldNames;

impl DocumentRule for InputObjectFieldNames {
    rule_metadata!(
        DocumentPartKind::InputArgument,
        "5.6.2",
        "sec-Input-Object-Field-Names"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .parent(ctx.active_part())
            .is_some_and(|owner| expected_input_object(ctx, owner).is_some())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let argument = ctx.active_part();
        if ctx.argument_definition(argument).is_some() {
            return Ok(true);
        }
        let name = ctx.document.argument_name(argument).unwrap_or_default();
        let owner = ctx
            .document
            .parent(argument)
            .and_then(|owner| expected_input_object(ctx, owner))
            .map(|input| input.name.as_str())
            .unwrap_or_default();
        ctx.report(
            self.reference(),
            format!("Field '{name}' is not defined on input object '{owner}'."),
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

/// 5.6.3: each input object field may be supplied once.
pub struct InputObjectFieldUniqueness;

impl DocumentRule for InputObjectFieldUniqueness {
    rule_metadata!(
        DocumentPartKind::SuppliedValue,
        "5.6.3",
        "sec-Input-Object-Field-Uniqueness"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .supplied_value(ctx.active_part())
            .is_some_and(|v| v.value == SuppliedValue::Complex)
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let duplicates = duplicate_arguments(ctx, ctx.active_part());
        for (field, name) in &duplicates {
            ctx.report_at(
                *field,
                self.reference(),
                format!("Input object field '{name}' is supplied more than once."),
            );
        }
        Ok(duplicates.is_empty())
    }
}

/// 5.6.4: required input object fields must be supplied.
pub struct InputObjectRequiredFields;

impl DocumentRule for InputObjectRequiredFields {
    rule_metadata!(
        DocumentPartKind::SuppliedValue,
        "5.6.4",
        "sec-Input-Object-Required-Fields"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        expected_input_object(ctx, ctx.active_part()).is_some()
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let value = ctx.active_part();
        let Some(input) = expected_input_object(ctx, value) else {
            return Ok(true);
        };

        let mut passed = true;
        for field in input.fields.values().filter(|f| f.is_required()) {
            if ctx.document.argument_value(value, &field.name).is_some() {
                continue;
            }
            ctx.report(
                self.reference(),
                format!(
                    "Required field '{}' of type '{}' is missing on input object '{}'.",
                    field.name, field.ty, input.name
                ),
            );
            passed = false;
        }
        Ok(passed)
    }
}
