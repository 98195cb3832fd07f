//! Variable rules.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use strata_document::{DocumentPartId, DocumentPartKind, PartData, QueryDocument, VariablePart};

/// Variables declared by an operation, by name. The first declaration wins.
fn declared_variables(
    document: &QueryDocument,
    operation: DocumentPartId,
) -> IndexMap<&str, (DocumentPartId, &VariablePart)> {
    let mut declared = IndexMap::new();
    let Some(collection) =
        document.first_child_of_kind(operation, DocumentPartKind::VariableCollection)
    else {
        return declared;
    };
    for &variable in document.children_of_kind(collection, DocumentPartKind::Variable) {
        if let PartData::Variable(data) = &document.part(variable).data {
            declared.entry(data.name.as_str()).or_insert((variable, data));
        }
    }
    declared
}

/// Variable references in the operation, then in every fragment it reaches.
pub(crate) fn variable_usages(
    document: &QueryDocument,
    operation: DocumentPartId,
) -> Vec<(DocumentPartId, &str)> {
    let mut usages = Vec::new();
    let mut pending = vec![operation];
    let mut seen = FxHashSet::default();

    while let Some(root) = pending.pop() {
        for part in document.descendants(root) {
            match &document.part(part).data {
                PartData::SuppliedValue(value) => {
                    if let Some(name) = value.value.variable_name() {
                        usages.push((part, name));
                    }
                }
                PartData::FragmentSpread(spread) => {
                    if let Some(fragment) = spread.fragment {
                        if seen.insert(fragment) {
                            pending.push(fragment);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    usages
}

fn operation_label(document: &QueryDocument, operation: DocumentPartId) -> String {
    match document.operation(operation).and_then(|op| op.name.as_deref()) {
        Some(name) => format!("operation '{name}'"),
        None => "the anonymous operation".to_string(),
    }
}

/// 5.8.1: variable names must be unique within an operation.
pub struct VariableUniqueness;

impl DocumentRule for VariableUniqueness {
    rule_metadata!(
        DocumentPartKind::VariableCollection,
        "5.8.1",
        "sec-Variable-Uniqueness"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let mut seen = FxHashSet::default();
        let mut passed = true;
        for &variable in document.children_of_kind(ctx.active_part(), DocumentPartKind::Variable) {
            let PartData::Variable(data) = &document.part(variable).data else {
                continue;
            };
            if !seen.insert(data.name.as_str()) {
                ctx.report_at(
                    variable,
                    self.reference(),
                    format!("Variable '${}' is declared more than once.", data.name),
                );
                passed = false;
            }
        }
        Ok(passed)
    }
}

/// 5.8.2: variables must be input types.
pub struct VariablesAreInputTypes;

impl DocumentRule for VariablesAreInputTypes {
    rule_metadata!(
        DocumentPartKind::Variable,
        "5.8.2",
        "sec-Variables-Are-Input-Types"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let PartData::Variable(variable) = &ctx.part().data else {
            return Err(ctx.unexpected(DocumentPartKind::Variable));
        };
        if ctx.schema.is_input_expression(&variable.type_expression) {
            return Ok(true);
        }
        ctx.report(
            self.reference(),
            format!(
                "Variable '${}' cannot be of type '{}', which is not an input type.",
                variable.name, variable.type_expression
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

/// 5.8.3: every variable used by an operation must be declared by it.
pub struct AllVariableUsesDefined;

impl DocumentRule for AllVariableUsesDefined {
    rule_metadata!(
        DocumentPartKind::Operation,
        "5.8.3",
        "sec-All-Variable-Uses-Defined"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let operation = ctx.active_part();
        let declared = declared_variables(document, operation);

        let mut passed = true;
        let mut reported = FxHashSet::default();
        for (usage, name) in variable_usages(document, operation) {
            if declared.contains_key(name) || !reported.insert(name) {
                continue;
            }
            ctx.report_at(
                usage,
                self.reference(),
                format!(
                    "Variable '${name}' is not declared by {}.",
                    operation_label(document, operation)
                ),
            );
            passed = false;
        }
        Ok(passed)
    }
}

/// 5.8.4: every variable an operation declares must be used.
pub struct AllVariablesUsed;

impl DocumentRule for AllVariablesUsed {
    rule_metadata!(
        DocumentPartKind::Operation,
        "5.8.4",
        "sec-All-Variables-Used"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let operation = ctx.active_part();
        let used: FxHashSet<&str> = variable_usages(document, operation)
            .into_iter()
            .map(|(_, name)| name)
            .collect();

        let mut passed = true;
        for (name, (variable, _)) in declared_variables(document, operation) {
            if used.contains(name) {
                continue;
            }
            ctx.report_at(
                variable,
                self.reference(),
                format!(
                    "Variable '${name}' is never used in {}.",
                    operation_label(document, operation)
                ),
            );
            passed = false;
        }
        Ok(passed)
    }
}

/// 5.8.5: a variable may only be used where its type is allowed.
///
/// A nullable variable may flow into a non-null position when either the variable or the
/// position has a default value.
pub struct AllVariableUsagesAllowed;

impl DocumentRule for AllVariableUsagesAllowed {
    rule_metadata!(
        DocumentPartKind::Operation,
        "5.8.5",
        "sec-All-Variable-Usages-are-Allowed"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let operation = ctx.active_part();
        let declared = declared_variables(document, operation);

        let mut passed = true;
        for (usage, name) in variable_usages(document, operation) {
            let Some((_, variable)) = declared.get(name) else {
                continue;
            };
            let Some(location) = document
                .supplied_value(usage)
                .and_then(|v| v.expected_type.as_ref())
            else {
                continue;
            };

            let location_has_default = variable.has_default
                || document
                    .parent(usage)
                    .and_then(|argument| ctx.argument_definition(argument))
                    .is_some_and(|definition| definition.default_value.is_some());
            if variable
                .type_expression
                .is_assignable_to(location, location_has_default)
            {
                continue;
            }

            ctx.report_at(
                usage,
                self.reference(),
                format!(
                    "Variable '${name}' of type '{}' cannot be used where '{location}' is expected.",
                    variable.type_expression
                ),
            );
            passed = false;
        }
        Ok(passed)
    }
}
