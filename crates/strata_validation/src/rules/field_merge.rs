//! Field selection merging (5.3.2).
//!
//! Fields of one selection set that share a response key must either be selected on types
//! that can never overlap, or be the same field with the same return type and arguments.
//! Small sets compare every pair. Sets at or above
//! [`ValidationOptions::merge_brute_force_threshold`](crate::ValidationOptions) are bucketed
//! by response key first, and pass immediately when no key repeats.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use strata_document::{DocumentPartId, DocumentPartKind, FieldPart, QueryDocument};
use strata_schema::Schema;

pub struct FieldSelectionMerging;

impl DocumentRule for FieldSelectionMerging {
    rule_metadata!(
        DocumentPartKind::FieldSelectionSet,
        "5.3.2",
        "sec-Field-Selection-Merging"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .selection_set(ctx.active_part())
            .is_some_and(|set| set.graph_type.is_some())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let fields: Vec<_> = document
            .executable_fields(ctx.active_part())
            .into_iter()
            .filter(|&field| owner_is_typed(document, field))
            .collect();

        let conflicts = find_conflicts(
            ctx.schema,
            document,
            &fields,
            ctx.options.merge_brute_force_threshold,
        )?;
        if conflicts.is_empty() {
            return Ok(true);
        }

        let set_type = document
            .selection_set(ctx.active_part())
            .and_then(|set| set.graph_type.clone())
            .unwrap_or_default();
        for (field, _) in conflicts {
            let Some(data) = document.field(field) else {
                continue;
            };
            ctx.report_at(
                field,
                self.reference(),
                format!(
                    "Fields selected as '{}' on type '{set_type}' have different names, return \
                     types or arguments and their parent types can overlap. Use different \
                     aliases to select them.",
                    data.output_name()
                ),
            );
        }
        Ok(false)
    }
}

/// Fields spread from a fragment on an unknown type carry no source type. They are reported by
/// the fragment rules and excluded here.
fn owner_is_typed(document: &QueryDocument, field: DocumentPartId) -> bool {
    document
        .parent(field)
        .and_then(|set| document.selection_set(set))
        .is_some_and(|set| set.graph_type.is_some())
}

/// Returns the first conflicting pair for every response key that has one, in field order.
pub fn find_conflicts(
    schema: &Schema,
    document: &QueryDocument,
    fields: &[DocumentPartId],
    brute_force_threshold: usize,
) -> Result<Vec<(DocumentPartId, DocumentPartId)>, InvariantViolation> {
    let mut conflicts = Vec::new();
    if fields.len() < 2 {
        return Ok(conflicts);
    }

    let mut reported = FxHashSet::default();
    if fields.len() < brute_force_threshold {
        for (i, &a) in fields.iter().enumerate() {
            for &b in &fields[i + 1..] {
                check_pair(schema, document, a, b, &mut reported, &mut conflicts)?;
            }
        }
        return Ok(conflicts);
    }

    let mut buckets: IndexMap<&str, Vec<DocumentPartId>> = IndexMap::new();
    for &field in fields {
        if let Some(data) = document.field(field) {
            buckets.entry(data.output_name()).or_default().push(field);
        }
    }
    if buckets.len() == fields.len() {
        return Ok(conflicts);
    }

    for bucket in buckets.values().filter(|bucket| bucket.len() > 1) {
        for (i, &a) in bucket.iter().enumerate() {
            for &b in &bucket[i + 1..] {
                check_pair(schema, document, a, b, &mut reported, &mut conflicts)?;
            }
        }
    }
    Ok(conflicts)
}

fn check_pair(
    schema: &Schema,
    document: &QueryDocument,
    a: DocumentPartId,
    b: DocumentPartId,
    reported: &mut FxHashSet<String>,
    conflicts: &mut Vec<(DocumentPartId, DocumentPartId)>,
) -> Result<(), InvariantViolation> {
    if fields_can_merge(schema, document, a, b)? {
        return Ok(());
    }
    let key = document
        .field(a)
        .map(|f| f.output_name().to_string())
        .unwrap_or_default();
    if reported.insert(key) {
        conflicts.push((a, b));
    }
    Ok(())
}

/// Returns true if two fields of one selection set may both be selected.
///
/// Fields with different response keys always merge. The result does not depend on argument
/// order.
pub fn fields_can_merge(
    schema: &Schema,
    document: &QueryDocument,
    a: DocumentPartId,
    b: DocumentPartId,
) -> Result<bool, InvariantViolation> {
    let left = expect_field(document, a)?;
    let right = expect_field(document, b)?;
    if left.output_name() != right.output_name() {
        return Ok(true);
    }

    let left_source = source_graph_type(left, a)?;
    let right_source = source_graph_type(right, b)?;
    if !schema.types_can_overlap(left_source, right_source) {
        return Ok(true);
    }

    Ok(left.name == right.name
        && left.field_type == right.field_type
        && document.arguments_equal(a, b))
}

fn expect_field(document: &QueryDocument, id: DocumentPartId) -> Result<&FieldPart, InvariantViolation> {
    document
        .field(id)
        .ok_or(InvariantViolation::UnexpectedPartKind {
            part: id,
            expected: DocumentPartKind::Field,
        })
}

fn source_graph_type(field: &FieldPart, id: DocumentPartId) -> Result<&str, InvariantViolation> {
    field
        .source_graph_type
        .as_deref()
        .ok_or_else(|| InvariantViolation::MissingSourceGraphType {
            field: field.name.clone(),
            part: id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_document::DocumentBuilder;
    use strata_schema::{
        FieldDefinition, InputValueDefinition, InterfaceType, ObjectType, SchemaBuilder, UnionType,
    };

    fn schema() -> Schema {
        SchemaBuilder::new()
            .add_type(
                ObjectType::new("Query")
                    .field(
                        FieldDefinition::new("field", "Int".parse().unwrap())
                            .argument(InputValueDefinition::new("x", "Int".parse().unwrap()))
                            .argument(InputValueDefinition::new("y", "Int".parse().unwrap())),
                    )
                    .field(FieldDefinition::new("other", "Int".parse().unwrap()))
                    .field(FieldDefinition::new("pet", "Pet".parse().unwrap()))
                    .field(FieldDefinition::new("being", "Being".parse().unwrap())),
            )
            .add_type(
                InterfaceType::new("Being").field(FieldDefinition::new("name", "String".parse().unwrap())),
            )
            .add_type(
                ObjectType::new("Dog")
                    .implements("Being")
                    .field(FieldDefinition::new("name", "String".parse().unwrap()))
                    .field(FieldDefinition::new("barks", "Boolean".parse().unwrap())),
            )
            .add_type(
                ObjectType::new("Cat")
                    .implements("Being")
                    .field(FieldDefinition::new("name", "String".parse().unwrap()))
                    .field(FieldDefinition::new("meows", "Int".parse().unwrap())),
            )
            .add_type(UnionType::new("Pet", ["Dog", "Cat"]))
            .build()
            .unwrap()
    }

    fn conflicts_in(source: &str, threshold: usize) -> usize {
        let schema = schema();
        let document = DocumentBuilder::new(&schema).build(source).unwrap();
        let op = document.operations()[0];
        let set = document.child_selection_set(op).unwrap();
        let mut fields = document.executable_fields(set);
        if fields.len() == 1 {
            let inner = document.child_selection_set(fields[0]).unwrap();
            fields = document.executable_fields(inner);
        }
        find_conflicts(&schema, &document, &fields, threshold).unwrap().len()
    }

    #[test]
    fn test_differing_arguments_conflict() {
        assert_eq!(conflicts_in("{ a: field(x: 1) a: field(x: 2) }", 30), 1);
        assert_eq!(conflicts_in("{ a: field(x: 1) a: field(x: 2) }", 0), 1);
    }

    #[test]
    fn test_argument_order_is_ignored() {
        assert_eq!(conflicts_in("{ field(x: 1, y: 2) field(y: 2, x: 1) }", 30), 0);
        assert_eq!(conflicts_in("{ field(x: 1, y: 2) field(y: 2, x: 1) }", 0), 0);
    }

    #[test]
    fn test_different_names_conflict() {
        assert_eq!(conflicts_in("{ a: field a: other }", 30), 1);
        assert_eq!(conflicts_in("{ a: field b: other }", 30), 0);
    }

    #[test]
    fn test_disjoint_types_coexist() {
        let source = "{ pet { ... on Dog { v: barks } ... on Cat { v: meows } } }";
        assert_eq!(conflicts_in(source, 30), 0);
        assert_eq!(conflicts_in(source, 0), 0);
    }

    #[test]
    fn test_overlapping_types_conflict() {
        let source = "{ being { ... on Being { v: name } ... on Dog { v: barks } } }";
        assert_eq!(conflicts_in(source, 30), 1);
        assert_eq!(conflicts_in(source, 0), 1);
    }

    #[test]
    fn test_merge_is_symmetric() {
        let schema = schema();
        let document = DocumentBuilder::new(&schema)
            .build("{ a: field(x: 1) a: field(x: 2) b: field b: field }")
            .unwrap();
        let set = document.child_selection_set(document.operations()[0]).unwrap();
        let fields = document.executable_fields(set);
        for &a in &fields {
            for &b in &fields {
                assert_eq!(
                    fields_can_merge(&schema, &document, a, b).unwrap(),
                    fields_can_merge(&schema, &document, b, a).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_repeated_arguments_are_symmetric() {
        let schema = schema();
        let document = DocumentBuilder::new(&schema)
            .build("{ a: field(x: 1, x: 1) a: field(x: 1, y: 2) b: field(x: 1, x: 2) b: field(x: 2, x: 1) }")
            .unwrap();
        let set = document.child_selection_set(document.operations()[0]).unwrap();
        let fields = document.executable_fields(set);
        assert_eq!(fields.len(), 4);

        let merge = |a: usize, b: usize| fields_can_merge(&schema, &document, fields[a], fields[b]).unwrap();
        assert!(!merge(0, 1));
        assert!(!merge(1, 0));
        assert!(!merge(2, 3));
        assert!(!merge(3, 2));
        assert!(merge(0, 0));
    }

    #[test]
    fn test_wide_selection_set_paths_agree() {
        let mut distinct = String::from("{");
        for i in 0..40 {
            distinct.push_str(&format!(" f{i}: field(x: {i})"));
        }
        let mut clashing = distinct.clone();
        distinct.push_str(" }");
        clashing.push_str(" f3: field(x: 99) }");

        for threshold in [0, 30, 100] {
            assert_eq!(conflicts_in(&distinct, threshold), 0);
            assert_eq!(conflicts_in(&clashing, threshold), 1);
        }
    }

    #[test]
    fn test_missing_source_type_is_an_invariant_violation() {
        let schema = schema();
        let document = DocumentBuilder::new(&schema)
            .build("{ field } fragment F on Nope { a: field a: other }")
            .unwrap();
        let fragment = document.find_fragment("F").unwrap();
        let set = document.child_selection_set(fragment).unwrap();
        let fields = document.executable_fields(set);

        assert!(matches!(
            fields_can_merge(&schema, &document, fields[0], fields[1]),
            Err(InvariantViolation::MissingSourceGraphType { .. })
        ));
    }
}
