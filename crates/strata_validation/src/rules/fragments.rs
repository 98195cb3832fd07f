//! Fragment rules.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_document::{DocumentPartId, DocumentPartKind, PartData, QueryDocument};

/// The type condition of a named or inline fragment part.
fn type_condition<'a>(document: &'a QueryDocument, part: DocumentPartId) -> Option<&'a str> {
    match &document.part(part).data {
        PartData::NamedFragment(fragment) => Some(&fragment.type_condition),
        PartData::InlineFragment(inline) => inline.type_condition.as_deref(),
        _ => None,
    }
}

/// 5.5.1.1: fragment names must be unique.
pub struct FragmentNameUniqueness;

impl DocumentRule for FragmentNameUniqueness {
    rule_metadata!(
        DocumentPartKind::Document,
        "5.5.1.1",
        "sec-Fragment-Name-Uniqueness"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let mut passed = true;
        let mut seen = FxHashSet::default();
        for &fragment in ctx.document.named_fragments() {
            let Some(data) = ctx.document.named_fragment(fragment) else {
                continue;
            };
            if !seen.insert(data.name.as_str()) {
                ctx.report_at(
                    fragment,
                    self.reference(),
                    format!("Multiple fragments are named '{}'.", data.name),
                );
                passed = false;
            }
        }
        Ok(passed)
    }
}

/// 5.5.1.2: a fragment's type condition must name a known type.
pub struct FragmentSpreadTypeExistence {
    kind: DocumentPartKind,
}

impl FragmentSpreadTypeExistence {
    pub fn on_named_fragments() -> Self {
        Self {
            kind: DocumentPartKind::NamedFragment,
        }
    }

    pub fn on_inline_fragments() -> Self {
        Self {
            kind: DocumentPartKind::InlineFragment,
        }
    }
}

impl DocumentRule for FragmentSpreadTypeExistence {
    rule_metadata!("5.5.1.2", "sec-Fragment-Spread-Type-Existence");

    fn part_kind(&self) -> DocumentPartKind {
        self.kind
    }

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        type_condition(ctx.document, ctx.active_part()).is_some()
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let condition = type_condition(ctx.document, ctx.active_part()).unwrap_or_default();
        if ctx.schema.find_graph_type(condition).is_some() {
            return Ok(true);
        }
        ctx.report(
            self.reference(),
            format!("Fragment type condition '{condition}' is not a known type."),
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

/// 5.5.1.3: fragments may only be declared on objects, interfaces and unions.
pub struct FragmentsOnCompositeTypes {
    kind: DocumentPartKind,
}

impl FragmentsOnCompositeTypes {
    pub fn on_named_fragments() -> Self {
        Self {
            kind: DocumentPartKind::NamedFragment,
        }
    }

    pub fn on_inline_fragments() -> Self {
        Self {
            kind: DocumentPartKind::InlineFragment,
        }
    }
}

impl DocumentRule for FragmentsOnCompositeTypes {
    rule_metadata!("5.5.1.3", "sec-Fragments-On-Composite-Types");

    fn part_kind(&self) -> DocumentPartKind {
        self.kind
    }

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        type_condition(ctx.document, ctx.active_part())
            .is_some_and(|name| ctx.schema.find_graph_type(name).is_some())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let condition = type_condition(ctx.document, ctx.active_part()).unwrap_or_default();
        let composite = ctx
            .schema
            .find_graph_type(condition)
            .is_some_and(|ty| ty.is_composite());
        if !composite {
            ctx.report(
                self.reference(),
                format!("Fragments cannot be declared on the non-composite type '{condition}'."),
            );
        }
        Ok(composite)
    }

    fn should_allow_child_contexts_to_execute(
        &self,
        _ctx: &DocumentValidationContext<'_>,
        passed: bool,
    ) -> bool {
        passed
    }
}

/// 5.5.1.4: every declared fragment must be spread somewhere.
pub struct FragmentsMustBeUsed;

impl DocumentRule for FragmentsMustBeUsed {
    rule_metadata!(
        DocumentPartKind::Document,
        "5.5.1.4",
        "sec-Fragments-Must-Be-Used"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;
        let used: FxHashSet<&str> = document
            .descendants(document.root())
            .into_iter()
            .filter_map(|part| document.fragment_spread(part))
            .map(|spread| spread.fragment_name.as_str())
            .collect();

        let mut passed = true;
        for &fragment in document.named_fragments() {
            let Some(data) = document.named_fragment(fragment) else {
                continue;
            };
            if !used.contains(data.name.as_str()) {
                ctx.report_at(
                    fragment,
                    self.reference(),
                    format!("Fragment '{}' is never used.", data.name),
                );
                passed = false;
            }
        }
        Ok(passed)
    }
}

/// 5.5.2.1: a spread must target a declared fragment.
pub struct FragmentSpreadTargetDefined;

impl DocumentRule for FragmentSpreadTargetDefined {
    rule_metadata!(
        DocumentPartKind::FragmentSpread,
        "5.5.2.1",
        "sec-Fragment-spread-target-defined"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let spread = ctx
            .document
            .fragment_spread(ctx.active_part())
            .ok_or_else(|| ctx.unexpected(DocumentPartKind::FragmentSpread))?;
        if spread.fragment.is_some() {
            return Ok(true);
        }
        ctx.report(
            self.reference(),
            format!("Fragment '{}' is not defined.", spread.fragment_name),
        );
        Ok(false)
    }
}

/// 5.5.2.2: fragment spreads must not form cycles.
///
/// Also enforces [`ValidationOptions::max_fragment_depth`](crate::ValidationOptions).
pub struct FragmentSpreadsMustNotFormCycles;

impl DocumentRule for FragmentSpreadsMustNotFormCycles {
    rule_metadata!(
        DocumentPartKind::Document,
        "5.5.2.2",
        "sec-Fragment-spreads-must-not-form-cycles"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let document = ctx.document;

        // fragment -> fragments it spreads
        let mut edges: FxHashMap<DocumentPartId, Vec<DocumentPartId>> = FxHashMap::default();
        for &fragment in document.named_fragments() {
            let targets = document
                .descendants(fragment)
                .into_iter()
                .filter_map(|part| document.fragment_spread(part)?.fragment)
                .collect();
            edges.insert(fragment, targets);
        }

        let mut passed = true;
        let mut in_cycle = FxHashSet::default();
        for &fragment in document.named_fragments() {
            if in_cycle.contains(&fragment) {
                continue;
            }
            let mut walk = CycleWalk {
                edges: &edges,
                start: fragment,
                path: vec![fragment],
                visited: FxHashSet::default(),
                cycle: None,
                deepest: 0,
            };
            walk.visit(fragment);
            let name = document
                .named_fragment(fragment)
                .map(|f| f.name.as_str())
                .unwrap_or_default();

            if let Some(cycle) = walk.cycle {
                let names: Vec<_> = cycle
                    .iter()
                    .chain(std::iter::once(&fragment))
                    .filter_map(|&id| document.named_fragment(id).map(|f| f.name.as_str()))
                    .collect();
                in_cycle.extend(cycle);
                ctx.report_at(
                    fragment,
                    self.reference(),
                    format!("Fragment '{name}' spreads itself: {}.", names.join(" -> ")),
                );
                passed = false;
                continue;
            }

            if let Some(max) = ctx.options.max_fragment_depth {
                if walk.deepest > max {
                    ctx.report_at(
                        fragment,
                        self.reference(),
                        format!(
                            "Fragment '{name}' nests fragment spreads {} levels deep, the limit is {max}.",
                            walk.deepest
                        ),
                    );
                    passed = false;
                }
            }
        }
        Ok(passed)
    }
}

struct CycleWalk<'w> {
    edges: &'w FxHashMap<DocumentPartId, Vec<DocumentPartId>>,
    start: DocumentPartId,
    path: Vec<DocumentPartId>,
    visited: FxHashSet<DocumentPartId>,
    cycle: Option<Vec<DocumentPartId>>,
    deepest: usize,
}

impl CycleWalk<'_> {
    fn visit(&mut self, fragment: DocumentPartId) {
        self.deepest = self.deepest.max(self.path.len() - 1);
        let Some(targets) = self.edges.get(&fragment) else {
            return;
        };
        for &target in targets {
            if self.cycle.is_some() {
                return;
            }
            if target == self.start {
                self.cycle = Some(self.path.clone());
                return;
            }
            // cycles that do not pass through `start` are reported from their own members
            if !self.visited.insert(target) || self.path.contains(&target) {
                continue;
            }
            self.path.push(target);
            self.visit(target);
            self.path.pop();
        }
    }
}

/// 5.5.2.3: a fragment may only be spread where its type condition can apply.
pub struct FragmentSpreadIsPossible {
    kind: DocumentPartKind,
}

impl FragmentSpreadIsPossible {
    pub fn on_spreads() -> Self {
        Self {
            kind: DocumentPartKind::FragmentSpread,
        }
    }

    pub fn on_inline_fragments() -> Self {
        Self {
            kind: DocumentPartKind::InlineFragment,
        }
    }

    /// The fragment name for messages and the type condition of the spread target.
    fn target<'a>(
        ctx: &DocumentValidationContext<'a>,
        part: DocumentPartId,
    ) -> Option<(String, &'a str)> {
        let document = ctx.document;
        match &document.part(part).data {
            PartData::FragmentSpread(spread) => {
                let fragment = spread.fragment?;
                let condition = type_condition(document, fragment)?;
                Some((format!("Fragment '{}'", spread.fragment_name), condition))
            }
            PartData::InlineFragment(inline) => {
                let condition = inline.type_condition.as_deref()?;
                Some((format!("Inline fragment on '{condition}'"), condition))
            }
            _ => None,
        }
    }
}

impl DocumentRule for FragmentSpreadIsPossible {
    rule_metadata!("5.5.2.3", "sec-Fragment-spread-is-possible");

    fn part_kind(&self) -> DocumentPartKind {
        self.kind
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let part = ctx.active_part();
        let Some((label, condition)) = Self::target(ctx, part) else {
            return Ok(true);
        };
        let Some(parent_type) = ctx
            .document
            .parent(part)
            .and_then(|set| ctx.document.selection_set(set))
            .and_then(|set| set.graph_type.as_deref())
        else {
            return Ok(true);
        };

        let both_composite = [parent_type, condition].iter().all(|name| {
            ctx.schema
                .find_graph_type(name)
                .is_some_and(|ty| ty.is_composite())
        });
        if !both_composite || ctx.schema.types_can_overlap(parent_type, condition) {
            return Ok(true);
        }

        ctx.report(
            self.reference(),
            format!(
                "{label} cannot be spread here: objects of type '{parent_type}' can never be of type '{condition}'."
            ),
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{messages_for, messages_with, rule_numbers};
    use crate::ValidationOptions;

    #[test]
    fn test_duplicate_fragment_names() {
        let messages = messages_for(
            "{ hero { ...F } } fragment F on Character { name } fragment F on Character { name }",
        );
        assert_eq!(rule_numbers(&messages), vec!["5.5.1.1"]);
    }

    #[test]
    fn test_unknown_type_condition() {
        let messages = messages_for("{ hero { ...F } } fragment F on Wizard { name }");
        assert_eq!(rule_numbers(&messages), vec!["5.5.1.2"]);
    }

    #[test]
    fn test_fragment_on_scalar() {
        let messages = messages_for("{ hero { ... on String { length } } }");
        assert_eq!(rule_numbers(&messages), vec!["5.5.1.3"]);
    }

    #[test]
    fn test_unused_fragment() {
        let messages = messages_for("{ hero { name } } fragment F on Character { name }");
        assert_eq!(rule_numbers(&messages), vec!["5.5.1.4"]);
    }

    #[test]
    fn test_undefined_spread_target() {
        let messages = messages_for("{ hero { ...Missing } }");
        assert!(rule_numbers(&messages).contains(&"5.5.2.1"));
    }

    #[test]
    fn test_fragment_cycle() {
        let messages = messages_for(
            "{ hero { ...A } } fragment A on Character { ...B } fragment B on Character { ...A }",
        );
        let cycles: Vec<_> = messages.for_rule("5.5.2.2").collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].message, "Fragment 'A' spreads itself: A -> B -> A.");
    }

    #[test]
    fn test_fragment_depth_limit() {
        let source = "{ hero { ...A } } \
            fragment A on Character { ...B } \
            fragment B on Character { ...C } \
            fragment C on Character { name }";
        assert!(messages_for(source).is_empty());

        let options = ValidationOptions::new().with_max_fragment_depth(1);
        let messages = messages_with(source, options);
        assert_eq!(rule_numbers(&messages), vec!["5.5.2.2"]);
    }

    #[test]
    fn test_impossible_spread() {
        let messages = messages_for("{ hero { ... on Review { stars } } }");
        assert_eq!(rule_numbers(&messages), vec!["5.5.2.3"]);
    }

    #[test]
    fn test_abstract_spreads_are_possible() {
        let messages = messages_for(
            "{ search(text: \"r2\") { ... on Character { name } ... on Droid { primaryFunction } } }",
        );
        assert!(messages.is_empty(), "{messages:?}");
    }
}
