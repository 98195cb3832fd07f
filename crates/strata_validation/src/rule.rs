//! The rule step contract.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use strata_core::RuleReference;
use strata_document::DocumentPartKind;

/// One validation rule, applied to every part of one kind.
pub trait DocumentRule: Send + Sync {
    /// The kind of part this rule checks.
    fn part_kind(&self) -> DocumentPartKind;

    /// Rule number in the GraphQL specification, e.g. `5.3.2`.
    fn rule_number(&self) -> &'static str;

    /// Anchor url of the rule.
    fn rule_anchor(&self) -> &'static str;

    /// Guard evaluated before [`execute`](Self::execute).
    fn should_execute(&self, _ctx: &DocumentValidationContext<'_>) -> bool {
        true
    }

    /// Checks the active part. Returns `false` after reporting a violation.
    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation>;

    /// Whether the walker may descend into the active part's children. `passed` is the result
    /// of [`execute`](Self::execute), or `true` when the rule did not run.
    fn should_allow_child_contexts_to_execute(
        &self,
        _ctx: &DocumentValidationContext<'_>,
        _passed: bool,
    ) -> bool {
        true
    }

    fn reference(&self) -> RuleReference {
        RuleReference::new(self.rule_number(), self.rule_anchor())
    }
}

/// Declares the kind, number and anchor of a rule.
macro_rules! rule_metadata {
    ($number:literal, $anchor:literal) => {
        fn rule_number(&self) -> &'static str {
            $number
        }

        fn rule_anchor(&self) -> &'static str {
            concat!("https://spec.graphql.org/October2021/#", $anchor)
        }
    };
    ($kind:expr, $number:literal, $anchor:literal) => {
        fn part_kind(&self) -> strata_document::DocumentPartKind {
            $kind
        }

        $crate::rule::rule_metadata!($number, $anchor);
    };
}

pub(crate) use rule_metadata;
