//! Directive rules.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use strata_document::{DirectivePart, DocumentPartKind};

fn active_directive<'a>(
    ctx: &DocumentValidationContext<'a>,
) -> Result<&'a DirectivePart, InvariantViolation> {
    match &ctx.part().data {
        strata_document::PartData::Directive(directive) => Ok(directive),
        _ => Err(ctx.unexpected(DocumentPartKind::Directive)),
    }
}

fn is_defined(ctx: &DocumentValidationContext<'_>) -> bool {
    active_directive(ctx).is_ok_and(|d| ctx.schema.find_directive(&d.name).is_some())
}

/// 5.7.1: directives must be declared by the schema.
pub struct DirectivesAreDefined;

impl DocumentRule for DirectivesAreDefined {
    rule_metadata!(
        DocumentPartKind::Directive,
        "5.7.1",
        "sec-Directives-Are-Defined"
    );

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let directive = active_directive(ctx)?;
        if ctx.schema.find_directive(&directive.name).is_some() {
            return Ok(true);
        }
        ctx.report(
            self.reference(),
            format!("Unknown directive '@{}'.", directive.name),
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

/// 5.7.2: directives may only appear at the locations they declare.
pub struct DirectivesInValidLocations;

impl DocumentRule for DirectivesInValidLocations {
    rule_metadata!(
        DocumentPartKind::Directive,
        "5.7.2",
        "sec-Directives-Are-In-Valid-Locations"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        is_defined(ctx)
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let directive = active_directive(ctx)?;
        let valid = ctx
            .schema
            .find_directive(&directive.name)
            .is_some_and(|d| d.is_valid_at(directive.location));
        if !valid {
            ctx.report(
                self.reference(),
                format!(
                    "Directive '@{}' may not be used on {}.",
                    directive.name, directive.location
                ),
            );
        }
        Ok(valid)
    }
}

/// 5.7.3: a non-repeatable directive may appear once per location.
pub struct DirectivesAreUniquePerLocation;

impl DocumentRule for DirectivesAreUniquePerLocation {
    rule_metadata!(
        DocumentPartKind::Directive,
        "5.7.3",
        "sec-Directives-Are-Unique-Per-Location"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        active_directive(ctx).is_ok_and(|d| {
            ctx.schema
                .find_directive(&d.name)
                .is_some_and(|definition| !definition.repeatable)
        })
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let directive = active_directive(ctx)?;
        let active = ctx.active_part();
        let Some(owner) = ctx.document.parent(active) else {
            return Ok(true);
        };

        // report from the second occurrence onwards
        let repeated = ctx
            .document
            .children_of_kind(owner, DocumentPartKind::Directive)
            .iter()
            .take_while(|&&sibling| sibling != active)
            .any(|&sibling| match &ctx.document.part(sibling).data {
                strata_document::PartData::Directive(other) => other.name == directive.name,
                _ => false,
            });
        if repeated {
            ctx.report(
                self.reference(),
                format!(
                    "Directive '@{}' may only be used once at this location.",
                    directive.name
                ),
            );
        }
        Ok(!repeated)
    }
}
