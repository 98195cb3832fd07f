//! Argument rules for fields and directives.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::rule::{rule_metadata, DocumentRule};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use strata_document::{DocumentPartId, DocumentPartKind, PartData};
use strata_schema::InputValueDefinition;

/// Returns the argument definitions of a field or directive part, if the schema declares it.
fn declared_arguments<'a>(
    ctx: &DocumentValidationContext<'a>,
    owner: DocumentPartId,
) -> Option<&'a IndexMap<String, InputValueDefinition>> {
    match &ctx.document.part(owner).data {
        PartData::Field(_) => ctx.field_definition(owner).map(|f| &f.arguments),
        PartData::Directive(directive) => ctx
            .schema
            .find_directive(&directive.name)
            .map(|d| &d.arguments),
        _ => None,
    }
}

/// 5.4.1: every supplied argument must be declared by its field or directive.
pub struct ArgumentNames;

impl DocumentRule for ArgumentNames {
    rule_metadata!(
        DocumentPartKind::InputArgument,
        "5.4.1",
        "sec-Argument-Names"
    );

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        ctx.document
            .parent(ctx.active_part())
            .is_some_and(|owner| declared_arguments(ctx, owner).is_some())
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let argument = ctx.active_part();
        if ctx.argument_definition(argument).is_some() {
            return Ok(true);
        }

        let owner = ctx
            .document
            .parent(argument)
            .ok_or_else(|| ctx.unexpected(DocumentPartKind::InputArgument))?;
        let name = ctx.document.argument_name(argument).unwrap_or_default();
        let message = format!(
            "Argument '{name}' is not defined on {}.",
            ctx.describe_owner(owner)
        );
        ctx.report(self.reference(), message);
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

/// 5.4.2: an argument may be supplied at most once per field or directive.
///
/// Also applied to complex values, whose fields must be unique as well (5.6.3).
pub struct ArgumentUniqueness {
    kind: DocumentPartKind,
}

impl ArgumentUniqueness {
    pub fn on_fields() -> Self {
        Self {
            kind: DocumentPartKind::Field,
        }
    }

    pub fn on_directives() -> Self {
        Self {
            kind: DocumentPartKind::Directive,
        }
    }
}

impl DocumentRule for ArgumentUniqueness {
    rule_metadata!("5.4.2", "sec-Argument-Uniqueness");

    fn part_kind(&self) -> DocumentPartKind {
        self.kind
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let duplicates = duplicate_arguments(ctx, ctx.active_part());
        for (argument, name) in &duplicates {
            ctx.report_at(
                *argument,
                self.reference(),
                format!("Argument '{name}' is supplied more than once."),
            );
        }
        Ok(duplicates.is_empty())
    }
}

/// Returns every argument of `owner` whose name was already supplied by an earlier argument.
pub(crate) fn duplicate_arguments<'a>(
    ctx: &DocumentValidationContext<'a>,
    owner: DocumentPartId,
) -> Vec<(DocumentPartId, &'a str)> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut duplicates = Vec::new();
    for &argument in ctx
        .document
        .children_of_kind(owner, DocumentPartKind::InputArgument)
    {
        let Some(name) = ctx.document.argument_name(argument) else {
            continue;
        };
        let count = counts.entry(name).or_default();
        *count += 1;
        if *count == 2 {
            duplicates.push((argument, name));
        }
    }
    duplicates
}

/// 5.4.2.1: required arguments must be supplied.
///
/// An argument is required when it is non-null, has no default value and is not internal.
pub struct RequiredArguments {
    kind: DocumentPartKind,
}

impl RequiredArguments {
    pub fn on_fields() -> Self {
        Self {
            kind: DocumentPartKind::Field,
        }
    }

    pub fn on_directives() -> Self {
        Self {
            kind: DocumentPartKind::Directive,
        }
    }
}

impl DocumentRule for RequiredArguments {
    rule_metadata!("5.4.2.1", "sec-Required-Arguments");

    fn part_kind(&self) -> DocumentPartKind {
        self.kind
    }

    fn should_execute(&self, ctx: &DocumentValidationContext<'_>) -> bool {
        declared_arguments(ctx, ctx.active_part()).is_some()
    }

    fn execute(&self, ctx: &mut DocumentValidationContext<'_>) -> Result<bool, InvariantViolation> {
        let owner = ctx.active_part();
        let Some(declared) = declared_arguments(ctx, owner) else {
            return Ok(true);
        };

        let mut passed = true;
        for definition in declared.values().filter(|d| d.is_required()) {
            if ctx.document.argument_value(owner, &definition.name).is_some() {
                continue;
            }
            let message = format!(
                "Required argument '{}' of type '{}' is missing on {}.",
                definition.name,
                definition.ty,
                ctx.describe_owner(owner)
            );
            ctx.report(self.reference(), message);
            passed = false;
        }
        Ok(passed)
    }
}
