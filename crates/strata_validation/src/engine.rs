//! The rule walker.

use crate::context::DocumentValidationContext;
use crate::error::InvariantViolation;
use crate::options::ValidationOptions;
use crate::rule::DocumentRule;
use crate::rules;
use rustc_hash::FxHashMap;
use strata_core::GraphMessageCollection;
use strata_document::{DocumentPartKind, QueryDocument};
use strata_schema::Schema;
use tracing::{debug, trace};

/// Rules grouped by the part kind they check. Rules of one kind run in insertion order.
#[derive(Default)]
pub struct RuleSet {
    steps: FxHashMap<DocumentPartKind, Vec<Box<dyn DocumentRule>>>,
    len: usize,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet").field("len", &self.len).finish()
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full GraphQL validation rule set.
    pub fn standard() -> Self {
        let mut set = Self::new();
        for rule in rules::standard_rules() {
            set.add(rule);
        }
        set
    }

    pub fn add(&mut self, rule: Box<dyn DocumentRule>) {
        self.steps.entry(rule.part_kind()).or_default().push(rule);
        self.len += 1;
    }

    #[must_use]
    pub fn with(mut self, rule: impl DocumentRule + 'static) -> Self {
        self.add(Box::new(rule));
        self
    }

    /// Rules for one part kind, in execution order.
    #[must_use]
    pub fn rules_for(&self, kind: DocumentPartKind) -> &[Box<dyn DocumentRule>] {
        self.steps.get(&kind).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Validates query documents against a rule set.
#[derive(Debug)]
pub struct DocumentValidator {
    rules: RuleSet,
    options: ValidationOptions,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentValidator {
    /// Creates a validator with the standard rules.
    pub fn new() -> Self {
        Self::with_options(ValidationOptions::default())
    }

    pub fn with_options(options: ValidationOptions) -> Self {
        Self {
            rules: RuleSet::standard(),
            options,
        }
    }

    pub fn with_rules(rules: RuleSet, options: ValidationOptions) -> Self {
        Self { rules, options }
    }

    #[must_use]
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Walks the document depth first and returns every violation found.
    ///
    /// User errors are returned as messages. `Err` means the document itself is in a state
    /// the builder never produces.
    pub fn validate(
        &self,
        schema: &Schema,
        document: &QueryDocument,
    ) -> Result<GraphMessageCollection, InvariantViolation> {
        let mut ctx = DocumentValidationContext::new(schema, document, &self.options);
        let mut stack = vec![document.root()];

        while let Some(part) = stack.pop() {
            ctx.set_active(part);
            let mut allow_children = true;

            for rule in self.rules.rules_for(document.kind(part)) {
                let passed = if rule.should_execute(&ctx) {
                    rule.execute(&mut ctx)?
                } else {
                    true
                };
                if !rule.should_allow_child_contexts_to_execute(&ctx, passed) {
                    trace!(part = %part, rule = rule.rule_number(), "children skipped");
                    allow_children = false;
                }
            }

            if allow_children {
                stack.extend(document.children(part).iter().rev());
            }
        }

        let messages = ctx.into_messages();
        debug!(
            rules = self.rules.len(),
            parts = document.len(),
            messages = messages.len(),
            "document validated"
        );
        Ok(messages)
    }
}

/// Validates a document with the standard rules and default options.
pub fn validate_document(
    schema: &Schema,
    document: &QueryDocument,
) -> Result<GraphMessageCollection, InvariantViolation> {
    DocumentValidator::new().validate(schema, document)
}
