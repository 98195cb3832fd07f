//! Integration tests for parsing executable documents.

use std::fmt::Write;
use strata_core::Interner;
use strata_syntax::{parse, Definition, Selection, SelectionSet};

fn outline_selections(out: &mut String, interner: &Interner, set: &SelectionSet<'_>, depth: usize) {
    for selection in &set.selections {
        let indent = "  ".repeat(depth);
        match selection {
            Selection::Field(field) => {
                let name = interner.get(field.name.value);
                match field.alias {
                    Some(alias) => {
                        let _ = writeln!(out, "{indent}field {}: {name}", interner.get(alias.value));
                    }
                    None => {
                        let _ = writeln!(out, "{indent}field {name}");
                    }
                }
                if let Some(children) = &field.selection_set {
                    outline_selections(out, interner, children, depth + 1);
                }
            }
            Selection::FragmentSpread(spread) => {
                let _ = writeln!(out, "{indent}spread {}", interner.get(spread.name.value));
            }
            Selection::InlineFragment(inline) => {
                let condition = inline
                    .type_condition
                    .map_or_else(|| "*".to_string(), |name| interner.get(name.value));
                let _ = writeln!(out, "{indent}inline on {condition}");
                outline_selections(out, interner, &inline.selection_set, depth + 1);
            }
        }
    }
}

fn outline(source: &str) -> String {
    let interner = Interner::new();
    let result = parse(source, &interner);
    assert!(result.is_ok(), "unexpected errors: {:?}", result.messages);

    let mut out = String::new();
    for definition in &result.document.definitions {
        match definition {
            Definition::Operation(op) => {
                let name = op
                    .name
                    .map_or_else(|| "<anonymous>".to_string(), |n| interner.get(n.value));
                let _ = writeln!(out, "{} {name}", op.operation);
                outline_selections(&mut out, &interner, &op.selection_set, 1);
            }
            Definition::Fragment(fragment) => {
                let _ = writeln!(
                    out,
                    "fragment {} on {}",
                    interner.get(fragment.name.value),
                    interner.get(fragment.type_condition.value)
                );
                outline_selections(&mut out, &interner, &fragment.selection_set, 1);
            }
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Test the outline of a document mixing operations and fragments.
#[test]
fn test_document_outline() {
    let source = r#"
        query HeroQuery($withFriends: Boolean = false) {
            hero {
                name
                ...Appearances
                friends @include(if: $withFriends) {
                    name
                }
            }
        }

        subscription {
            newReview: reviewAdded(episode: JEDI) {
                stars
                ... on Review { commentary }
            }
        }

        fragment Appearances on Character {
            appearsIn
            ... { id }
        }
    "#;

    insta::assert_snapshot!(outline(source), @r"
    query HeroQuery
      field hero
        field name
        spread Appearances
        field friends
          field name
    subscription <anonymous>
      field newReview: reviewAdded
        field stars
        inline on Review
          field commentary
    fragment Appearances on Character
      field appearsIn
      inline on *
        field id
    ");
}

/// Test that a malformed document reports exactly one syntax error.
#[test]
fn test_single_syntax_error() {
    let interner = Interner::new();
    let result = parse("subscription { reviewAdded(episode: ) { stars } }", &interner);

    assert_eq!(result.messages.len(), 1);
    let message = result.messages.first().unwrap();
    assert_eq!(message.code, strata_core::codes::SYNTAX_ERROR);
    insta::assert_snapshot!(message.message, @r#"Syntax Error: Unexpected ")"."#);
}
