//! Integration tests for validating documents against a JSON schema.

use serde_json::json;
use strata_document::DocumentBuilder;
use strata_schema::{Schema, TypeExpression};
use strata_validation::{
    complete_value, validate_document, CompletionFailureKind, DocumentValidator,
    ValidationOptions,
};

const SCHEMA: &str = r#"{
    "name": "starwars",
    "types": {
        "Query": {
            "kind": "OBJECT",
            "fields": {
                "hero": {
                    "type": "Character",
                    "arguments": { "episode": { "type": "Episode" } }
                },
                "review": {
                    "type": "Review",
                    "arguments": { "id": { "type": "ID!" } }
                }
            }
        },
        "Subscription": {
            "kind": "OBJECT",
            "fields": {
                "reviewAdded": { "type": "Review", "event_name": "REVIEW_ADDED" }
            }
        },
        "Character": {
            "kind": "INTERFACE",
            "fields": {
                "name": { "type": "String" },
                "friends": { "type": "[Character]" }
            }
        },
        "Human": {
            "kind": "OBJECT",
            "implements": ["Character"],
            "fields": {
                "name": { "type": "String" },
                "friends": { "type": "[Character]" },
                "height": { "type": "Float" }
            }
        },
        "Episode": {
            "kind": "ENUM",
            "values": [{ "name": "NEWHOPE" }, { "name": "EMPIRE" }, { "name": "JEDI" }]
        },
        "Review": {
            "kind": "OBJECT",
            "fields": { "stars": { "type": "Int!" } }
        }
    }
}"#;

fn render(schema: &Schema, source: &str) -> String {
    let document = DocumentBuilder::new(schema).build(source).unwrap();
    validate_document(schema, &document)
        .unwrap()
        .iter()
        .map(|m| format!("{}: {}", m.rule_number().unwrap_or("-"), m.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Test a well formed document produces no messages.
#[test]
fn test_valid_document() {
    let schema = Schema::from_json(SCHEMA).unwrap();
    let source = r#"
        query Hero($episode: Episode = JEDI, $withFriends: Boolean!) {
            hero(episode: $episode) {
                ...Names
                friends @include(if: $withFriends) {
                    ... on Human { height }
                }
            }
        }

        fragment Names on Character { name }
    "#;
    assert_eq!(render(&schema, source), "");
}

/// Test independent mistakes are all reported, in document order.
#[test]
fn test_reports_every_violation() {
    let schema = Schema::from_json(SCHEMA).unwrap();
    let source = r#"
        query Hero($episode: Episode, $unused: Int) {
            hero(episode: $episode) {
                name
                height
            }
            review { stars }
        }
    "#;
    insta::assert_snapshot!(render(&schema, source), @r"
    5.8.4: Variable '$unused' is never used in operation 'Hero'.
    5.3.1: Field 'height' is not defined on type 'Character'.
    5.4.2.1: Required argument 'id' of type 'ID!' is missing on field 'Query.review'.
    ");
}

/// Test fields sharing a response key must agree, while distinct aliases never conflict.
#[test]
fn test_alias_conflicts() {
    let schema = Schema::from_json(SCHEMA).unwrap();

    let distinct = "{ a: hero(episode: JEDI) { name } b: hero(episode: EMPIRE) { name } }";
    assert_eq!(render(&schema, distinct), "");

    let shared = "{ a: hero(episode: JEDI) { name } a: hero(episode: EMPIRE) { name } }";
    insta::assert_snapshot!(render(&schema, shared), @"5.3.2: Fields selected as 'a' on type 'Query' have different names, return types or arguments and their parent types can overlap. Use different aliases to select them.");
}

/// Test the bucketed merge check agrees with the brute force one.
#[test]
fn test_merge_threshold_does_not_change_results() {
    let schema = Schema::from_json(SCHEMA).unwrap();
    let mut source = String::from("{ ");
    for i in 0..40 {
        source.push_str(&format!("f{i}: hero {{ name }} "));
    }
    source.push_str("f7: review(id: 1) { stars } }");
    let document = DocumentBuilder::new(&schema).build(&source).unwrap();

    for threshold in [0, 30, 1000] {
        let options: ValidationOptions =
            serde_json::from_value(json!({ "merge_brute_force_threshold": threshold })).unwrap();
        let messages = DocumentValidator::with_options(options)
            .validate(&schema, &document)
            .unwrap();
        let rules: Vec<_> = messages.iter().filter_map(|m| m.rule_number()).collect();
        assert_eq!(rules, vec!["5.3.2"], "threshold {threshold}");
    }
}

/// Test a subscription must select a single root field.
#[test]
fn test_subscription_root_fields() {
    let schema = Schema::from_json(SCHEMA).unwrap();
    assert_eq!(render(&schema, "subscription { reviewAdded { stars } }"), "");
    insta::assert_snapshot!(
        render(&schema, "subscription OnReview { reviewAdded { stars } __typename }"),
        @"5.2.3.1: Subscription 'OnReview' must select exactly one top level field, found 2."
    );
}

/// Test value completion against the JSON schema.
#[test]
fn test_value_completion() {
    let schema = Schema::from_json(SCHEMA).unwrap();
    let hero: TypeExpression = "Character".parse().unwrap();

    let valid = json!({ "__typename": "Human", "name": "Leia", "height": 1.5 });
    assert!(complete_value(&schema, &valid, &hero).is_empty());

    let invalid = json!({
        "__typename": "Human",
        "friends": [{ "__typename": "Review", "stars": 5 }, null]
    });
    let failures = complete_value(&schema, &invalid, &hero);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, CompletionFailureKind::ConcreteTypeMismatch);
    assert_eq!(failures[0].path_display(), "friends[0]");
    insta::assert_snapshot!(failures[0].to_message().message, @"Field 'friends[0]' resolved to an object of type 'Review', which is not a valid value of type 'Character'.");
}
