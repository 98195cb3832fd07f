//! Command-line interface for strata.
//!
//! # Usage
//!
//! ```bash
//! # Validate a query document against a schema
//! strata validate schema.json query.graphql
//!
//! # Print the query plan of an operation
//! strata plan schema.json query.graphql --operation OnReview
//!
//! # List the supported subscription protocols
//! strata protocols
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use strata_core::{GraphMessage, GraphMessageCollection, GraphMessageSeverity};
use strata_document::{DocumentBuilder, QueryPlan, QueryPlanner};
use strata_schema::Schema;
use strata_subscriptions::{SubscriptionProtocol, SubscriptionServerOptions};
use strata_validation::{DocumentValidator, ValidationOptions};
use tracing::debug;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a query document against a schema
    #[command(alias = "check")]
    Validate {
        /// Schema file (JSON)
        schema: PathBuf,

        /// Query document
        query: PathBuf,

        /// Variables file (JSON object)
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Field count above which merge checks bucket by response key
        #[arg(long, default_value = "30")]
        merge_threshold: usize,

        /// Maximum depth of nested fragment spreads
        #[arg(long)]
        max_fragment_depth: Option<usize>,
    },

    /// Print the query plan of an operation
    Plan {
        /// Schema file (JSON)
        schema: PathBuf,

        /// Query document
        query: PathBuf,

        /// Operation to plan, required when the document has several
        #[arg(short, long)]
        operation: Option<String>,

        /// Variables file (JSON object)
        #[arg(long)]
        variables: Option<PathBuf>,
    },

    /// List the supported subscription protocols
    Protocols,

    /// Print version information
    Version,
}

pub fn run(cli: Cli) -> CliResult<i32> {
    match cli.command {
        Commands::Validate {
            schema,
            query,
            variables,
            merge_threshold,
            max_fragment_depth,
        } => {
            let mut options = ValidationOptions::new().with_merge_threshold(merge_threshold);
            options.max_fragment_depth = max_fragment_depth;
            validate_files(&schema, &query, variables.as_deref(), options, cli.verbose, cli.quiet)
        }
        Commands::Plan {
            schema,
            query,
            operation,
            variables,
        } => plan_files(&schema, &query, operation.as_deref(), variables.as_deref()),
        Commands::Protocols => {
            print!("{}", describe_protocols(&SubscriptionServerOptions::default()));
            Ok(0)
        }
        Commands::Version => {
            println!("strata {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn load_schema(path: &Path) -> CliResult<Schema> {
    let json = std::fs::read_to_string(path)?;
    let schema = Schema::from_json(&json)?;
    debug!(schema = %schema.name, types = schema.types.len(), "schema loaded");
    Ok(schema)
}

fn load_variables(path: Option<&Path>) -> CliResult<serde_json::Map<String, serde_json::Value>> {
    let Some(path) = path else {
        return Ok(serde_json::Map::new());
    };
    match serde_json::from_str(&std::fs::read_to_string(path)?)? {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        _ => Err(format!("{} must contain a JSON object", path.display()).into()),
    }
}

/// Builds and validates a document. A document that fails to parse is not validated.
pub fn check_document(
    schema: &Schema,
    source: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
    options: ValidationOptions,
) -> CliResult<GraphMessageCollection> {
    let document = match DocumentBuilder::new(schema).with_variables(variables).build(source) {
        Ok(document) => document,
        Err(messages) => return Ok(messages),
    };
    let messages = DocumentValidator::with_options(options).validate(schema, &document)?;
    Ok(messages)
}

/// Builds a document and plans one of its operations. Critical messages fail the plan.
pub fn plan_document(
    schema: &Schema,
    source: &str,
    operation: Option<&str>,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> CliResult<Result<QueryPlan, GraphMessageCollection>> {
    let document = match DocumentBuilder::new(schema).with_variables(variables).build(source) {
        Ok(document) => document,
        Err(messages) => return Ok(Err(messages)),
    };
    let messages = DocumentValidator::new().validate(schema, &document)?;
    if messages.has_critical() {
        return Ok(Err(messages));
    }
    let plan = QueryPlanner::new().plan(schema, &document, operation, variables)?;
    Ok(Ok(plan))
}

/// One line per message: severity, location, text, then the rule it enforces.
pub fn format_message(file: &Path, message: &GraphMessage) -> String {
    let mut line = match &message.location {
        Some(location) => format!("{}:{}: {}", file.display(), location, message.message),
        None => format!("{}: {}", file.display(), message.message),
    };
    if let Some(rule) = &message.rule {
        line.push_str(&format!(" [{} {}]", message.code, rule.number));
    } else {
        line.push_str(&format!(" [{}]", message.code));
    }
    line
}

fn print_messages(file: &Path, messages: &GraphMessageCollection) {
    for message in messages.iter() {
        let label = match message.severity {
            GraphMessageSeverity::Critical => "error".red().bold(),
            GraphMessageSeverity::Warning => "warning".yellow().bold(),
            _ => "info".blue(),
        };
        eprintln!("{} {} {}", label, "-->".blue(), format_message(file, message));
    }
}

fn validate_files(
    schema: &Path,
    query: &Path,
    variables: Option<&Path>,
    options: ValidationOptions,
    verbose: bool,
    quiet: bool,
) -> CliResult<i32> {
    if verbose {
        println!("{} {}", "Validating".blue(), query.display());
    }

    let schema = load_schema(schema)?;
    let variables = load_variables(variables)?;
    let source = std::fs::read_to_string(query)?;
    let messages = check_document(&schema, &source, &variables, options)?;

    if !quiet || messages.has_critical() {
        print_messages(query, &messages);
    }

    if messages.has_critical() {
        eprintln!(
            "{} {} error(s) in {}",
            "Error:".red().bold(),
            messages.critical_count(),
            query.display()
        );
        Ok(1)
    } else {
        if !quiet {
            println!("{} {} is valid", "Success:".green().bold(), query.display());
        }
        Ok(0)
    }
}

fn plan_files(
    schema: &Path,
    query: &Path,
    operation: Option<&str>,
    variables: Option<&Path>,
) -> CliResult<i32> {
    let schema = load_schema(schema)?;
    let variables = load_variables(variables)?;
    let source = std::fs::read_to_string(query)?;

    match plan_document(&schema, &source, operation, &variables)? {
        Ok(plan) => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(0)
        }
        Err(messages) => {
            eprintln!("{} Plan failed", "Error:".red().bold());
            print_messages(query, &messages);
            Ok(1)
        }
    }
}

/// Lists each protocol with the names a client may request it by.
pub fn describe_protocols(options: &SubscriptionServerOptions) -> String {
    let mut out = String::new();
    for protocol in SubscriptionProtocol::ALL {
        let supported = options.supported_protocols.contains(&protocol);
        let mut line = format!("{} ({})", protocol.name(), protocol.names().join(", "));
        if options.default_protocol == Some(protocol) {
            line.push_str(" default");
        }
        if !supported {
            line.push_str(" disabled");
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::codes;

    const SCHEMA: &str = r#"{
        "name": "reviews",
        "types": {
            "Query": {
                "kind": "OBJECT",
                "fields": {
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
            "Review": {
                "kind": "OBJECT",
                "fields": {
                    "stars": { "type": "Int!" },
                    "commentary": { "type": "String" }
                }
            }
        }
    }"#;

    fn schema() -> Schema {
        Schema::from_json(SCHEMA).unwrap()
    }

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_arguments() {
        let cli = Cli::parse_from(["strata", "plan", "schema.json", "query.graphql", "-o", "OnReview"]);
        let Commands::Plan { operation, variables, .. } = cli.command else {
            panic!("expected the plan command");
        };
        assert_eq!(operation.as_deref(), Some("OnReview"));
        assert!(variables.is_none());
    }

    #[test]
    fn test_check_valid_document() {
        let messages = check_document(
            &schema(),
            r#"{ review(id: "1") { stars } }"#,
            &serde_json::Map::new(),
            ValidationOptions::default(),
        )
        .unwrap();
        assert!(!messages.has_critical());
    }

    #[test]
    fn test_check_reports_missing_argument() {
        let messages = check_document(
            &schema(),
            "{ review { stars } }",
            &serde_json::Map::new(),
            ValidationOptions::default(),
        )
        .unwrap();
        assert!(messages.has_critical());
        assert_eq!(messages.for_rule("5.4.2.1").count(), 1);
    }

    #[test]
    fn test_check_reports_syntax_errors() {
        let messages = check_document(
            &schema(),
            "{ review(id: \"1\") { stars }",
            &serde_json::Map::new(),
            ValidationOptions::default(),
        )
        .unwrap();
        let first = messages.first().unwrap();
        assert_eq!(first.code, codes::SYNTAX_ERROR);
        assert!(first.location.is_some());
    }

    #[test]
    fn test_plan_subscription() {
        let plan = plan_document(
            &schema(),
            "subscription OnReview { reviewAdded { stars } }",
            None,
            &serde_json::Map::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(plan.root_type, "Subscription");
        assert_eq!(
            plan.subscription_root().and_then(|root| root.event_name.as_deref()),
            Some("REVIEW_ADDED")
        );
    }

    #[test]
    fn test_plan_rejects_invalid_document() {
        let messages = plan_document(&schema(), "{ nope }", None, &serde_json::Map::new())
            .unwrap()
            .unwrap_err();
        assert_eq!(messages.for_rule("5.3.1").count(), 1);
    }

    #[test]
    fn test_plan_unknown_operation() {
        let result = plan_document(
            &schema(),
            "query A { review(id: \"1\") { stars } }",
            Some("B"),
            &serde_json::Map::new(),
        );
        assert_eq!(result.unwrap_err().to_string(), "operation `B` was not found");
    }

    #[test]
    fn test_format_message() {
        let message = GraphMessage::critical(codes::SYNTAX_ERROR, "Syntax Error: Expected Name.")
            .with_location(strata_core::SourceLocation::new(2, 5, 14));
        insta::assert_snapshot!(
            format_message(Path::new("query.graphql"), &message),
            @"query.graphql:2:5: Syntax Error: Expected Name. [SYNTAX_ERROR]"
        );
    }

    #[test]
    fn test_describe_protocols() {
        let options = SubscriptionServerOptions::default().protocols([SubscriptionProtocol::GraphqlWs]);
        let text = describe_protocols(&options);
        assert_eq!(
            text,
            "graphql-transport-ws (graphql-transport-ws) disabled\n\
             graphql-ws (graphql-ws, subscription-transport-ws, subscriptions-transport-ws) default\n"
        );
    }
}
