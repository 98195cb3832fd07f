//! Query documents for strata.
//!
//! A [`QueryDocument`] is an arena of [`DocumentPart`]s built from a parsed syntax tree and a
//! [`Schema`](strata_schema::Schema). Every part knows its parent, its children (indexed by
//! kind) and the schema types it resolved to, which is what validation rules and the query
//! planner consume.
//!
//! ```ignore
//! let document = DocumentBuilder::new(&schema).build("{ hero { name } }")?;
//! let plan = QueryPlanner::new().plan(&schema, &document, None, &variables)?;
//! ```

pub mod builder;
pub mod document;
pub mod part;
pub mod plan;
pub mod value;

pub use builder::{type_expression, DocumentBuilder};
pub use document::QueryDocument;
pub use part::{
    DirectivePart, DocumentPart, DocumentPartId, DocumentPartKind, DocumentPartsCollection,
    FieldPart, FieldSelectionSetPart, FragmentSpreadPart, InlineFragmentPart, InputArgumentPart,
    NamedFragmentPart, OperationPart, PartData, SuppliedValuePart, VariablePart,
};
pub use plan::{FieldStep, PlanError, PlannerConfig, QueryPlan, QueryPlanner};
pub use value::{ScalarValueKind, SuppliedValue};
