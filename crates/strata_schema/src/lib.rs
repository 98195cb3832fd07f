//! Schema catalog for strata.
//!
//! The schema is a read-only catalog consulted by document construction, validation and
//! value completion. It is usually loaded from JSON:
//!
//! ```json
//! {
//!   "name": "reviews",
//!   "types": {
//!     "Query": { "kind": "OBJECT", "fields": { "ok": { "type": "Boolean" } } }
//!   }
//! }
//! ```

pub mod error;
pub mod schema;
pub mod type_expression;
pub mod types;

pub use error::{SchemaError, SchemaResult};
pub use schema::{ResponseOptions, Schema, SchemaBuilder, BUILT_IN_SCALARS, TYPENAME_FIELD};
pub use type_expression::TypeExpression;
pub use types::{
    DirectiveDefinition, EnumType, EnumValueDefinition, FieldDefinition, GraphType,
    InputObjectType, InputValueDefinition, InterfaceType, ObjectType, ScalarType, TypeKind,
    UnionType,
};
