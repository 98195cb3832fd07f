//! The GraphQL document validation rules.
//!
//! Each rule checks one part kind. Rules are numbered after the section of the GraphQL
//! specification they implement.

pub mod arguments;
pub mod directives;
pub mod field_merge;
pub mod fields;
pub mod fragments;
pub mod operations;
pub mod values;
pub mod variables;

use crate::rule::DocumentRule;

pub use arguments::{ArgumentNames, ArgumentUniqueness, RequiredArguments};
pub use directives::{DirectivesAreDefined, DirectivesAreUniquePerLocation, DirectivesInValidLocations};
pub use field_merge::{fields_can_merge, find_conflicts, FieldSelectionMerging};
pub use fields::{FieldSelectionsOnObjects, LeafFieldSelections};
pub use fragments::{
    FragmentNameUniqueness, FragmentSpreadIsPossible, FragmentSpreadTargetDefined,
    FragmentSpreadTypeExistence, FragmentSpreadsMustNotFormCycles, FragmentsMustBeUsed,
    FragmentsOnCompositeTypes,
};
pub use operations::{
    LoneAnonymousOperation, OperationNameUniqueness, OperationRootTypeExists,
    SubscriptionSingleRootField,
};
pub use values::{
    InputObjectFieldNames, InputObjectFieldUniqueness, InputObjectRequiredFields,
    ValuesOfCorrectType,
};
pub use variables::{
    AllVariableUsagesAllowed, AllVariableUsesDefined, AllVariablesUsed, VariableUniqueness,
    VariablesAreInputTypes,
};

/// Every rule, in the order it runs for its part kind.
pub fn standard_rules() -> Vec<Box<dyn DocumentRule>> {
    vec![
        // document
        Box::new(OperationNameUniqueness),
        Box::new(LoneAnonymousOperation),
        Box::new(FragmentNameUniqueness),
        Box::new(FragmentsMustBeUsed),
        Box::new(FragmentSpreadsMustNotFormCycles),
        // operations
        Box::new(OperationRootTypeExists),
        Box::new(SubscriptionSingleRootField),
        Box::new(AllVariableUsesDefined),
        Box::new(AllVariablesUsed),
        Box::new(AllVariableUsagesAllowed),
        // variables
        Box::new(VariableUniqueness),
        Box::new(VariablesAreInputTypes),
        // selections
        Box::new(FieldSelectionMerging),
        Box::new(FieldSelectionsOnObjects),
        Box::new(LeafFieldSelections),
        Box::new(ArgumentUniqueness::on_fields()),
        Box::new(RequiredArguments::on_fields()),
        // fragments
        Box::new(FragmentSpreadTypeExistence::on_named_fragments()),
        Box::new(FragmentsOnCompositeTypes::on_named_fragments()),
        Box::new(FragmentSpreadTypeExistence::on_inline_fragments()),
        Box::new(FragmentsOnCompositeTypes::on_inline_fragments()),
        Box::new(FragmentSpreadIsPossible::on_inline_fragments()),
        Box::new(FragmentSpreadTargetDefined),
        Box::new(FragmentSpreadIsPossible::on_spreads()),
        // directives
        Box::new(DirectivesAreDefined),
        Box::new(DirectivesInValidLocations),
        Box::new(DirectivesAreUniquePerLocation),
        Box::new(ArgumentUniqueness::on_directives()),
        Box::new(RequiredArguments::on_directives()),
        // arguments and values
        Box::new(ArgumentNames),
        Box::new(InputObjectFieldNames),
        Box::new(ValuesOfCorrectType),
        Box::new(InputObjectFieldUniqueness),
        Box::new(InputObjectRequiredFields),
    ]
}
