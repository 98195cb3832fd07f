//! The query document: an arena of parts addressed by [`DocumentPartId`].

use crate::part::{
    DocumentPart, DocumentPartId, DocumentPartKind, DocumentPartsCollection, FieldPart,
    FieldSelectionSetPart, FragmentSpreadPart, NamedFragmentPart, OperationPart, PartData,
    SuppliedValuePart,
};
use crate::value::{ScalarValueKind, SuppliedValue};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_core::{SourceLocation, Span};

/// A query document built against a schema.
///
/// Parts are appended while the document is built and never change afterwards.
#[derive(Debug, Clone)]
pub struct QueryDocument {
    parts: Vec<DocumentPart>,
    fragments: FxHashMap<String, Vec<DocumentPartId>>,
}

impl QueryDocument {
    /// Creates a document holding only its root part.
    pub(crate) fn new(span: Span) -> Self {
        let root = DocumentPart {
            id: DocumentPartId::from_raw(0),
            parent: None,
            children: DocumentPartsCollection::default(),
            span,
            location: SourceLocation::new(1, 1, 0),
            data: PartData::Document,
        };
        Self {
            parts: vec![root],
            fragments: FxHashMap::default(),
        }
    }

    /// Appends a part under `parent`.
    pub(crate) fn add_part(
        &mut self,
        parent: DocumentPartId,
        data: PartData,
        span: Span,
        location: SourceLocation,
    ) -> DocumentPartId {
        let id = DocumentPartId::from_raw(self.parts.len() as u32);
        let kind = data.kind();
        if let PartData::NamedFragment(fragment) = &data {
            self.fragments
                .entry(fragment.name.clone())
                .or_default()
                .push(id);
        }
        self.parts.push(DocumentPart {
            id,
            parent: Some(parent),
            children: DocumentPartsCollection::default(),
            span,
            location,
            data,
        });
        self.parts[parent.index()].children.push(kind, id);
        id
    }

    pub(crate) fn data_mut(&mut self, id: DocumentPartId) -> &mut PartData {
        &mut self.parts[id.index()].data
    }

    /// The root part.
    #[must_use]
    pub fn root(&self) -> DocumentPartId {
        DocumentPartId::from_raw(0)
    }

    /// Returns a part. Ids are only handed out by this document, so lookups always succeed.
    #[must_use]
    pub fn part(&self, id: DocumentPartId) -> &DocumentPart {
        &self.parts[id.index()]
    }

    /// Returns a part, or `None` for an id from another document.
    #[must_use]
    pub fn get(&self, id: DocumentPartId) -> Option<&DocumentPart> {
        self.parts.get(id.index())
    }

    #[must_use]
    pub fn kind(&self, id: DocumentPartId) -> DocumentPartKind {
        self.part(id).kind()
    }

    #[must_use]
    pub fn parent(&self, id: DocumentPartId) -> Option<DocumentPartId> {
        self.part(id).parent
    }

    #[must_use]
    pub fn children(&self, id: DocumentPartId) -> &[DocumentPartId] {
        self.part(id).children.all()
    }

    #[must_use]
    pub fn children_of_kind(&self, id: DocumentPartId, kind: DocumentPartKind) -> &[DocumentPartId] {
        self.part(id).children.of_kind(kind)
    }

    #[must_use]
    pub fn first_child_of_kind(
        &self,
        id: DocumentPartId,
        kind: DocumentPartKind,
    ) -> Option<DocumentPartId> {
        self.part(id).children.first_of_kind(kind)
    }

    #[must_use]
    pub fn location(&self, id: DocumentPartId) -> SourceLocation {
        self.part(id).location
    }

    /// Number of parts, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.len() <= 1
    }

    /// Walks up the parent chain to the nearest ancestor of `kind`.
    #[must_use]
    pub fn ancestor_of_kind(
        &self,
        id: DocumentPartId,
        kind: DocumentPartKind,
    ) -> Option<DocumentPartId> {
        let mut current = self.parent(id);
        while let Some(part) = current {
            if self.kind(part) == kind {
                return Some(part);
            }
            current = self.parent(part);
        }
        None
    }

    /// Returns `id` and all of its descendants in depth-first pre-order.
    #[must_use]
    pub fn descendants(&self, id: DocumentPartId) -> Vec<DocumentPartId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    // Typed accessors

    #[must_use]
    pub fn operation(&self, id: DocumentPartId) -> Option<&OperationPart> {
        match &self.part(id).data {
            PartData::Operation(op) => Some(op),
            _ => None,
        }
    }

    #[must_use]
    pub fn field(&self, id: DocumentPartId) -> Option<&FieldPart> {
        match &self.part(id).data {
            PartData::Field(field) => Some(field),
            _ => None,
        }
    }

    #[must_use]
    pub fn selection_set(&self, id: DocumentPartId) -> Option<&FieldSelectionSetPart> {
        match &self.part(id).data {
            PartData::FieldSelectionSet(set) => Some(set),
            _ => None,
        }
    }

    #[must_use]
    pub fn supplied_value(&self, id: DocumentPartId) -> Option<&SuppliedValuePart> {
        match &self.part(id).data {
            PartData::SuppliedValue(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn fragment_spread(&self, id: DocumentPartId) -> Option<&FragmentSpreadPart> {
        match &self.part(id).data {
            PartData::FragmentSpread(spread) => Some(spread),
            _ => None,
        }
    }

    #[must_use]
    pub fn named_fragment(&self, id: DocumentPartId) -> Option<&NamedFragmentPart> {
        match &self.part(id).data {
            PartData::NamedFragment(fragment) => Some(fragment),
            _ => None,
        }
    }

    /// Operations in declaration order.
    #[must_use]
    pub fn operations(&self) -> &[DocumentPartId] {
        self.children_of_kind(self.root(), DocumentPartKind::Operation)
    }

    /// Named fragments in declaration order.
    #[must_use]
    pub fn named_fragments(&self) -> &[DocumentPartId] {
        self.children_of_kind(self.root(), DocumentPartKind::NamedFragment)
    }

    /// Finds the first fragment declared with `name`.
    #[must_use]
    pub fn find_fragment(&self, name: &str) -> Option<DocumentPartId> {
        self.fragments.get(name).and_then(|ids| ids.first().copied())
    }

    /// Returns every fragment declared with `name`.
    #[must_use]
    pub fn fragments_named(&self, name: &str) -> &[DocumentPartId] {
        self.fragments.get(name).map_or(&[], Vec::as_slice)
    }

    /// Finds an operation by name, or the only operation when `name` is `None`.
    #[must_use]
    pub fn find_operation(&self, name: Option<&str>) -> Option<DocumentPartId> {
        match name {
            Some(name) => self.operations().iter().copied().find(|&id| {
                self.operation(id)
                    .is_some_and(|op| op.name.as_deref() == Some(name))
            }),
            None => match self.operations() {
                [single] => Some(*single),
                _ => None,
            },
        }
    }

    /// The selection set owned by a field, fragment or operation.
    #[must_use]
    pub fn child_selection_set(&self, id: DocumentPartId) -> Option<DocumentPartId> {
        self.first_child_of_kind(id, DocumentPartKind::FieldSelectionSet)
    }

    /// The supplied value of the named argument of a field or directive.
    #[must_use]
    pub fn argument_value(&self, id: DocumentPartId, name: &str) -> Option<DocumentPartId> {
        self.children_of_kind(id, DocumentPartKind::InputArgument)
            .iter()
            .find(|&&arg| matches!(&self.part(arg).data, PartData::InputArgument(a) if a.name == name))
            .and_then(|&arg| self.first_child_of_kind(arg, DocumentPartKind::SuppliedValue))
    }

    /// The argument name of an input argument part.
    #[must_use]
    pub fn argument_name(&self, id: DocumentPartId) -> Option<&str> {
        match &self.part(id).data {
            PartData::InputArgument(arg) => Some(&arg.name),
            _ => None,
        }
    }

    /// Returns the included fields of a selection set, expanding inline fragments and fragment
    /// spreads in document order.
    ///
    /// Each named fragment is expanded at most once per call, so self-referencing fragments
    /// terminate.
    #[must_use]
    pub fn executable_fields(&self, selection_set: DocumentPartId) -> Vec<DocumentPartId> {
        let mut fields = Vec::new();
        let mut seen_fragments = FxHashSet::default();
        self.collect_executable_fields(selection_set, &mut seen_fragments, &mut fields);
        fields
    }

    fn collect_executable_fields(
        &self,
        selection_set: DocumentPartId,
        seen_fragments: &mut FxHashSet<DocumentPartId>,
        fields: &mut Vec<DocumentPartId>,
    ) {
        for &child in self.children(selection_set) {
            match &self.part(child).data {
                PartData::Field(field) if field.is_included => fields.push(child),
                PartData::InlineFragment(inline) if inline.is_included => {
                    if let Some(set) = self.child_selection_set(child) {
                        self.collect_executable_fields(set, seen_fragments, fields);
                    }
                }
                PartData::FragmentSpread(spread) if spread.is_included => {
                    let Some(fragment) = spread.fragment else { continue };
                    if !seen_fragments.insert(fragment) {
                        continue;
                    }
                    if let Some(set) = self.child_selection_set(fragment) {
                        self.collect_executable_fields(set, seen_fragments, fields);
                    }
                }
                _ => {}
            }
        }
    }

    /// Compares two supplied values structurally.
    ///
    /// Lists compare item by item. Complex values compare field by field regardless of the
    /// order the fields were written in.
    #[must_use]
    pub fn values_equal(&self, a: DocumentPartId, b: DocumentPartId) -> bool {
        let (Some(left), Some(right)) = (self.supplied_value(a), self.supplied_value(b)) else {
            return false;
        };
        if !left.value.shallow_eq(&right.value) {
            return false;
        }

        match left.value {
            SuppliedValue::List => {
                let left_items = self.children_of_kind(a, DocumentPartKind::SuppliedValue);
                let right_items = self.children_of_kind(b, DocumentPartKind::SuppliedValue);
                left_items.len() == right_items.len()
                    && left_items
                        .iter()
                        .zip(right_items)
                        .all(|(&x, &y)| self.values_equal(x, y))
            }
            SuppliedValue::Complex => self.arguments_equal(a, b),
            _ => true,
        }
    }

    /// Compares the input arguments of two parts (fields, directives or complex values) by
    /// name and structural value. No arguments equals an empty argument list. A name given
    /// more than once must repeat the same values, in order, on both sides.
    #[must_use]
    pub fn arguments_equal(&self, a: DocumentPartId, b: DocumentPartId) -> bool {
        let (Some(left), Some(right)) = (self.arguments_by_name(a), self.arguments_by_name(b))
        else {
            return false;
        };
        left.len() == right.len()
            && left.iter().all(|(name, left_values)| {
                right.get(name).is_some_and(|right_values| {
                    left_values.len() == right_values.len()
                        && left_values
                            .iter()
                            .zip(right_values)
                            .all(|(&x, &y)| self.values_equal(x, y))
                })
            })
    }

    /// Groups the argument values of a part by name. `None` when an argument lacks a name or
    /// a value.
    fn arguments_by_name(&self, id: DocumentPartId) -> Option<FxHashMap<&str, Vec<DocumentPartId>>> {
        let mut arguments: FxHashMap<&str, Vec<DocumentPartId>> = FxHashMap::default();
        for &arg in self.children_of_kind(id, DocumentPartKind::InputArgument) {
            let name = self.argument_name(arg)?;
            let value = self.first_child_of_kind(arg, DocumentPartKind::SuppliedValue)?;
            arguments.entry(name).or_default().push(value);
        }
        Some(arguments)
    }

    /// Converts a supplied value to JSON, substituting variables from `variables`.
    ///
    /// Unknown variables become `null`. Enum values become strings.
    #[must_use]
    pub fn value_to_json(
        &self,
        id: DocumentPartId,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Value {
        use serde_json::Value;

        let Some(part) = self.supplied_value(id) else {
            return Value::Null;
        };
        match &part.value {
            SuppliedValue::Scalar { kind, value } => match kind {
                ScalarValueKind::Int => value
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(value.clone())),
                ScalarValueKind::Float => value
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(|| Value::String(value.clone()), Value::Number),
                ScalarValueKind::String => Value::String(value.clone()),
                ScalarValueKind::Boolean => Value::Bool(value == "true"),
            },
            SuppliedValue::Enum(name) => Value::String(name.clone()),
            SuppliedValue::Null => Value::Null,
            SuppliedValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
            SuppliedValue::List => Value::Array(
                self.children_of_kind(id, DocumentPartKind::SuppliedValue)
                    .iter()
                    .map(|&item| self.value_to_json(item, variables))
                    .collect(),
            ),
            SuppliedValue::Complex => Value::Object(self.arguments_to_json(id, variables)),
        }
    }

    /// Converts the input arguments of a part into a JSON object.
    #[must_use]
    pub fn arguments_to_json(
        &self,
        id: DocumentPartId,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        self.children_of_kind(id, DocumentPartKind::InputArgument)
            .iter()
            .filter_map(|&arg| {
                let name = self.argument_name(arg)?;
                let value = self.first_child_of_kind(arg, DocumentPartKind::SuppliedValue)?;
                Some((name.to_string(), self.value_to_json(value, variables)))
            })
            .collect()
    }
}
