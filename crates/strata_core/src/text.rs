//! Name interning for parsed documents.
//!
//! A document repeats the same handful of names (field names, type conditions, variable
//! names) many times. The lexer interns every name once and the AST carries [`Text`] handles.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use std::cell::RefCell;

/// Handle to an interned name, valid for the [`Interner`] that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Text(u32);

impl Text {
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// Names every executable document uses, interned up front.
const PRELUDE: [&str; 15] = [
    "__typename",
    "query",
    "mutation",
    "subscription",
    "fragment",
    "on",
    "true",
    "false",
    "null",
    "skip",
    "include",
    "if",
    "Int",
    "String",
    "Boolean",
];

/// Interns names for one document. Insertion order is the handle.
#[derive(Debug)]
pub struct Interner {
    names: RefCell<IndexSet<Box<str>, FxBuildHasher>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        let mut names = IndexSet::with_capacity_and_hasher(64, FxBuildHasher);
        names.extend(PRELUDE.iter().map(|name| Box::<str>::from(*name)));
        Self {
            names: RefCell::new(names),
        }
    }

    pub fn intern(&self, name: &str) -> Text {
        let mut names = self.names.borrow_mut();
        let index = match names.get_index_of(name) {
            Some(index) => index,
            None => names.insert_full(name.into()).0,
        };
        Text(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the name behind a handle, or an empty string for a foreign handle.
    #[must_use]
    pub fn get(&self, text: Text) -> String {
        self.names
            .borrow()
            .get_index(text.0 as usize)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Compares a handle with a name without allocating.
    #[must_use]
    pub fn is(&self, text: Text, name: &str) -> bool {
        self.names
            .borrow()
            .get_index(text.0 as usize)
            .is_some_and(|interned| &**interned == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let interner = Interner::new();
        let review = interner.intern("review");
        assert_eq!(interner.intern("review"), review);
        assert_ne!(interner.intern("stars"), review);
        assert_eq!(interner.get(review), "review");
    }

    #[test]
    fn test_prelude_is_interned() {
        let interner = Interner::new();
        let before = interner.len();
        let typename = interner.intern("__typename");
        assert_eq!(interner.len(), before);
        assert_eq!(typename, Text::from_raw(0));
        assert!(interner.is(typename, "__typename"));
    }

    #[test]
    fn test_foreign_handle() {
        let interner = Interner::new();
        assert_eq!(interner.get(Text::from_raw(10_000)), "");
        assert!(!interner.is(Text::from_raw(10_000), ""));
    }
}
