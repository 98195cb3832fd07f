//! Type expressions such as `[Int!]!`.

use crate::error::SchemaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A reference to a graph type with list and non-null wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpression {
    Named(String),
    List(Box<TypeExpression>),
    NonNull(Box<TypeExpression>),
}

impl TypeExpression {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn list(inner: TypeExpression) -> Self {
        Self::List(Box::new(inner))
    }

    /// Wraps the expression as non-null. Already non-null expressions are returned unchanged.
    #[must_use]
    pub fn non_null(inner: TypeExpression) -> Self {
        match inner {
            Self::NonNull(_) => inner,
            other => Self::NonNull(Box::new(other)),
        }
    }

    /// Returns the innermost named type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.type_name(),
        }
    }

    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns true if the expression is a list, ignoring an outer non-null wrapper.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), Self::List(_))
    }

    /// Returns the expression with an outer non-null wrapper removed.
    #[must_use]
    pub fn nullable(&self) -> &TypeExpression {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Returns the item type of a list expression.
    #[must_use]
    pub fn list_item(&self) -> Option<&TypeExpression> {
        match self.nullable() {
            Self::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns true if a value of type `self` may be supplied where `location` is expected.
    ///
    /// `location_has_default` relaxes a non-null location to its nullable form, as a default
    /// value is used when the supplied variable is null or absent.
    #[must_use]
    pub fn is_assignable_to(&self, location: &TypeExpression, location_has_default: bool) -> bool {
        if let Self::NonNull(location_inner) = location {
            if location_has_default {
                return self.is_assignable_to(location_inner, false);
            }
            return match self {
                Self::NonNull(inner) => inner.is_assignable_to(location_inner, false),
                _ => false,
            };
        }

        match (self, location) {
            (Self::NonNull(inner), _) => inner.is_assignable_to(location, false),
            (Self::List(item), Self::List(location_item)) => {
                item.is_assignable_to(location_item, false)
            }
            (Self::Named(name), Self::Named(location_name)) => name == location_name,
            _ => false,
        }
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl FromStr for TypeExpression {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidTypeExpression(s.to_string());
        let text = s.trim();

        if let Some(inner) = text.strip_suffix('!') {
            let inner: TypeExpression = inner.parse().map_err(|_| invalid())?;
            if inner.is_non_null() {
                return Err(invalid());
            }
            return Ok(Self::NonNull(Box::new(inner)));
        }

        if let Some(inner) = text.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
            let inner: TypeExpression = inner.parse().map_err(|_| invalid())?;
            return Ok(Self::List(Box::new(inner)));
        }

        let mut chars = text.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        Ok(Self::Named(text.to_string()))
    }
}

impl Serialize for TypeExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for text in ["Int", "Int!", "[Int]", "[Int!]!", "[[String]!]"] {
            let expr: TypeExpression = text.parse().unwrap();
            assert_eq!(expr.to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["", "Int!!", "[Int", "1Int", "Int]"] {
            assert!(text.parse::<TypeExpression>().is_err(), "{text} should fail");
        }
    }

    #[test]
    fn test_accessors() {
        let expr: TypeExpression = "[Review!]!".parse().unwrap();
        assert_eq!(expr.type_name(), "Review");
        assert!(expr.is_non_null());
        assert!(expr.is_list());
        assert_eq!(expr.list_item().unwrap().to_string(), "Review!");
    }

    #[test]
    fn test_is_assignable_to() {
        let parse = |s: &str| s.parse::<TypeExpression>().unwrap();

        assert!(parse("Int!").is_assignable_to(&parse("Int"), false));
        assert!(!parse("Int").is_assignable_to(&parse("Int!"), false));
        assert!(parse("Int").is_assignable_to(&parse("Int!"), true));
        assert!(parse("[Int!]!").is_assignable_to(&parse("[Int]"), false));
        assert!(!parse("[Int]").is_assignable_to(&parse("[Int!]"), false));
        assert!(!parse("String").is_assignable_to(&parse("Int"), false));
    }

    #[test]
    fn test_serde_as_string() {
        let expr: TypeExpression = serde_json::from_str("\"[ID!]\"").unwrap();
        assert_eq!(expr, TypeExpression::list(TypeExpression::non_null(TypeExpression::named("ID"))));
        assert_eq!(serde_json::to_string(&expr).unwrap(), "\"[ID!]\"");
    }
}
