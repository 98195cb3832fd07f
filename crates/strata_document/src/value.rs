//! Supplied values: literals and variable references attached to arguments.

/// The lexical kind of a scalar literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarValueKind {
    Int,
    Float,
    String,
    Boolean,
}

impl ScalarValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
        }
    }
}

/// The value held by a supplied value part.
///
/// List items and complex object fields are child parts of the owning
/// [`DocumentPart`](crate::DocumentPart), so equality between two values is answered by
/// [`QueryDocument::values_equal`](crate::QueryDocument::values_equal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppliedValue {
    /// A scalar literal. Numbers keep their source text, strings hold the decoded value.
    Scalar {
        kind: ScalarValueKind,
        value: String,
    },
    Enum(String),
    /// Items are child supplied values.
    List,
    Null,
    /// Fields are child input arguments.
    Complex,
    /// A reference to a declared variable.
    Variable(String),
}

impl SuppliedValue {
    pub fn int(value: impl Into<String>) -> Self {
        Self::Scalar {
            kind: ScalarValueKind::Int,
            value: value.into(),
        }
    }

    pub fn float(value: impl Into<String>) -> Self {
        Self::Scalar {
            kind: ScalarValueKind::Float,
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar {
            kind: ScalarValueKind::String,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Scalar {
            kind: ScalarValueKind::Boolean,
            value: value.to_string(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Returns a short description used in messages, e.g. `Int 5` or `enum JEDI`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar {
                kind: ScalarValueKind::String,
                value,
            } => format!("String \"{value}\""),
            Self::Scalar { kind, value } => format!("{} {value}", kind.as_str()),
            Self::Enum(name) => format!("enum {name}"),
            Self::List => "list".to_string(),
            Self::Null => "null".to_string(),
            Self::Complex => "input object".to_string(),
            Self::Variable(name) => format!("${name}"),
        }
    }

    /// Compares two values without looking at children.
    ///
    /// Numeric literals of the same kind compare by value, so `1.50` equals `1.5`.
    #[must_use]
    pub(crate) fn shallow_eq(&self, other: &SuppliedValue) -> bool {
        match (self, other) {
            (
                Self::Scalar {
                    kind: ScalarValueKind::Float,
                    value: a,
                },
                Self::Scalar {
                    kind: ScalarValueKind::Float,
                    value: b,
                },
            ) => match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => a == b,
            },
            (
                Self::Scalar {
                    kind: ScalarValueKind::Int,
                    value: a,
                },
                Self::Scalar {
                    kind: ScalarValueKind::Int,
                    value: b,
                },
            ) => match (a.parse::<i128>(), b.parse::<i128>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => a == b,
            },
            _ => self == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_eq_numbers() {
        assert!(SuppliedValue::float("1.50").shallow_eq(&SuppliedValue::float("1.5")));
        assert!(SuppliedValue::int("-0").shallow_eq(&SuppliedValue::int("0")));
        assert!(!SuppliedValue::int("1").shallow_eq(&SuppliedValue::float("1.0")));
        assert!(!SuppliedValue::int("1").shallow_eq(&SuppliedValue::int("2")));
    }

    #[test]
    fn test_shallow_eq_other_kinds() {
        assert!(SuppliedValue::Enum("JEDI".into()).shallow_eq(&SuppliedValue::Enum("JEDI".into())));
        assert!(!SuppliedValue::Enum("JEDI".into()).shallow_eq(&SuppliedValue::string("JEDI")));
        assert!(SuppliedValue::Variable("a".into()).shallow_eq(&SuppliedValue::Variable("a".into())));
        assert!(SuppliedValue::Null.shallow_eq(&SuppliedValue::Null));
    }

    #[test]
    fn test_describe() {
        assert_eq!(SuppliedValue::int("5").describe(), "Int 5");
        assert_eq!(SuppliedValue::string("x").describe(), "String \"x\"");
        assert_eq!(SuppliedValue::Variable("id".into()).describe(), "$id");
    }
}
