//! Validation options.

use serde::{Deserialize, Serialize};

/// Options for a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Selection sets with fewer executable fields than this compare every pair of fields
    /// when checking merge compatibility. Larger sets are bucketed by response key first.
    pub merge_brute_force_threshold: usize,
    /// Maximum depth of nested fragment spreads. `None` means unlimited.
    pub max_fragment_depth: Option<usize>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            merge_brute_force_threshold: 30,
            max_fragment_depth: None,
        }
    }
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_merge_threshold(mut self, threshold: usize) -> Self {
        self.merge_brute_force_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_max_fragment_depth(mut self, depth: usize) -> Self {
        self.max_fragment_depth = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options: ValidationOptions =
            serde_json::from_str(r#"{ "max_fragment_depth": 4 }"#).unwrap();
        assert_eq!(options.merge_brute_force_threshold, 30);
        assert_eq!(options.max_fragment_depth, Some(4));
    }
}
