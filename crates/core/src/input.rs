//! Typed service inputs.
//!
//! Catalog entries encode input modifiers in the type string: a trailing `?`
//! marks an optional input and `field==literal` names an equality guard. They
//! are parsed once, at catalog-load time, into [`InputSpec`].

use serde::{Deserialize, Serialize};

/// Suffix marking an optional input in catalog strings.
pub const OPTIONAL_SUFFIX: char = '?';

/// Separator between field and literal in an equality guard.
pub const GUARD_SEPARATOR: &str = "==";

/// A declared input of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSpec {
    /// Must be present for the service to match
    Required(String),

    /// Used when reachable, replaced by `NULL` (false) otherwise
    Optional(String),

    /// Only satisfied by the pseudo-type `field==literal`
    EqualityGuard {
        /// Field being compared
        field: String,
        /// Literal the field must equal
        literal: String,
    },
}

impl InputSpec {
    /// Parse a catalog input string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_suffix(OPTIONAL_SUFFIX) {
            return Self::Optional(name.to_string());
        }

        match raw.split_once(GUARD_SEPARATOR) {
            Some((field, literal)) if !field.is_empty() => Self::EqualityGuard {
                field: field.to_string(),
                literal: literal.to_string(),
            },
            _ => Self::Required(raw.to_string()),
        }
    }

    /// The type name looked up in the available-type set.
    pub fn type_name(&self) -> String {
        match self {
            Self::Required(name) | Self::Optional(name) => name.clone(),
            Self::EqualityGuard { field, literal } => format!("{field}{GUARD_SEPARATOR}{literal}"),
        }
    }

    /// Whether this input may be substituted with `NULL`.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Whether the input takes part in matching.
    ///
    /// Optional inputs only count when `require_optional` is set.
    pub fn counts_for_match(&self, require_optional: bool) -> bool {
        require_optional || !self.is_optional()
    }
}

impl std::fmt::Display for InputSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optional(name) => write!(f, "{name}{OPTIONAL_SUFFIX}"),
            other => f.write_str(&other.type_name()),
        }
    }
}

/// Check that every counted input of `inputs` is in `available`.
pub fn inputs_satisfied<S: AsRef<str>>(
    inputs: &[InputSpec],
    available: &[S],
    require_optional: bool,
) -> bool {
    inputs
        .iter()
        .filter(|input| input.counts_for_match(require_optional))
        .all(|input| {
            let name = input.type_name();
            available.iter().any(|t| t.as_ref() == name)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_required() {
        assert_eq!(InputSpec::parse("imageUrl"), InputSpec::Required("imageUrl".into()));
    }

    #[test]
    fn test_parse_optional() {
        let spec = InputSpec::parse("totalAB?");
        assert_eq!(spec, InputSpec::Optional("totalAB".into()));
        assert!(spec.is_optional());
        assert_eq!(spec.type_name(), "totalAB");
        assert_eq!(spec.to_string(), "totalAB?");
    }

    #[test]
    fn test_parse_equality_guard() {
        let spec = InputSpec::parse("switch==on");
        assert_eq!(
            spec,
            InputSpec::EqualityGuard { field: "switch".into(), literal: "on".into() }
        );
        assert_eq!(spec.type_name(), "switch==on");
        assert!(!spec.is_optional());
    }

    #[test]
    fn test_inputs_satisfied_ignores_optional_unless_required() {
        let inputs = vec![InputSpec::parse("A?"), InputSpec::parse("B")];
        let available = vec!["B".to_string()];

        assert!(inputs_satisfied(&inputs, &available, false));
        assert!(!inputs_satisfied(&inputs, &available, true));
    }

    #[test]
    fn test_inputs_satisfied_requires_guards() {
        let inputs = vec![InputSpec::parse("A"), InputSpec::parse("switch==on")];

        assert!(!inputs_satisfied(&inputs, &["A", "switch"], false));
        assert!(inputs_satisfied(&inputs, &["A", "switch==on"], false));
    }
}
