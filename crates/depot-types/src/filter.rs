use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An ordered list of anchored name patterns.
///
/// Each pattern is a regular expression implicitly anchored at both ends
/// (`pat` is compiled as `^(?:pat)$`), so `tmp-.*` matches `tmp-build7`
/// but not `old-tmp-build7`. A name matches the filter if it matches any
/// pattern.
///
/// Only the pattern strings are serialized; expressions are recompiled on
/// deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Filter {
    lines: Vec<String>,
    compiled: Vec<Regex>,
}

impl Filter {
    /// Compile a filter from pattern lines. Empty lines are ignored.
    pub fn new<I, S>(lines: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(Into::into)
            .filter(|line| !line.is_empty())
            .collect();
        let compiled = lines
            .iter()
            .map(|line| {
                Regex::new(&format!("^(?:{line})$")).map_err(|e| TypeError::InvalidPattern {
                    pattern: line.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { lines, compiled })
    }

    /// Returns `true` if `name` matches any pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(name))
    }

    /// The configured pattern lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns `true` if the filter has no patterns (matches nothing).
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines
    }
}

impl Eq for Filter {}

impl TryFrom<Vec<String>> for Filter {
    type Error = TypeError;

    fn try_from(lines: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(lines)
    }
}

impl From<Filter> for Vec<String> {
    fn from(filter: Filter) -> Self {
        filter.lines
    }
}

/// Replication inclusion policy over image names.
///
/// The exclude list is checked before the include list: a name matching
/// exclude is rejected even if it also matches include. An absent include
/// list accepts every name not excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSelector {
    pub include: Option<Filter>,
    pub exclude: Option<Filter>,
}

impl ImageSelector {
    /// Accept every name.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` should be replicated under this policy.
    pub fn accepts(&self, name: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.matches(name) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            return include.matches(name);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_anchored() {
        let filter = Filter::new(["tmp-.*"]).unwrap();
        assert!(filter.matches("tmp-build7"));
        assert!(!filter.matches("old-tmp-build7"));
        assert!(!filter.matches("tmp"));
    }

    #[test]
    fn any_pattern_matches() {
        let filter = Filter::new(["users/.*", "base/.*"]).unwrap();
        assert!(filter.matches("users/alice/test"));
        assert!(filter.matches("base/ubuntu"));
        assert!(!filter.matches("prod/web"));
    }

    #[test]
    fn empty_lines_are_ignored() {
        let filter = Filter::new(["", "a"]).unwrap();
        assert_eq!(filter.lines().len(), 1);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = Filter::new(["(unclosed"]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidPattern { .. }));
    }

    #[test]
    fn serde_roundtrip_recompiles() {
        let filter = Filter::new(["prod/.*"]).unwrap();
        let json = serde_json::to_string(&filter).unwrap();
        let parsed: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, filter);
        assert!(parsed.matches("prod/web"));
    }

    #[test]
    fn selector_exclude_wins_over_include() {
        let selector = ImageSelector {
            include: Some(Filter::new(["tmp-.*"]).unwrap()),
            exclude: Some(Filter::new(["tmp-.*"]).unwrap()),
        };
        assert!(!selector.accepts("tmp-build7"));
    }

    #[test]
    fn selector_empty_include_accepts_everything_not_excluded() {
        let selector = ImageSelector {
            include: None,
            exclude: Some(Filter::new(["tmp-.*"]).unwrap()),
        };
        assert!(selector.accepts("prod/web"));
        assert!(!selector.accepts("tmp-build7"));
    }

    #[test]
    fn selector_include_restricts() {
        let selector = ImageSelector {
            include: Some(Filter::new(["prod/.*"]).unwrap()),
            exclude: None,
        };
        assert!(selector.accepts("prod/web"));
        assert!(!selector.accepts("staging/web"));
    }

    #[test]
    fn selector_all_accepts_anything() {
        assert!(ImageSelector::all().accepts("anything/at/all"));
    }
}
