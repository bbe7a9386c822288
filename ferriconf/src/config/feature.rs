//! Feature sets: free-form CLI toggles with `no`-negation.
//!
//! A feature line is parsed purely syntactically. A leading `no` word
//! removes the feature, anything else adds it:
//!
//! ```text
//! "send-community both"     add     "send-community both"
//! "No  Send-Community Both" remove  "send-community both"
//! ```

use std::fmt;

use indexmap::IndexSet;

use crate::error::{ConfigError, Result};

/// Collapse internal whitespace and lowercase.
pub fn normalize(feature: &str) -> String {
    feature
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One parsed feature line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureChange {
    Add(String),
    Remove(String),
}

impl FeatureChange {
    /// Parse a feature line.
    pub fn parse(line: &str) -> Result<Self> {
        let normalized = normalize(line);
        let change = match normalized.strip_prefix("no ") {
            Some(feature) => FeatureChange::Remove(feature.to_string()),
            None => FeatureChange::Add(normalized),
        };

        if change.feature().is_empty() {
            return Err(ConfigError::EmptyFeature.into());
        }
        Ok(change)
    }

    /// The feature key, without negation.
    pub fn feature(&self) -> &str {
        match self {
            FeatureChange::Add(feature) | FeatureChange::Remove(feature) => feature,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, FeatureChange::Remove(_))
    }
}

impl fmt::Display for FeatureChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureChange::Add(feature) => f.write_str(feature),
            FeatureChange::Remove(feature) => write!(f, "no {}", feature),
        }
    }
}

/// Insertion-ordered set of enabled features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    features: IndexSet<String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set by applying each line in order.
    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for line in lines {
            set.apply(line.as_ref())?;
        }
        Ok(set)
    }

    /// Apply one feature line, returning the parsed change.
    ///
    /// Removing a feature that is not present is an error, never a no-op.
    pub fn apply(&mut self, line: &str) -> Result<FeatureChange> {
        let change = FeatureChange::parse(line)?;
        match &change {
            FeatureChange::Add(feature) => {
                self.features.insert(feature.clone());
            }
            FeatureChange::Remove(feature) => {
                if !self.features.shift_remove(feature) {
                    return Err(ConfigError::FeatureNotPresent {
                        feature: feature.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(change)
    }

    /// Whether `feature` (normalized) is enabled.
    pub fn contains(&self, feature: &str) -> bool {
        self.features.contains(&normalize(feature))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_add_then_remove_restores_set() {
        let mut set = FeatureSet::from_lines(["next-hop-self"]).unwrap();
        let before = set.clone();

        set.apply("send-community   Both").unwrap();
        assert!(set.contains("send-community both"));
        set.apply("no send-community both").unwrap();

        assert_eq!(set, before);
    }

    #[test]
    fn test_remove_absent_feature_fails() {
        let mut set = FeatureSet::new();
        let err = set.apply("no next-hop-self").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::FeatureNotPresent { ref feature }) if feature == "next-hop-self"
        ));
    }

    #[test]
    fn test_parse_is_syntactic() {
        assert_eq!(
            FeatureChange::parse("  NO   redistribute connected ").unwrap(),
            FeatureChange::Remove("redistribute connected".to_string())
        );
        // "no" must be its own word
        assert_eq!(
            FeatureChange::parse("nonstop-routing").unwrap(),
            FeatureChange::Add("nonstop-routing".to_string())
        );
        assert_eq!(FeatureChange::parse("no").unwrap(), FeatureChange::Add("no".to_string()));
        assert!(FeatureChange::parse("   ").is_err());
    }

    #[test]
    fn test_insertion_order_kept() {
        let set = FeatureSet::from_lines(["b", "a", "c", "a"]).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(FeatureChange::Remove("a".into()).to_string(), "no a");
    }
}
