//! Classification metadata shared by requirements and test cases.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Testing layer a requirement or test case targets.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestLayer {
    #[default]
    Api,
    Ui,
    Integration,
    E2e,
}

/// Component that owns the behaviour under test.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Component {
    Backend,
    Frontend,
    #[default]
    Fullstack,
}

/// Layer, component and free-form labels.
///
/// Flattened into the owning record on disk, so every field falls back to its
/// default when a snapshot predates classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub layer: TestLayer,
    #[serde(default)]
    pub component: Component,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Classification {
    pub fn new(layer: TestLayer, component: Component) -> Self {
        Self {
            layer,
            component,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_match_legacy_snapshots() {
        let c: Classification = serde_json::from_str("{}").unwrap();
        assert_eq!(c.layer, TestLayer::Api);
        assert_eq!(c.component, Component::Fullstack);
        assert!(c.tags.is_empty());
    }

    #[test]
    fn test_string_forms_agree_with_serde() {
        assert_eq!(TestLayer::E2e.to_string(), "e2e");
        assert_eq!(TestLayer::from_str("integration").unwrap(), TestLayer::Integration);
        assert_eq!(serde_json::to_string(&Component::Backend).unwrap(), "\"backend\"");
    }
}
