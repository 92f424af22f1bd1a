//! Skip and require rule groups
//!
//! A rule group is an OR over containers, and a container is an AND over its
//! rules. The parser may only ever populate a single container, but the
//! group stays a list so evaluators see the same shape either way.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An OR-combined list of rule containers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    /// Alternative rule sets; any one satisfied satisfies the group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<RuleContainer>,
}

impl RuleGroup {
    /// Create an empty group, which never skips and imposes no requirement
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alternative container
    pub fn with_container(mut self, container: RuleContainer) -> Self {
        self.containers.push(container);
        self
    }

    /// Whether the group holds no rules at all
    pub fn is_empty(&self) -> bool {
        self.containers.iter().all(RuleContainer::is_empty)
    }

    /// All content-unchanged rules in the group
    pub fn content_rules(&self) -> impl Iterator<Item = &ContentRule> {
        self.containers
            .iter()
            .flat_map(|c| c.rules.iter())
            .filter_map(|rule| match rule {
                Rule::ContentUnchanged(content) => Some(content),
                Rule::FileExists { .. } => None,
            })
    }

    /// Mutable access to every content-unchanged rule in the group
    pub fn content_rules_mut(&mut self) -> impl Iterator<Item = &mut ContentRule> {
        self.containers
            .iter_mut()
            .flat_map(|c| c.rules.iter_mut())
            .filter_map(|rule| match rule {
                Rule::ContentUnchanged(content) => Some(content),
                Rule::FileExists { .. } => None,
            })
    }
}

/// An AND-combined set of rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleContainer {
    /// Rules that must all hold
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Require at least one file matching the given glob
    pub fn with_exists(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push(Rule::FileExists {
            patterns: vec![pattern.into()],
        });
        self
    }

    /// Require the files matched by `paths` (minus `ignores`) to be unchanged
    pub fn with_unchanged<P, I>(mut self, paths: P, ignores: I) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.rules
            .push(Rule::ContentUnchanged(ContentRule::new(paths, ignores)));
        self
    }

    /// Add an arbitrary rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Whether the container holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A single condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// Holds when at least one file matches any of the patterns
    FileExists {
        /// Root-relative glob patterns
        patterns: Vec<String>,
    },
    /// Holds when the fingerprint of the matched files equals the stored one
    ContentUnchanged(ContentRule),
}

/// A content-unchanged rule and its stored fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRule {
    /// Root-relative include globs
    pub paths: BTreeSet<String>,
    /// Root-relative ignore globs
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ignores: BTreeSet<String>,
    /// Hex digest recorded after the last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ContentRule {
    /// Create a rule with no stored digest
    pub fn new<P, I>(paths: P, ignores: I) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ignores: ignores.into_iter().map(Into::into).collect(),
            digest: None,
        }
    }

    /// Whether this rule has the same definition (ignoring the digest).
    ///
    /// Pattern order and duplicates do not matter.
    pub fn same_definition<P, I>(&self, paths: P, ignores: I) -> bool
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let paths: BTreeSet<String> = paths.into_iter().map(|p| p.as_ref().to_owned()).collect();
        let ignores: BTreeSet<String> = ignores
            .into_iter()
            .map(|p| p.as_ref().to_owned())
            .collect();
        self.paths == paths && self.ignores == ignores
    }
}
