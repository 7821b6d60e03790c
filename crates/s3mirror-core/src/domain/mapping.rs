//! Longest-prefix key mapping
//!
//! A [`PathMapper`] decides, for any remote object key, whether the object
//! belongs to the mirror and where it lives on disk. The table is built
//! once from the configured `sync` rules and never mutated afterwards.
//!
//! ## Matching
//!
//! Rules are ordered by descending prefix length. For equal lengths the
//! configuration declaration order is kept (the sort is stable), so the
//! first rule whose prefix is a literal prefix of the key is the unique
//! match.

use std::cmp::Reverse;
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::errors::DomainError;
use super::newtypes::MirrorPath;
use super::notification::decode_object_key;

// ============================================================================
// MappingRule
// ============================================================================

/// One `prefix -> local root` entry from the `sync` configuration map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Remote key prefix, matched literally
    pub prefix: String,
    /// Directory the remainder of a matching key is placed under
    pub local_root: PathBuf,
}

impl MappingRule {
    pub fn new(prefix: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            local_root: local_root.into(),
        }
    }

    /// Returns true if `key` starts with this rule's prefix
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Builds the local path for a key already known to match this rule
    ///
    /// # Errors
    /// Returns a [`DomainError`] if the local root cannot be made absolute,
    /// the key suffix is empty, or the suffix climbs out of the local root.
    pub fn local_path_for(&self, key: &str) -> Result<MirrorPath, DomainError> {
        let suffix = key.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
            DomainError::InvalidPath(format!(
                "key '{key}' does not start with prefix '{}'",
                self.prefix
            ))
        })?;

        let root = MirrorPath::from_local_root(&self.local_root)?;
        root.join_key_suffix(suffix)
    }
}

// ============================================================================
// MappingRules - order-preserving `sync` map
// ============================================================================

/// The `sync` section of the configuration, in declaration order
///
/// Deserializes from a map (YAML or JSON) while keeping the order in which
/// the entries were written. A prefix may appear only once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRules(Vec<MappingRule>);

impl MappingRules {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self(rules)
    }

    pub fn push(&mut self, rule: MappingRule) {
        self.0.push(rule);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingRule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefixes that occur more than once, in first-seen order
    pub fn duplicate_prefixes(&self) -> Vec<&str> {
        let mut duplicates: Vec<&str> = Vec::new();
        for (i, rule) in self.0.iter().enumerate() {
            let seen_before = self.0[..i].iter().any(|r| r.prefix == rule.prefix);
            if seen_before && !duplicates.contains(&rule.prefix.as_str()) {
                duplicates.push(&rule.prefix);
            }
        }
        duplicates
    }
}

impl IntoIterator for MappingRules {
    type Item = MappingRule;
    type IntoIter = std::vec::IntoIter<MappingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MappingRules {
    type Item = &'a MappingRule;
    type IntoIter = std::slice::Iter<'a, MappingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for MappingRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|r| (&r.prefix, &r.local_root)))
    }
}

impl<'de> Deserialize<'de> for MappingRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MappingRulesVisitor)
    }
}

struct MappingRulesVisitor;

impl<'de> Visitor<'de> for MappingRulesVisitor {
    type Value = MappingRules;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of remote key prefixes to local directories")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut rules: Vec<MappingRule> = Vec::with_capacity(map.size_hint().unwrap_or(0));

        while let Some((prefix, local_root)) = map.next_entry::<String, PathBuf>()? {
            if rules.iter().any(|r| r.prefix == prefix) {
                return Err(de::Error::custom(format!("duplicate sync prefix '{prefix}'")));
            }
            rules.push(MappingRule::new(prefix, local_root));
        }

        Ok(MappingRules(rules))
    }
}

// ============================================================================
// PathMapper
// ============================================================================

/// Read-only longest-prefix table mapping object keys to local paths
#[derive(Debug, Clone)]
pub struct PathMapper {
    /// Rules in match order: longest prefix first, ties in declaration order
    rules: Vec<MappingRule>,
}

impl PathMapper {
    /// Builds the table, sorting once by descending prefix length
    pub fn new(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let mut rules: Vec<MappingRule> = rules.into_iter().collect();
        rules.sort_by_key(|rule| Reverse(rule.prefix.len()));
        Self { rules }
    }

    /// Rules in the order they are tried
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Returns the rule that wins for an already-decoded key
    pub fn match_rule(&self, key: &str) -> Option<&MappingRule> {
        self.rules.iter().find(|rule| rule.matches(key))
    }

    /// Resolves a key exactly as delivered by the notification system
    ///
    /// The key is percent-decoded before matching.
    ///
    /// # Returns
    /// - `Ok(Some(path))` for a key inside the mirrored scope
    /// - `Ok(None)` when no rule matches (the event is out of scope)
    ///
    /// # Errors
    /// Returns a [`DomainError`] when the key cannot be decoded or the local
    /// path cannot be built for the matching rule.
    pub fn resolve(&self, raw_key: &str) -> Result<Option<MirrorPath>, DomainError> {
        let key = decode_object_key(raw_key)?;
        self.resolve_decoded(&key)
    }

    /// Same as [`resolve`](Self::resolve) for a key that is already decoded
    pub fn resolve_decoded(&self, key: &str) -> Result<Option<MirrorPath>, DomainError> {
        let Some(rule) = self.match_rule(key) else {
            debug!(key, "no sync prefix matches key");
            return Ok(None);
        };

        let path = rule.local_path_for(key)?;
        debug!(
            key,
            prefix = %rule.prefix,
            local_path = %path,
            "key matched sync prefix"
        );
        Ok(Some(path))
    }
}
