//! Fuzzy pattern matching
//!
//! A fuzzy subscription is written as a *completed pattern*:
//!
//! ```text
//! <namespace>##<group pattern>@@<service name pattern>
//! ```
//!
//! The group pattern and the service name pattern are matched independently
//! against a service's group and name, and both have to match. Each of them
//! follows the same grammar:
//!
//! * `*` on its own matches any value, including the empty one.
//! * `text*` (a single trailing `*`) matches every value starting with `text`.
//! * `text` without any `*` matches only the identical value. Matching is
//!   case-sensitive.
//! * Any other use of `*` (leading with text after it, inside the text, or more
//!   than once) is malformed. Parsing rejects it and [`is_match`] never matches it.
//!
//! The namespace part is a literal, except for [`ANY_NAMESPACE`] which makes the
//! pattern apply to every namespace.
//!
//! Everything in here is pure and can be called from any thread.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use crate::error::{ErrorCode, NamingError, Result};
use crate::naming::types::{CompletedPattern, Service};

/// Separates the namespace from the grouped pattern
pub const NAMESPACE_SEPARATOR: &str = "##";

/// Separates the group from the service name
pub const GROUP_SEPARATOR: &str = "@@";

/// Wildcard token inside a segment
pub const WILDCARD: char = '*';

/// Namespace of a pattern that applies to all namespaces
pub const ANY_NAMESPACE: &str = "*";

/// `group@@service`
pub fn grouped_name(service_name: &str, group_name: &str) -> String {
    format!("{}{}{}", group_name, GROUP_SEPARATOR, service_name)
}

/// `namespace##grouped`
pub fn completed_pattern(namespace: &str, grouped_pattern: &str) -> CompletedPattern {
    format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, grouped_pattern)
}

/// Namespace embedded in a completed pattern, if it has one
pub fn namespace_of(completed: &str) -> Option<&str> {
    completed.split_once(NAMESPACE_SEPARATOR).map(|(namespace, _)| namespace)
}

/// One parsed segment of a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentPattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl SegmentPattern {
    pub fn parse(segment: &str) -> Result<Self> {
        match segment.find(WILDCARD) {
            None => Ok(Self::Exact(segment.to_string())),
            Some(0) if segment.len() == 1 => Ok(Self::Any),
            Some(idx) if idx + 1 == segment.len() => Ok(Self::Prefix(segment[..idx].to_string())),
            Some(_) => Err(NamingError::new(
                ErrorCode::MalformedPattern,
                format!("Wildcard is only allowed once at the end of a segment: {}", segment),
            )),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Self::Exact(text) => value == text,
        }
    }
}

impl fmt::Display for SegmentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "{}", WILDCARD),
            Self::Prefix(prefix) => write!(f, "{}{}", prefix, WILDCARD),
            Self::Exact(text) => write!(f, "{}", text),
        }
    }
}

/// A validated fuzzy pattern scoped to a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyPattern {
    namespace: String,
    group: SegmentPattern,
    service: SegmentPattern,
}

impl FuzzyPattern {
    pub fn new(namespace: &str, service_pattern: &str, group_pattern: &str) -> Result<Self> {
        if namespace.is_empty() {
            return Err(NamingError::invalid_param("Namespace of a fuzzy pattern must not be empty"));
        }
        if service_pattern.is_empty() {
            return Err(NamingError::invalid_param("Service name pattern must not be empty"));
        }
        if group_pattern.is_empty() {
            return Err(NamingError::invalid_param("Group name pattern must not be empty"));
        }
        for segment in [service_pattern, group_pattern] {
            if segment.contains(GROUP_SEPARATOR) || segment.contains(NAMESPACE_SEPARATOR) {
                return Err(NamingError::new(
                    ErrorCode::MalformedPattern,
                    format!("Pattern segment contains a reserved separator: {}", segment),
                ));
            }
        }

        Ok(Self {
            namespace: namespace.to_string(),
            group: SegmentPattern::parse(group_pattern)?,
            service: SegmentPattern::parse(service_pattern)?,
        })
    }

    /// Parse a completed pattern (`namespace##group@@service`)
    pub fn parse(completed: &str) -> Result<Self> {
        let (namespace, grouped) = completed.split_once(NAMESPACE_SEPARATOR).ok_or_else(|| {
            NamingError::new(
                ErrorCode::MalformedPattern,
                format!("Pattern is missing its namespace: {}", completed),
            )
        })?;
        let (group, service) = grouped.split_once(GROUP_SEPARATOR).ok_or_else(|| {
            NamingError::new(
                ErrorCode::MalformedPattern,
                format!("Pattern is missing its group: {}", completed),
            )
        })?;
        Self::new(namespace, service, group)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_namespace_universal(&self) -> bool {
        self.namespace == ANY_NAMESPACE
    }

    pub fn applies_to_namespace(&self, namespace: &str) -> bool {
        self.is_namespace_universal() || self.namespace == namespace
    }

    /// Map key form of this pattern
    pub fn completed(&self) -> CompletedPattern {
        completed_pattern(&self.namespace, &grouped_name(&self.service.to_string(), &self.group.to_string()))
    }

    pub fn matches_name(&self, service_name: &str, group_name: &str) -> bool {
        self.service.matches(service_name) && self.group.matches(group_name)
    }

    /// Namespace, group and name all match
    pub fn matches(&self, service: &Service) -> bool {
        self.applies_to_namespace(service.namespace()) && self.matches_name(service.name(), service.group())
    }
}

impl fmt::Display for FuzzyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.completed())
    }
}

/// Keeps the completed patterns that apply to `namespace`
pub fn filter_by_namespace<I, S>(namespace: &str, patterns: I) -> HashSet<CompletedPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .filter(|pattern| match namespace_of(pattern.as_ref()) {
            Some(ns) => ns == namespace || ns == ANY_NAMESPACE,
            None => false,
        })
        .map(|pattern| pattern.as_ref().to_string())
        .collect()
}

/// Whether `service_name`/`group_name` match both pattern segments
pub fn is_match(service_name: &str, group_name: &str, service_pattern: &str, group_pattern: &str) -> bool {
    let service = match SegmentPattern::parse(service_pattern) {
        Ok(segment) => segment,
        Err(e) => {
            debug!("Ignoring service name pattern {}: {}", service_pattern, e);
            return false;
        }
    };
    let group = match SegmentPattern::parse(group_pattern) {
        Ok(segment) => segment,
        Err(e) => {
            debug!("Ignoring group name pattern {}: {}", group_pattern, e);
            return false;
        }
    };
    service.matches(service_name) && group.matches(group_name)
}

/// The completed patterns whose name and group segments match the service.
/// Namespace filtering is left to [`filter_by_namespace`].
pub fn matched_patterns<I, S>(service_name: &str, group_name: &str, patterns: I) -> HashSet<CompletedPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .filter(|pattern| match FuzzyPattern::parse(pattern.as_ref()) {
            Ok(parsed) => parsed.matches_name(service_name, group_name),
            Err(e) => {
                debug!("Skipping unparsable pattern {}: {}", pattern.as_ref(), e);
                false
            }
        })
        .map(|pattern| pattern.as_ref().to_string())
        .collect()
}
