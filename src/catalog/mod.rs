//! Detection rule catalog.
//!
//! The catalog is the leaf of the engine: an ordered, immutable collection of
//! [`Rule`]s, each binding a [`ThreatCategory`] to a matcher and a
//! [`Severity`] weight. It is built once at startup and shared (usually behind
//! an `Arc`) by the [`Validator`](crate::validator::Validator) and the
//! [`Sanitizer`](crate::sanitizer::Sanitizer).
//!
//! # Threat Categories
//!
//! | Category             | Description                                    | Typical Severity |
//! |----------------------|------------------------------------------------|------------------|
//! | `CODE_INJECTION`     | eval, dynamic `Function`, `require`, process   | Critical         |
//! | `TEMPLATE_INJECTION` | engine internals inside `{{ }}`, dunder access | Critical         |
//! | `XSS`                | script tags, event handlers, script URIs       | High / Critical  |
//! | `COMMAND_INJECTION`  | shell chaining, substitution, PowerShell, nc   | Critical         |
//! | `SQL_INJECTION`      | tautologies, `UNION SELECT`, time-based blind  | High / Critical  |
//! | `PATH_TRAVERSAL`     | `../` and encodings, absolute paths, `file://` | High             |
//! | `SENSITIVE_DATA`     | credentials, private keys, card/SSN numbers    | High / Critical  |
//! | `DOS_STRUCTURAL`     | length, nesting depth, variable count, NUL     | High             |
//!
//! # Rule Kinds
//!
//! | Kind         | Matching                                            |
//! |--------------|-----------------------------------------------------|
//! | `Pattern`    | compiled regex                                      |
//! | `Literal`    | case-insensitive substring                          |
//! | `KeyValue`   | curated credential key list followed by a value     |
//! | `Structural` | evaluated by the validator against configured limits|
//!
//! # Usage
//!
//! ```rust,ignore
//! use template_guard::catalog::{RuleCatalog, ThreatCategory};
//!
//! let catalog = RuleCatalog::builtin().unwrap();
//! for rule in catalog.rules_for(ThreatCategory::Xss) {
//!     println!("{} ({})", rule.id(), rule.severity());
//! }
//! ```

mod matcher;
mod patterns;
mod rules;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use matcher::{KeyValueMatcher, LiteralMatcher, Matcher, PatternMatcher};
pub use patterns::{
    RuleLiteral, RulePattern, RuleStructural, CODE_INJECTION_PATTERNS, COMMAND_INJECTION_PATTERNS,
    LITERAL_RULES, PATH_TRAVERSAL_PATTERNS, SENSITIVE_DATA_PATTERNS, SENSITIVE_KEYS,
    SQL_INJECTION_PATTERNS, STRUCTURAL_RULES, TEMPLATE_INJECTION_PATTERNS, XSS_PATTERNS,
};
pub use rules::{CatalogBuilder, Rule, RuleKind, RuleSpec, RuleSpecKind, StructuralCheck};

/// Version of the built-in rule set.
pub const CATALOG_VERSION: &str = "2.1.0";

/// Threat categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatCategory {
    /// Code-evaluation primitives and runtime introspection
    CodeInjection,
    /// Server-side template injection
    TemplateInjection,
    /// Cross-site scripting
    Xss,
    /// Shell command injection
    CommandInjection,
    /// SQL injection
    SqlInjection,
    /// Path traversal and filesystem access
    PathTraversal,
    /// Credential and personal data exposure
    SensitiveData,
    /// Structural denial-of-service and malformed input
    DosStructural,
}

impl ThreatCategory {
    /// Every category, in catalog order.
    pub const ALL: [ThreatCategory; 8] = [
        ThreatCategory::CodeInjection,
        ThreatCategory::TemplateInjection,
        ThreatCategory::Xss,
        ThreatCategory::CommandInjection,
        ThreatCategory::SqlInjection,
        ThreatCategory::PathTraversal,
        ThreatCategory::SensitiveData,
        ThreatCategory::DosStructural,
    ];

    /// Wire name of the category (e.g. `"SQL_INJECTION"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::CodeInjection => "CODE_INJECTION",
            ThreatCategory::TemplateInjection => "TEMPLATE_INJECTION",
            ThreatCategory::Xss => "XSS",
            ThreatCategory::CommandInjection => "COMMAND_INJECTION",
            ThreatCategory::SqlInjection => "SQL_INJECTION",
            ThreatCategory::PathTraversal => "PATH_TRAVERSAL",
            ThreatCategory::SensitiveData => "SENSITIVE_DATA",
            ThreatCategory::DosStructural => "DOS_STRUCTURAL",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        ThreatCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown threat category: {s}"))
    }
}

/// Rule severity. The weight is the rule's contribution to a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational; weight 1
    Low,
    /// Suspicious; weight 3
    Medium,
    /// Likely attack; weight 5
    High,
    /// Known attack idiom; weight 10
    Critical,
}

impl Severity {
    /// Risk-score weight of this severity.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 3,
            Severity::High => 5,
            Severity::Critical => 10,
        }
    }

    /// Wire name of the severity (e.g. `"CRITICAL"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Immutable, ordered set of detection rules.
///
/// There is no mutation API. Updating the rules means building a new
/// catalog and swapping the `Arc` that callers hold.
#[derive(Debug)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    version: String,
}

impl RuleCatalog {
    /// Build the default catalog from the static rule tables.
    pub fn builtin() -> crate::Result<Self> {
        CatalogBuilder::new().with_builtin_rules().build()
    }

    /// Start a custom catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub(crate) fn from_parts(rules: Vec<Rule>, version: String) -> Self {
        Self { rules, version }
    }

    /// All rules in insertion order.
    pub fn all_rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules of one category, in insertion order.
    pub fn rules_for(&self, category: ThreatCategory) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.category() == category)
            .collect()
    }

    /// Look up a rule by id (`<CATEGORY>:<name>`).
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// The rule backing a structural check, if the catalog carries one.
    pub fn structural(&self, check: StructuralCheck) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|r| matches!(r.kind(), RuleKind::Structural(c) if *c == check))
    }

    /// Rules flagged as safe to strip textually.
    pub fn strippable_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.is_strippable())
    }

    /// Categories that have at least one rule.
    pub fn categories(&self) -> Vec<ThreatCategory> {
        ThreatCategory::ALL
            .into_iter()
            .filter(|c| self.rules.iter().any(|r| r.category() == *c))
            .collect()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the catalog has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule-set version string.
    pub fn version(&self) -> &str {
        &self.version
    }
}
