//! Rule definitions and catalog construction.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::matcher::{KeyValueMatcher, LiteralMatcher, Matcher, PatternMatcher};
use super::patterns::{
    CODE_INJECTION_PATTERNS, COMMAND_INJECTION_PATTERNS, LITERAL_RULES, PATH_TRAVERSAL_PATTERNS,
    SENSITIVE_DATA_PATTERNS, SENSITIVE_KEYS, SQL_INJECTION_PATTERNS, STRUCTURAL_RULES,
    TEMPLATE_INJECTION_PATTERNS, XSS_PATTERNS,
};
use super::{RuleCatalog, Severity, ThreatCategory, CATALOG_VERSION};
use crate::error::{GuardError, Result};

/// Structural checks evaluated by the validator against its configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralCheck {
    /// Content shorter than `min_content_length`
    MinLength,
    /// Content longer than `max_content_length`
    MaxLength,
    /// `{{` nesting at or beyond `max_nesting_depth`
    NestingDepth,
    /// More distinct variables than `max_variable_count` (warning only)
    VariableCount,
    /// Raw NUL characters
    NullByte,
    /// Input bytes are not valid UTF-8
    InvalidEncoding,
}

impl StructuralCheck {
    /// Every structural check.
    pub const ALL: [StructuralCheck; 6] = [
        StructuralCheck::MinLength,
        StructuralCheck::MaxLength,
        StructuralCheck::NestingDepth,
        StructuralCheck::VariableCount,
        StructuralCheck::NullByte,
        StructuralCheck::InvalidEncoding,
    ];

    /// True when a finding of this check is a warning, not a violation.
    pub fn is_warning(&self) -> bool {
        matches!(self, StructuralCheck::VariableCount)
    }

    /// Stable identity string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralCheck::MinLength => "structural:min_length",
            StructuralCheck::MaxLength => "structural:max_length",
            StructuralCheck::NestingDepth => "structural:nesting_depth",
            StructuralCheck::VariableCount => "structural:variable_count",
            StructuralCheck::NullByte => "structural:null_byte",
            StructuralCheck::InvalidEncoding => "structural:invalid_encoding",
        }
    }
}

impl fmt::Display for StructuralCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a compiled rule matches.
#[derive(Debug)]
pub enum RuleKind {
    /// Compiled regex
    Pattern(PatternMatcher),
    /// Case-insensitive substring
    Literal(LiteralMatcher),
    /// Credential key followed by a value
    KeyValue(KeyValueMatcher),
    /// Limit check run by the validator
    Structural(StructuralCheck),
}

/// A compiled detection rule.
#[derive(Debug)]
pub struct Rule {
    id: String,
    name: String,
    category: ThreatCategory,
    severity: Severity,
    message: String,
    kind: RuleKind,
    strippable: bool,
}

impl Rule {
    /// `<CATEGORY>:<name>`, unique within a catalog.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Threat category.
    pub fn category(&self) -> ThreatCategory {
        self.category
    }

    /// Severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Message reported with each finding.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rule kind.
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Safe to remove textually during sanitization.
    pub fn is_strippable(&self) -> bool {
        self.strippable
    }

    /// Text matcher, `None` for structural rules.
    pub fn matcher(&self) -> Option<&dyn Matcher> {
        match &self.kind {
            RuleKind::Pattern(m) => Some(m),
            RuleKind::Literal(m) => Some(m),
            RuleKind::KeyValue(m) => Some(m),
            RuleKind::Structural(_) => None,
        }
    }

    /// Identity source (pattern text, literal, or structural check name).
    pub fn source(&self) -> &str {
        match &self.kind {
            RuleKind::Structural(check) => check.as_str(),
            _ => self.matcher().map_or("", |m| m.source()),
        }
    }
}

/// Uncompiled rule definition.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    /// Rule name
    pub name: String,
    /// Threat category
    pub category: ThreatCategory,
    /// Severity
    pub severity: Severity,
    /// Message reported with each finding
    pub message: String,
    /// What to match
    pub kind: RuleSpecKind,
    /// Safe to remove textually during sanitization
    pub strippable: bool,
}

/// Uncompiled rule kind.
#[derive(Debug, Clone)]
pub enum RuleSpecKind {
    /// Regex source
    Pattern(String),
    /// Literal substring
    Literal(String),
    /// Credential key names
    KeyValue(Vec<String>),
    /// Structural check
    Structural(StructuralCheck),
}

impl RuleSpec {
    /// Regex rule.
    pub fn pattern(
        name: &str,
        category: ThreatCategory,
        severity: Severity,
        message: &str,
        pattern: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            severity,
            message: message.to_string(),
            kind: RuleSpecKind::Pattern(pattern.to_string()),
            strippable: false,
        }
    }

    /// Literal rule.
    pub fn literal(
        name: &str,
        category: ThreatCategory,
        severity: Severity,
        message: &str,
        literal: &str,
    ) -> Self {
        Self {
            kind: RuleSpecKind::Literal(literal.to_string()),
            ..Self::pattern(name, category, severity, message, "")
        }
    }

    /// Key/value credential rule.
    pub fn key_value<S: AsRef<str>>(
        name: &str,
        severity: Severity,
        message: &str,
        keys: &[S],
    ) -> Self {
        Self {
            kind: RuleSpecKind::KeyValue(keys.iter().map(|k| k.as_ref().to_string()).collect()),
            ..Self::pattern(name, ThreatCategory::SensitiveData, severity, message, "")
        }
    }

    /// Structural rule; always in the `DOS_STRUCTURAL` category.
    pub fn structural(name: &str, check: StructuralCheck, severity: Severity, message: &str) -> Self {
        Self {
            kind: RuleSpecKind::Structural(check),
            ..Self::pattern(name, ThreatCategory::DosStructural, severity, message, "")
        }
    }

    /// Mark the rule as strippable.
    pub fn strippable(mut self) -> Self {
        self.strippable = true;
        self
    }

    fn compile(self) -> Result<Rule> {
        let kind = match self.kind {
            RuleSpecKind::Pattern(pattern) => {
                if pattern.is_empty() {
                    return Err(GuardError::EmptyRule(self.name));
                }
                let matcher =
                    PatternMatcher::new(&pattern).map_err(|source| GuardError::InvalidPattern {
                        category: self.category,
                        pattern,
                        source,
                    })?;
                RuleKind::Pattern(matcher)
            },
            RuleSpecKind::Literal(literal) => {
                if literal.is_empty() {
                    return Err(GuardError::EmptyRule(self.name));
                }
                RuleKind::Literal(LiteralMatcher::new(&literal))
            },
            RuleSpecKind::KeyValue(keys) => {
                if keys.is_empty() || keys.iter().any(String::is_empty) {
                    return Err(GuardError::EmptyRule(self.name));
                }
                let matcher =
                    KeyValueMatcher::new(&keys).map_err(|source| GuardError::InvalidPattern {
                        category: self.category,
                        pattern: keys.join("|"),
                        source,
                    })?;
                RuleKind::KeyValue(matcher)
            },
            RuleSpecKind::Structural(check) => RuleKind::Structural(check),
        };

        Ok(Rule {
            id: format!("{}:{}", self.category, self.name),
            name: self.name,
            category: self.category,
            severity: self.severity,
            message: self.message,
            kind,
            strippable: self.strippable,
        })
    }
}

/// Builder for [`RuleCatalog`].
///
/// Construction is all-or-nothing: one broken pattern or duplicate fails the
/// whole build.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    specs: Vec<RuleSpec>,
    version: String,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            version: CATALOG_VERSION.to_string(),
        }
    }

    /// Append the built-in rule tables.
    pub fn with_builtin_rules(mut self) -> Self {
        self.specs.extend(builtin_specs());
        self
    }

    /// Append one rule.
    pub fn with_rule(mut self, spec: RuleSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Override the version string.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Compile every rule and check identities.
    pub fn build(self) -> Result<RuleCatalog> {
        let mut identities: HashSet<(ThreatCategory, String)> = HashSet::new();
        let mut ids: HashSet<String> = HashSet::new();
        let mut rules = Vec::with_capacity(self.specs.len());

        for spec in self.specs {
            let rule = spec.compile()?;
            if !identities.insert((rule.category(), rule.source().to_string())) {
                return Err(GuardError::DuplicateRule {
                    category: rule.category(),
                    pattern: rule.source().to_string(),
                });
            }
            if !ids.insert(rule.id().to_string()) {
                return Err(GuardError::DuplicateRule {
                    category: rule.category(),
                    pattern: rule.id().to_string(),
                });
            }
            rules.push(rule);
        }

        tracing::debug!(rules = rules.len(), version = %self.version, "rule catalog built");
        Ok(RuleCatalog::from_parts(rules, self.version))
    }
}

/// Built-in rule specs in evaluation order: structural first, then
/// pattern families, literals and the credential key/value rule.
fn builtin_specs() -> Vec<RuleSpec> {
    let mut specs: Vec<RuleSpec> = STRUCTURAL_RULES
        .iter()
        .map(|r| RuleSpec::structural(r.name, r.check, r.severity, r.message))
        .collect();

    let tables = [
        CODE_INJECTION_PATTERNS,
        TEMPLATE_INJECTION_PATTERNS,
        XSS_PATTERNS,
        COMMAND_INJECTION_PATTERNS,
        SQL_INJECTION_PATTERNS,
        PATH_TRAVERSAL_PATTERNS,
        SENSITIVE_DATA_PATTERNS,
    ];
    for table in tables {
        for p in table {
            let spec = RuleSpec::pattern(p.name, p.category, p.severity, p.message, p.pattern);
            specs.push(if p.strippable { spec.strippable() } else { spec });
        }
    }

    specs.extend(
        LITERAL_RULES
            .iter()
            .map(|l| RuleSpec::literal(l.name, l.category, l.severity, l.message, l.literal)),
    );

    specs.push(RuleSpec::key_value(
        "credential_assignment",
        Severity::High,
        "Credential assigned inline",
        SENSITIVE_KEYS,
    ));

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rule_rejected() {
        let result = CatalogBuilder::new()
            .with_rule(RuleSpec::pattern(
                "a",
                ThreatCategory::Xss,
                Severity::High,
                "a",
                "<script",
            ))
            .with_rule(RuleSpec::pattern(
                "b",
                ThreatCategory::Xss,
                Severity::Low,
                "b",
                "<script",
            ))
            .build();
        assert!(matches!(result, Err(GuardError::DuplicateRule { .. })));
    }

    #[test]
    fn test_same_pattern_different_category_allowed() {
        let catalog = CatalogBuilder::new()
            .with_rule(RuleSpec::pattern(
                "a",
                ThreatCategory::Xss,
                Severity::High,
                "a",
                "<script",
            ))
            .with_rule(RuleSpec::pattern(
                "a",
                ThreatCategory::TemplateInjection,
                Severity::High,
                "a",
                "<script",
            ))
            .build()
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        let result = CatalogBuilder::new()
            .with_builtin_rules()
            .with_rule(RuleSpec::pattern(
                "broken",
                ThreatCategory::SqlInjection,
                Severity::High,
                "broken",
                r"(select",
            ))
            .build();
        let err = result.unwrap_err();
        assert!(err.is_catalog_error());
        assert!(matches!(err, GuardError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_rule_rejected() {
        let result = CatalogBuilder::new()
            .with_rule(RuleSpec::literal(
                "empty",
                ThreatCategory::Xss,
                Severity::Low,
                "empty",
                "",
            ))
            .build();
        assert!(matches!(result, Err(GuardError::EmptyRule(_))));

        let result = CatalogBuilder::new()
            .with_rule(RuleSpec::key_value::<&str>("kv", Severity::Low, "kv", &[]))
            .build();
        assert!(matches!(result, Err(GuardError::EmptyRule(_))));
    }

    #[test]
    fn test_rule_accessors() {
        let catalog = CatalogBuilder::new()
            .with_rule(
                RuleSpec::pattern(
                    "custom",
                    ThreatCategory::Xss,
                    Severity::Medium,
                    "Custom rule",
                    r"(?i)<marquee",
                )
                .strippable(),
            )
            .version("test-1")
            .build()
            .unwrap();
        let rule = &catalog.all_rules()[0];
        assert_eq!(rule.id(), "XSS:custom");
        assert_eq!(rule.name(), "custom");
        assert_eq!(rule.severity(), Severity::Medium);
        assert_eq!(rule.message(), "Custom rule");
        assert_eq!(rule.source(), "(?i)<marquee");
        assert!(rule.is_strippable());
        assert!(rule.matcher().unwrap().is_match("<MARQUEE>"));
        assert_eq!(catalog.version(), "test-1");
    }

    #[test]
    fn test_structural_rule_has_no_matcher() {
        let catalog = RuleCatalog::builtin().unwrap();
        let rule = catalog.structural(StructuralCheck::NullByte).unwrap();
        assert!(rule.matcher().is_none());
        assert_eq!(rule.source(), "structural:null_byte");
        assert_eq!(rule.id(), "DOS_STRUCTURAL:null_byte");
    }

    #[test]
    fn test_builtin_has_key_value_rule() {
        let catalog = RuleCatalog::builtin().unwrap();
        let rule = catalog.get("SENSITIVE_DATA:credential_assignment").unwrap();
        assert!(matches!(rule.kind(), RuleKind::KeyValue(_)));
        assert!(rule.matcher().unwrap().is_match("api_key=sk_live_12345678"));
    }
}
