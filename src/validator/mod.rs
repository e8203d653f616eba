//! Template validator.
//!
//! Validation runs in two independent phases over the same input:
//!
//! 1. **Structural checks**: length bounds, `{{` nesting depth (bracket-depth
//!    scan, no regex), distinct variable count, NUL characters, placeholder
//!    balance.
//! 2. **Pattern checks**: every text matcher in the catalog runs against the
//!    raw text. A rule that finds nothing in the raw text is retried against
//!    decoded [variants](normalize::variants) of the input; the first variant
//!    hit is reported once, tagged with its [`Encoding`].
//!
//! All matches are collected. There is no short-circuit, so the risk score
//! reflects cumulative risk.
//!
//! # Example
//!
//! ```rust,ignore
//! use template_guard::validator::Validator;
//!
//! let validator = Validator::builtin()?;
//! let result = validator.validate("Hello {{name}}")?;
//! assert!(result.is_secure);
//! ```

pub mod normalize;
mod result;

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::{Rule, RuleCatalog, StructuralCheck};
use crate::config::ValidatorConfig;
use crate::error::{GuardError, Result};

pub use normalize::Encoding;
pub use result::{
    risk_score, truncate_fragment, TextRange, ValidationResult, Violation, Warning,
    WarningCategory, MAX_FRAGMENT_CHARS,
};

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\{\{\s*([A-Za-z_$][\w$.\[\]-]*)\s*\}\}").unwrap();
}

/// Stateless template validator.
///
/// Cheap to clone; the catalog is shared.
#[derive(Debug, Clone)]
pub struct Validator {
    catalog: Arc<RuleCatalog>,
    config: ValidatorConfig,
}

impl Validator {
    /// Create a validator over `catalog`.
    pub fn new(catalog: Arc<RuleCatalog>, config: ValidatorConfig) -> Self {
        Self { catalog, config }
    }

    /// Validator over the built-in catalog with default limits.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(
            Arc::new(RuleCatalog::builtin()?),
            ValidatorConfig::default(),
        ))
    }

    /// The rule catalog.
    pub fn catalog(&self) -> &Arc<RuleCatalog> {
        &self.catalog
    }

    /// Active limits.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate template text.
    ///
    /// Fails only with [`GuardError::PayloadTooLarge`]; every finding is part
    /// of the returned result.
    pub fn validate(&self, text: &str) -> Result<ValidationResult> {
        self.check_payload(text.len())?;
        Ok(self.scan(text, Vec::new()))
    }

    /// Validate raw bytes. Invalid UTF-8 is reported as an `invalid_encoding`
    /// violation and the lossily decoded text is scanned as usual.
    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<ValidationResult> {
        self.check_payload(bytes.len())?;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(self.scan(text, Vec::new())),
            Err(err) => {
                let mut violations = Vec::new();
                if let Some(rule) = self.catalog.structural(StructuralCheck::InvalidEncoding) {
                    let start = err.valid_up_to();
                    let end = start + err.error_len().unwrap_or(bytes.len() - start);
                    violations.push(structural_violation(
                        rule,
                        format!("{} (invalid UTF-8 at byte {start})", rule.message()),
                        Some(TextRange { start, end }),
                    ));
                }
                let text = String::from_utf8_lossy(bytes);
                Ok(self.scan(&text, violations))
            },
        }
    }

    fn check_payload(&self, size: usize) -> Result<()> {
        if size > self.config.max_payload_bytes {
            return Err(GuardError::PayloadTooLarge {
                size,
                limit: self.config.max_payload_bytes,
            });
        }
        Ok(())
    }

    fn scan(&self, text: &str, mut violations: Vec<Violation>) -> ValidationResult {
        let mut warnings = Vec::new();
        self.check_structure(text, &mut violations, &mut warnings);
        self.check_patterns(text, &mut violations);

        let result = ValidationResult::new(violations, warnings, self.config.reject_threshold);
        for v in &result.violations {
            tracing::warn!(
                rule = %v.rule_id,
                category = %v.category,
                severity = %v.severity,
                encoding = ?v.encoding,
                "template violation"
            );
        }
        tracing::debug!(
            secure = result.is_secure,
            risk_score = result.risk_score,
            violations = result.violations.len(),
            warnings = result.warnings.len(),
            "template validated"
        );
        result
    }

    fn check_structure(
        &self,
        text: &str,
        violations: &mut Vec<Violation>,
        warnings: &mut Vec<Warning>,
    ) {
        let cfg = &self.config;
        let length = text.chars().count();

        if length < cfg.min_content_length {
            if let Some(rule) = self.catalog.structural(StructuralCheck::MinLength) {
                violations.push(structural_violation(
                    rule,
                    format!(
                        "{} ({length} < {} characters)",
                        rule.message(),
                        cfg.min_content_length
                    ),
                    None,
                ));
            }
        }

        if length > cfg.max_content_length {
            if let Some(rule) = self.catalog.structural(StructuralCheck::MaxLength) {
                violations.push(structural_violation(
                    rule,
                    format!(
                        "{} ({length} > {} characters)",
                        rule.message(),
                        cfg.max_content_length
                    ),
                    None,
                ));
            }
        }

        let depth = nesting_depth(text);
        if depth >= cfg.max_nesting_depth {
            if let Some(rule) = self.catalog.structural(StructuralCheck::NestingDepth) {
                violations.push(structural_violation(
                    rule,
                    format!(
                        "{} (depth {depth}, limit {})",
                        rule.message(),
                        cfg.max_nesting_depth
                    ),
                    None,
                ));
            }
        }

        if let Some(pos) = text.find('\0') {
            if let Some(rule) = self.catalog.structural(StructuralCheck::NullByte) {
                violations.push(structural_violation(
                    rule,
                    format!("{} (offset {pos})", rule.message()),
                    Some(TextRange {
                        start: pos,
                        end: pos + 1,
                    }),
                ));
            }
        }

        let variables = distinct_variables(text);
        if variables.len() > cfg.max_variable_count
            && self
                .catalog
                .structural(StructuralCheck::VariableCount)
                .is_some()
        {
            warnings.push(Warning {
                category: WarningCategory::HighVariableUsage,
                message: format!(
                    "Template references {} distinct variables (high-water mark {})",
                    variables.len(),
                    cfg.max_variable_count
                ),
            });
        }

        let opens = text.matches("{{").count();
        let closes = text.matches("}}").count();
        if opens != closes {
            warnings.push(Warning {
                category: WarningCategory::UnbalancedPlaceholder,
                message: format!("Unbalanced placeholders: {opens} `{{{{` vs {closes} `}}}}`"),
            });
        }
    }

    fn check_patterns(&self, text: &str, violations: &mut Vec<Violation>) {
        let variants = if self.config.decode_variants {
            normalize::variants(text)
        } else {
            Vec::new()
        };

        for rule in self.catalog.all_rules() {
            let Some(matcher) = rule.matcher() else {
                continue;
            };

            let ranges = matcher.find(text);
            if !ranges.is_empty() {
                violations.extend(
                    ranges
                        .into_iter()
                        .map(|r| match_violation(rule, &text[r.clone()], Some(r.into()), None)),
                );
                continue;
            }

            for (encoding, decoded) in &variants {
                let Some(r) = matcher.find(decoded).into_iter().next() else {
                    continue;
                };
                let fragment = &decoded[r.clone()];
                let range = if *encoding == Encoding::CaseFolded {
                    // ASCII folding preserves byte offsets.
                    Some(r.into())
                } else {
                    text.find(fragment).map(|start| TextRange {
                        start,
                        end: start + fragment.len(),
                    })
                };
                violations.push(match_violation(rule, fragment, range, Some(*encoding)));
                break;
            }
        }
    }
}

fn match_violation(
    rule: &Rule,
    fragment: &str,
    range: Option<TextRange>,
    encoding: Option<Encoding>,
) -> Violation {
    let matched = truncate_fragment(fragment);
    let message = match encoding {
        Some(enc) => format!("{} ({enc}-encoded): `{matched}`", rule.message()),
        None => format!("{}: `{matched}`", rule.message()),
    };
    Violation {
        rule_id: rule.id().to_string(),
        category: rule.category(),
        severity: rule.severity(),
        message,
        matched,
        range,
        encoding,
    }
}

fn structural_violation(rule: &Rule, message: String, range: Option<TextRange>) -> Violation {
    Violation {
        rule_id: rule.id().to_string(),
        category: rule.category(),
        severity: rule.severity(),
        message,
        matched: String::new(),
        range,
        encoding: None,
    }
}

/// Deepest `{{` nesting, by a left-to-right bracket-depth scan.
/// Unmatched `}}` never drive the depth below zero.
pub fn nesting_depth(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                max = max.max(depth);
                i += 2;
            },
            (b'}', b'}') => {
                depth = depth.saturating_sub(1);
                i += 2;
            },
            _ => i += 1,
        }
    }
    max
}

/// Distinct `{{name}}` variable names.
pub fn distinct_variables(text: &str) -> HashSet<&str> {
    VARIABLE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}
