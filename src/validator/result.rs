//! Validation findings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::Encoding;
use crate::catalog::{Severity, ThreatCategory};
use crate::monitor::SecurityEvent;

/// Longest matched fragment kept on a finding, in characters.
pub const MAX_FRAGMENT_CHARS: usize = 80;

/// Byte range in the validated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl From<std::ops::Range<usize>> for TextRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self {
            start: r.start,
            end: r.end,
        }
    }
}

/// One matched rule instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Id of the catalog rule that produced this violation
    pub rule_id: String,
    /// Threat category
    pub category: ThreatCategory,
    /// Severity
    pub severity: Severity,
    /// Rule message with matched-fragment context
    pub message: String,
    /// Matched fragment, truncated
    pub matched: String,
    /// Location in the original text; `None` when the match only exists in a
    /// decoded variant and cannot be mapped back
    pub range: Option<TextRange>,
    /// Encoding the match was found under; `None` for raw matches
    pub encoding: Option<Encoding>,
}

impl Violation {
    /// True when found only after decoding.
    pub fn is_encoded(&self) -> bool {
        self.encoding.is_some()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.severity, self.category, self.message)
    }
}

/// Warning categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCategory {
    /// More distinct variables than the configured high-water mark
    HighVariableUsage,
    /// `{{` and `}}` counts differ
    UnbalancedPlaceholder,
}

impl WarningCategory {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCategory::HighVariableUsage => "HIGH_VARIABLE_USAGE",
            WarningCategory::UnbalancedPlaceholder => "UNBALANCED_PLACEHOLDER",
        }
    }
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational finding. Never affects the verdict or the risk score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Warning category
    pub category: WarningCategory,
    /// Human-readable message
    pub message: String,
}

/// Verdict of one `validate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// No violations and risk score within the reject threshold
    pub is_secure: bool,
    /// Sum of violation severity weights
    pub risk_score: u32,
    /// Violations in catalog order
    pub violations: Vec<Violation>,
    /// Warnings
    pub warnings: Vec<Warning>,
}

impl ValidationResult {
    /// Build a result, deriving score and verdict from `violations`.
    pub fn new(violations: Vec<Violation>, warnings: Vec<Warning>, reject_threshold: u32) -> Self {
        let risk_score = risk_score(&violations);
        Self {
            is_secure: violations.is_empty() && risk_score <= reject_threshold,
            risk_score,
            violations,
            warnings,
        }
    }

    /// Distinct violation categories, in first-seen order.
    pub fn categories(&self) -> Vec<ThreatCategory> {
        let mut out = Vec::new();
        for v in &self.violations {
            if !out.contains(&v.category) {
                out.push(v.category);
            }
        }
        out
    }

    /// True if any violation is in `category`.
    pub fn has_category(&self, category: ThreatCategory) -> bool {
        self.violations.iter().any(|v| v.category == category)
    }

    /// True if any warning is in `category`.
    pub fn has_warning(&self, category: WarningCategory) -> bool {
        self.warnings.iter().any(|w| w.category == category)
    }

    /// Highest violation severity.
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    /// One event per violation, stamped `timestamp`.
    pub fn to_events(
        &self,
        user_id: &str,
        template_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Vec<SecurityEvent> {
        self.violations
            .iter()
            .map(|v| SecurityEvent {
                user_id: user_id.to_string(),
                template_id: template_id.to_string(),
                category: v.category,
                severity: v.severity,
                timestamp,
            })
            .collect()
    }
}

/// Sum of severity weights. Saturates instead of wrapping.
pub fn risk_score(violations: &[Violation]) -> u32 {
    violations
        .iter()
        .fold(0u32, |acc, v| acc.saturating_add(v.severity.weight()))
}

/// Cut `fragment` to [`MAX_FRAGMENT_CHARS`] characters.
pub fn truncate_fragment(fragment: &str) -> String {
    match fragment.char_indices().nth(MAX_FRAGMENT_CHARS) {
        Some((idx, _)) => format!("{}...", &fragment[..idx]),
        None => fragment.to_string(),
    }
}
