//! Best-effort markup neutralization.
//!
//! The sanitizer only deletes text. It removes:
//!
//! - `<script>...</script>` blocks and any remaining `<script` openers
//! - `javascript:` URI schemes
//! - `on*=` event-handler assignments
//! - engine-introspection identifiers inside `{{ }}` placeholders
//! - matches of every strippable XSS / template-injection catalog rule
//!
//! Passes repeat until the text stops changing. Every pass that changes the
//! text makes it strictly shorter, so the loop terminates and the output is
//! never longer than the input.
//!
//! Nested input such as `<scr<scr<script>ipt>ipt>` re-forms a construct after
//! each removal and would otherwise need one full pass per layer. After
//! [`MAX_PASSES`] the sanitizer deletes every markup metacharacter the
//! removal steps depend on (`<`, `:`, `=`, `{`) in one linear sweep, which no
//! built-in step can match afterwards. Work stays linear in the input and
//! `sanitize` remains idempotent.
//!
//! SQL, command and path-traversal findings are never "fixed" here; those
//! categories are reject-only.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::catalog::{RuleCatalog, ThreatCategory};
use crate::config::SanitizerConfig;
use crate::error::Result;

lazy_static! {
    static ref SCRIPT_BLOCK: Regex =
        Regex::new(r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>").unwrap();
    static ref SCRIPT_OPENER: Regex = Regex::new(r"(?i)<\s*/?\s*script").unwrap();
    static ref JAVASCRIPT_SCHEME: Regex = Regex::new(r"(?i)javascript\s*:").unwrap();
    static ref OPEN_TAG: Regex = Regex::new(r"<[^<>]*").unwrap();
    static ref HANDLER_ATTRIBUTE: Regex = Regex::new(
        r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)"#
    )
    .unwrap();
    static ref EVENT_HANDLER: Regex = Regex::new(
        r"(?i)on(?:abort|blur|change|click|dblclick|error|focus|input|keydown|keypress|keyup|load|mousedown|mousemove|mouseout|mouseover|mouseup|pageshow|pointerdown|reset|resize|scroll|select|submit|toggle|unload|animationstart|transitionend)\s*="
    )
    .unwrap();
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{[^{}]*\}\}").unwrap();
    static ref ENGINE_IDENTIFIER: Regex = Regex::new(
        r"\b(?:constructor|__proto__|prototype|this|globalThis|global|process|self|request|session|config)\b"
    )
    .unwrap();
}

/// Passes run before falling back to the metacharacter sweep.
pub const MAX_PASSES: u32 = 8;

const MARKUP_CHARS: [char; 4] = ['<', ':', '=', '{'];

/// Textual sanitizer.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    catalog: Option<Arc<RuleCatalog>>,
    config: SanitizerConfig,
}

impl Sanitizer {
    /// Sanitizer with the fixed removal steps only.
    pub fn new(config: SanitizerConfig) -> Self {
        Self {
            catalog: None,
            config,
        }
    }

    /// Sanitizer that also strips the catalog's strippable markup rules.
    pub fn with_catalog(catalog: Arc<RuleCatalog>, config: SanitizerConfig) -> Self {
        Self {
            catalog: Some(catalog),
            config,
        }
    }

    /// Sanitizer over the built-in catalog.
    pub fn builtin() -> Result<Self> {
        Ok(Self::with_catalog(
            Arc::new(RuleCatalog::builtin()?),
            SanitizerConfig::default(),
        ))
    }

    /// Remove dangerous markup from `text`.
    pub fn sanitize(&self, text: &str) -> String {
        let (out, passes) = self.converge(text);
        if passes > 0 {
            tracing::debug!(passes, removed = text.len() - out.len(), "template sanitized");
        }
        out
    }

    /// Run passes to a fixed point. Returns the text and the number of
    /// passes that changed it.
    fn converge(&self, text: &str) -> (String, u32) {
        let mut current = text.to_string();
        let mut passes = 0u32;
        loop {
            let next = self.pass(&current);
            if next == current {
                break;
            }
            current = next;
            passes += 1;
            if passes == MAX_PASSES {
                tracing::warn!(
                    passes,
                    len = current.len(),
                    "nested markup keeps re-forming, stripping markup characters"
                );
                current.retain(|c| !MARKUP_CHARS.contains(&c));
            }
        }
        (current, passes)
    }

    /// One round of every removal step.
    fn pass(&self, text: &str) -> String {
        let mut out = SCRIPT_BLOCK.replace_all(text, "").into_owned();
        out = replace(&SCRIPT_OPENER, out, "");
        out = replace(&JAVASCRIPT_SCHEME, out, "");
        if HANDLER_ATTRIBUTE.is_match(&out) {
            out = OPEN_TAG
                .replace_all(&out, |caps: &Captures<'_>| {
                    HANDLER_ATTRIBUTE.replace_all(&caps[0], "").into_owned()
                })
                .into_owned();
        }
        out = replace(&EVENT_HANDLER, out, "");

        if self.config.strip_template_identifiers {
            out = PLACEHOLDER
                .replace_all(&out, |caps: &Captures<'_>| {
                    ENGINE_IDENTIFIER.replace_all(&caps[0], "").into_owned()
                })
                .into_owned();
        }

        if let Some(catalog) = &self.catalog {
            for rule in catalog.strippable_rules() {
                if !matches!(
                    rule.category(),
                    ThreatCategory::Xss | ThreatCategory::TemplateInjection
                ) {
                    continue;
                }
                if let Some(matcher) = rule.matcher() {
                    let ranges = matcher.find(&out);
                    if !ranges.is_empty() {
                        out = remove_ranges(&out, &ranges);
                    }
                }
            }
        }
        out
    }
}

fn replace(re: &Regex, text: String, rep: &str) -> String {
    match re.replace_all(&text, rep) {
        Cow::Borrowed(_) => text,
        Cow::Owned(s) => s,
    }
}

/// Delete sorted, non-overlapping byte ranges.
fn remove_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for r in ranges {
        if r.start < last {
            continue;
        }
        out.push_str(&text[last..r.start]);
        last = r.end;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::builtin().unwrap()
    }

    #[test]
    fn test_strips_script_block() {
        let out = sanitizer().sanitize("Hi <script>alert('x')</script>{{name}}");
        assert_eq!(out, "Hi {{name}}");
    }

    #[test]
    fn test_strips_reassembled_script() {
        let out = sanitizer().sanitize("<scr<scriptipt>alert(1)");
        assert!(!out.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_strips_javascript_uri() {
        let out = sanitizer().sanitize(r#"<a href="JavaScript:alert(1)">x</a>"#);
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(out.contains("x</a>"));
    }

    #[test]
    fn test_strips_event_handlers() {
        let out = sanitizer().sanitize(r#"<img src="a.png" onerror="alert(1)" onclick=go()>"#);
        assert_eq!(out, r#"<img src="a.png">"#);

        let out = sanitizer().sanitize("text onload= x ONCLICK =y");
        assert!(!out.to_lowercase().contains("onload="));
        assert!(!out.to_lowercase().contains("onclick"));
    }

    #[test]
    fn test_strips_template_identifiers() {
        let out = sanitizer().sanitize("Hi {{name}} {{constructor.constructor('x')()}}");
        assert!(out.starts_with("Hi {{name}} {{"));
        assert!(!out.contains("constructor"));
    }

    #[test]
    fn test_identifiers_outside_placeholders_kept() {
        let s = Sanitizer::new(SanitizerConfig::default());
        let text = "Describe this process for the session.";
        assert_eq!(s.sanitize(text), text);
    }

    #[test]
    fn test_identifier_stripping_disabled() {
        let s = Sanitizer::new(SanitizerConfig {
            strip_template_identifiers: false,
        });
        assert_eq!(s.sanitize("{{this.name}}"), "{{this.name}}");
    }

    #[test]
    fn test_sql_left_alone() {
        let text = "' OR '1'='1' UNION SELECT * FROM users";
        assert_eq!(sanitizer().sanitize(text), text);
    }

    #[test]
    fn test_idempotent_and_shrinking() {
        let s = sanitizer();
        for input in [
            "<<scriptscript>>",
            "javajavascript:script:",
            "<svg onload=alert(1)>",
            "{{__proto__}}<iframe src=x>",
            "plain text",
        ] {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "not idempotent for {input}");
            assert!(once.len() <= input.len());
        }
    }

    #[test]
    fn test_every_handler_in_one_pass() {
        let (out, passes) =
            sanitizer().converge("<a href=x onclick=a() onmouseover='b' onfocus=\"c\">go</a>");
        assert_eq!(out, "<a href=x>go</a>");
        assert_eq!(passes, 1);
    }

    #[test]
    fn test_deep_nesting_bounded() {
        let s = sanitizer();
        let depth = 20_000;
        for input in [
            format!("{}{}", "<scr".repeat(depth), "ipt".repeat(depth)),
            format!("{}{}", "java".repeat(depth), "script:".repeat(depth)),
            format!("{}{}", "on".repeat(depth), "click=".repeat(depth)),
        ] {
            let started = Instant::now();
            let (out, passes) = s.converge(&input);
            let elapsed = started.elapsed();

            assert!(passes <= MAX_PASSES, "{passes} passes");
            assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
            let lower = out.to_ascii_lowercase();
            assert!(!lower.contains("<script"));
            assert!(!lower.contains("javascript:"));
            assert!(!lower.contains("onclick="));
            assert_eq!(s.sanitize(&out), out);
        }
    }

    #[test]
    fn test_shallow_nesting_keeps_markup() {
        let out = sanitizer().sanitize("<b>Hi</b> <scr<scriptipt>x</b>");
        assert_eq!(out, "<b>Hi</b> x</b>");
    }

    #[test]
    fn test_remove_ranges() {
        assert_eq!(remove_ranges("abcdef", &[1..2, 4..5]), "acdf");
        assert_eq!(remove_ranges("abc", &[]), "abc");
    }
}
