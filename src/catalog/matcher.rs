//! Matching strategies used by catalog rules.
//!
//! A [`Matcher`] reports every non-overlapping byte range it finds in a text.
//! New detection strategies plug in by implementing the trait; the validator
//! only ever talks to `dyn Matcher`.

use std::fmt;
use std::ops::Range;

use regex::Regex;

/// Capability shared by all text matchers.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Byte ranges of every non-overlapping match, left to right.
    fn find(&self, text: &str) -> Vec<Range<usize>>;

    /// Source text that identifies this matcher inside its category.
    fn source(&self) -> &str;

    /// True if the matcher finds anything in `text`.
    fn is_match(&self, text: &str) -> bool {
        !self.find(text).is_empty()
    }
}

/// Compiled regex matcher.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The compiled regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl Matcher for PatternMatcher {
    fn find(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }

    fn source(&self) -> &str {
        self.regex.as_str()
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// ASCII case-insensitive substring matcher.
#[derive(Debug, Clone)]
pub struct LiteralMatcher {
    literal: String,
    folded: String,
}

impl LiteralMatcher {
    /// Create a matcher for `literal`.
    pub fn new(literal: &str) -> Self {
        Self {
            literal: literal.to_string(),
            folded: literal.to_ascii_lowercase(),
        }
    }
}

impl Matcher for LiteralMatcher {
    fn find(&self, text: &str) -> Vec<Range<usize>> {
        if self.folded.is_empty() {
            return Vec::new();
        }
        // ASCII folding keeps byte offsets identical to the input.
        let haystack = text.to_ascii_lowercase();
        haystack
            .match_indices(&self.folded)
            .map(|(start, m)| start..start + m.len())
            .collect()
    }

    fn source(&self) -> &str {
        &self.literal
    }
}

/// Credential assignment matcher: one of a curated list of key names,
/// followed by `:` or `=` and a literal value.
///
/// Placeholder values (`password: {{password}}`) are not reported.
#[derive(Debug, Clone)]
pub struct KeyValueMatcher {
    keys: Vec<String>,
    regex: Regex,
}

impl KeyValueMatcher {
    /// Build a matcher for `keys`. Underscores in a key also match `-` or
    /// nothing, so `api_key` covers `api-key` and `apikey`.
    pub fn new<S: AsRef<str>>(keys: &[S]) -> Result<Self, regex::Error> {
        let alternation = keys
            .iter()
            .map(|k| regex::escape(k.as_ref()).replace('_', "[_-]?"))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r#"(?i)\b(?:[a-z0-9]+[_-])?(?:{alternation})["']?\s*[:=]\s*["']?[^\s"',;{{}}<>]{{6,}}"#
        );
        Ok(Self {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            regex: Regex::new(&pattern)?,
        })
    }

    /// Key names this matcher looks for.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Matcher for KeyValueMatcher {
    fn find(&self, text: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(text).map(|m| m.range()).collect()
    }

    fn source(&self) -> &str {
        self.regex.as_str()
    }
}
