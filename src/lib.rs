//! # Template Guard - Security Gate for LLM Prompt Templates
//!
//! Validates user-authored prompt templates (text with `{{variable}}`
//! placeholders) before they are stored or rendered, scores their risk,
//! neutralizes dangerous markup on request, and tracks violation volume per
//! user to raise operational alerts.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │ RuleCatalog  │  immutable, Arc-shared
//!                  └──────┬───────┘
//!              ┌──────────┴──────────┐
//!              v                     v
//!        ┌───────────┐         ┌───────────┐
//! text ─>│ Validator │─verdict │ Sanitizer │─> cleaned text
//!        └─────┬─────┘         └───────────┘
//!              │ SecurityEvent (one per violation)
//!              v
//!   ┌──────────────────┐     ┌─────────────┐
//!   │ SecurityMonitor  │     │ AuditSink(s)│
//!   │ windows + alerts │     │ system of   │
//!   └──────────────────┘     │ record      │
//!                            └─────────────┘
//! ```
//!
//! The validator and sanitizer are pure functions of their input, the
//! catalog and their configuration. The monitor is the only stateful part.
//!
//! ### Threat Categories
//!
//! | Category             | Examples                                       |
//! |----------------------|------------------------------------------------|
//! | `CODE_INJECTION`     | `eval(`, `new Function(`, dynamic `require`    |
//! | `TEMPLATE_INJECTION` | `{{constructor.constructor(...)}}`, `__class__`|
//! | `XSS`                | `<script>`, `onerror=`, `javascript:`          |
//! | `COMMAND_INJECTION`  | `; rm -rf`, `$(curl ...)`, `nc -e`             |
//! | `SQL_INJECTION`      | `' OR '1'='1`, `UNION SELECT`, `SLEEP(5)`      |
//! | `PATH_TRAVERSAL`     | `../`, `%2e%2e%2f`, `file://`                  |
//! | `SENSITIVE_DATA`     | `password=...`, PEM keys, card numbers         |
//! | `DOS_STRUCTURAL`     | length, nesting depth, NUL, invalid UTF-8      |
//!
//! ### Verdict
//!
//! | Field        | Meaning                                             |
//! |--------------|-----------------------------------------------------|
//! | `isSecure`   | no violations and `riskScore <= reject_threshold`   |
//! | `riskScore`  | sum of severity weights (LOW 1, MEDIUM 3, HIGH 5, CRITICAL 10) |
//! | `violations` | every matched rule instance                         |
//! | `warnings`   | informational (`HIGH_VARIABLE_USAGE`, `UNBALANCED_PLACEHOLDER`) |
//!
//! ## Quick Start
//!
//! ### Validation Only (Stateless)
//!
//! ```rust,ignore
//! use template_guard::Validator;
//!
//! let validator = Validator::builtin().unwrap();
//!
//! let result = validator.validate("Hello {{name}}, welcome to {{platform}}!").unwrap();
//! assert!(result.is_secure);
//!
//! let result = validator
//!     .validate("Hello {{name}}, {{constructor.constructor('return process')()}}")
//!     .unwrap();
//! assert!(!result.is_secure);
//! for v in &result.violations {
//!     println!("{v}");
//! }
//! ```
//!
//! ### Sanitization
//!
//! ```rust,ignore
//! use template_guard::Sanitizer;
//!
//! let sanitizer = Sanitizer::builtin().unwrap();
//! let clean = sanitizer.sanitize("Hi <script>alert(1)</script>{{name}}");
//! assert_eq!(clean, "Hi {{name}}");
//! ```
//!
//! ### Full Pipeline (Monitoring + Audit)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use template_guard::{GuardConfig, TemplateGuard, TracingAuditSink};
//!
//! let guard = TemplateGuard::new(GuardConfig::default())
//!     .unwrap()
//!     .with_audit_sink(Arc::new(TracingAuditSink));
//!
//! let result = guard.check("user-42", "onboarding", "eval(payload)").unwrap();
//! assert!(!result.is_secure);
//!
//! for alert in guard.monitor().get_active_alerts() {
//!     println!("{} {} {}", alert.id, alert.user_id, alert.severity);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Threat categories, severities, rule tables and matchers
//! - [`validator`]: Structural and pattern checks, decoded variants
//! - [`sanitizer`]: Textual removal of script and template-introspection markup
//! - [`monitor`]: Per-user violation windows and alerting
//! - [`audit`]: Audit sinks for recorded security events
//! - [`guard`]: Facade tying the above together
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod audit;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod monitor;
pub mod sanitizer;
pub mod validator;

// Re-exports for convenience
pub use audit::{AuditSink, JsonLinesAuditSink, MemoryAuditSink, TracingAuditSink};
pub use catalog::{Rule, RuleCatalog, Severity, ThreatCategory};
pub use config::{GuardConfig, MonitorConfig, SanitizerConfig, ValidatorConfig};
pub use error::{GuardError, Result};
pub use guard::TemplateGuard;
pub use monitor::{Alert, AlertStatus, SecurityEvent, SecurityMonitor, SecurityStatistics};
pub use sanitizer::Sanitizer;
pub use validator::{ValidationResult, Validator, Violation, Warning, WarningCategory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Validate `text` against the built-in catalog with default limits.
///
/// Builds the catalog on every call; keep a [`Validator`] around for
/// repeated use.
pub fn validate(text: &str) -> Result<ValidationResult> {
    Validator::builtin()?.validate(text)
}
