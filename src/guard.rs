//! Facade wiring the validator, sanitizer, monitor and audit sinks.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use template_guard::{GuardConfig, TemplateGuard, TracingAuditSink};
//!
//! let guard = TemplateGuard::new(GuardConfig::default())?
//!     .with_audit_sink(Arc::new(TracingAuditSink));
//!
//! let result = guard.check("alice", "welcome-email", "Hello {{name}}")?;
//! if !result.is_secure {
//!     // reject, or store guard.sanitize(text) instead
//! }
//! ```

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::catalog::RuleCatalog;
use crate::config::GuardConfig;
use crate::error::Result;
use crate::monitor::{SecurityEvent, SecurityMonitor};
use crate::sanitizer::Sanitizer;
use crate::validator::{ValidationResult, Validator};

/// Validation entry point for callers that also want monitoring and audit.
pub struct TemplateGuard {
    config: GuardConfig,
    validator: Validator,
    sanitizer: Sanitizer,
    monitor: Arc<SecurityMonitor>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for TemplateGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateGuard")
            .field("config", &self.config)
            .field("rules", &self.validator.catalog().len())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl TemplateGuard {
    /// Guard over the built-in catalog.
    pub fn new(config: GuardConfig) -> Result<Self> {
        Self::with_catalog(config, Arc::new(RuleCatalog::builtin()?))
    }

    /// Guard over a custom catalog.
    pub fn with_catalog(config: GuardConfig, catalog: Arc<RuleCatalog>) -> Result<Self> {
        config.validate()?;
        let validator = Validator::new(Arc::clone(&catalog), config.validator.clone());
        let sanitizer = Sanitizer::with_catalog(catalog, config.sanitizer.clone());
        let monitor = Arc::new(SecurityMonitor::new(config.monitor.clone()));
        Ok(Self {
            config,
            validator,
            sanitizer,
            monitor,
            sinks: Vec::new(),
        })
    }

    /// Share an existing monitor.
    pub fn with_monitor(mut self, monitor: Arc<SecurityMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Add an audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The rule catalog.
    pub fn catalog(&self) -> &Arc<RuleCatalog> {
        self.validator.catalog()
    }

    /// The validator.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// The sanitizer.
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// The monitor.
    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    /// Validate without recording anything.
    pub fn validate(&self, text: &str) -> Result<ValidationResult> {
        self.validator.validate(text)
    }

    /// Sanitize `text`.
    pub fn sanitize(&self, text: &str) -> String {
        self.sanitizer.sanitize(text)
    }

    /// Validate `text` on behalf of `user_id`. An insecure verdict emits one
    /// event per violation to every audit sink and to the monitor.
    pub fn check(&self, user_id: &str, template_id: &str, text: &str) -> Result<ValidationResult> {
        let result = self.validator.validate(text)?;
        self.record(user_id, template_id, &result);
        Ok(result)
    }

    /// [`check`](Self::check) for raw bytes.
    pub fn check_bytes(
        &self,
        user_id: &str,
        template_id: &str,
        bytes: &[u8],
    ) -> Result<ValidationResult> {
        let result = self.validator.validate_bytes(bytes)?;
        self.record(user_id, template_id, &result);
        Ok(result)
    }

    fn record(&self, user_id: &str, template_id: &str, result: &ValidationResult) {
        if result.is_secure {
            return;
        }
        for event in result.to_events(user_id, template_id, self.monitor.now()) {
            self.audit(&event);
            self.monitor.record_event(event);
        }
    }

    fn audit(&self, event: &SecurityEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                tracing::error!(error = %e, user_id = %event.user_id, "audit sink failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::catalog::ThreatCategory;

    #[test]
    fn test_check_secure_records_nothing() {
        let sink = Arc::new(MemoryAuditSink::new());
        let guard = TemplateGuard::new(GuardConfig::default())
            .unwrap()
            .with_audit_sink(sink.clone());
        let result = guard.check("alice", "t1", "Hello {{name}}").unwrap();
        assert!(result.is_secure);
        assert!(sink.is_empty());
        assert_eq!(guard.monitor().get_security_statistics().total_events, 0);
    }

    #[test]
    fn test_check_insecure_records_every_violation() {
        let sink = Arc::new(MemoryAuditSink::new());
        let guard = TemplateGuard::new(GuardConfig::default())
            .unwrap()
            .with_audit_sink(sink.clone());
        let result = guard
            .check("mallory", "t2", "<script>eval(document.cookie)</script>")
            .unwrap();
        assert!(!result.is_secure);
        assert_eq!(sink.len(), result.violations.len());
        assert!(sink
            .events()
            .iter()
            .any(|e| e.category == ThreatCategory::Xss && e.user_id == "mallory"));

        let stats = guard.monitor().get_security_statistics();
        assert_eq!(stats.total_events as usize, result.violations.len());
        assert_eq!(stats.top_violating_users[0].user_id, "mallory");
    }

    #[test]
    fn test_shared_monitor() {
        let monitor = Arc::new(SecurityMonitor::default());
        let a = TemplateGuard::new(GuardConfig::default())
            .unwrap()
            .with_monitor(Arc::clone(&monitor));
        let b = TemplateGuard::new(GuardConfig::default())
            .unwrap()
            .with_monitor(Arc::clone(&monitor));
        a.check("u", "t", "eval(x)").unwrap();
        b.check("u", "t", "eval(y)").unwrap();
        assert_eq!(monitor.user_window("u").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GuardConfig::default();
        config.validator.max_nesting_depth = 0;
        assert!(TemplateGuard::new(config).is_err());
    }
}
