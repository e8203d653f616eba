//! Alerts raised by the monitor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::SecurityEvent;
use crate::catalog::{Severity, ThreatCategory};

/// Triggering events kept per alert.
pub const MAX_ALERT_EVENTS: usize = 100;

/// Alert lifecycle. `Acknowledged` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    /// Raised and not yet handled
    Open,
    /// Handled by an operator
    Acknowledged,
    /// Triggering events aged out without a re-trigger
    Expired,
}

impl AlertStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReason {
    /// Too many CRITICAL events in the window
    CriticalCount,
    /// Too many events of any severity in the window
    TotalCount,
}

/// Operational alert for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique id
    pub id: String,
    /// User the alert is about
    pub user_id: String,
    /// Template of the event that raised the alert
    pub template_id: String,
    /// Category of the event that raised the alert
    pub category: ThreatCategory,
    /// Highest severity among the triggering events
    pub severity: Severity,
    /// Timestamp of the latest triggering event
    pub triggered_at: DateTime<Utc>,
    /// Timestamp of the first triggering event
    pub created_at: DateTime<Utc>,
    /// Threshold that raised the alert
    pub reason: AlertReason,
    /// Lifecycle state
    pub status: AlertStatus,
    /// Times the alert has been triggered, including creation
    pub trigger_count: u32,
    /// Triggering events, oldest first; never empty
    pub events: Vec<SecurityEvent>,
}

impl Alert {
    pub(crate) fn new(event: SecurityEvent, reason: AlertReason) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: event.user_id.clone(),
            template_id: event.template_id.clone(),
            category: event.category,
            severity: event.severity,
            triggered_at: event.timestamp,
            created_at: event.timestamp,
            reason,
            status: AlertStatus::Open,
            trigger_count: 1,
            events: vec![event],
        }
    }

    /// Fold a re-trigger into this alert.
    pub(crate) fn retrigger(&mut self, event: SecurityEvent) {
        self.severity = self.severity.max(event.severity);
        self.triggered_at = self.triggered_at.max(event.timestamp);
        self.trigger_count = self.trigger_count.saturating_add(1);
        self.events.push(event);
        if self.events.len() > MAX_ALERT_EVENTS {
            let excess = self.events.len() - MAX_ALERT_EVENTS;
            self.events.drain(..excess);
        }
    }

    /// True while the alert is open.
    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }

    /// True once acknowledged.
    pub fn acknowledged(&self) -> bool {
        self.status == AlertStatus::Acknowledged
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn event(severity: Severity, at: DateTime<Utc>) -> SecurityEvent {
        SecurityEvent {
            user_id: "mallory".to_string(),
            template_id: "tpl".to_string(),
            category: ThreatCategory::CodeInjection,
            severity,
            timestamp: at,
        }
    }

    #[test]
    fn test_new_alert_is_open() {
        let now = Utc::now();
        let alert = Alert::new(event(Severity::High, now), AlertReason::TotalCount);
        assert!(alert.is_open());
        assert!(!alert.acknowledged());
        assert_eq!(alert.events.len(), 1);
        assert_eq!(alert.triggered_at, now);
        assert!(!alert.id.is_empty());
    }

    #[test]
    fn test_retrigger_escalates() {
        let now = Utc::now();
        let mut alert = Alert::new(event(Severity::Medium, now), AlertReason::TotalCount);
        alert.retrigger(event(Severity::Critical, now + Duration::seconds(5)));
        alert.retrigger(event(Severity::Low, now + Duration::seconds(10)));
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.triggered_at, now + Duration::seconds(10));
        assert_eq!(alert.created_at, now);
        assert_eq!(alert.trigger_count, 3);
    }

    #[test]
    fn test_alert_event_cap() {
        let now = Utc::now();
        let mut alert = Alert::new(event(Severity::Low, now), AlertReason::TotalCount);
        for i in 0..150 {
            alert.retrigger(event(Severity::Low, now + Duration::seconds(i)));
        }
        assert_eq!(alert.events.len(), MAX_ALERT_EVENTS);
        assert_eq!(alert.trigger_count, 151);
    }
}
