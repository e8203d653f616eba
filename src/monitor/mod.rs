//! Security violation monitor.
//!
//! The monitor ingests [`SecurityEvent`]s, keeps a sliding
//! [`UserViolationWindow`] per user, and raises an [`Alert`] when a user's
//! window crosses a threshold:
//!
//! | Threshold                | Default |
//! |--------------------------|---------|
//! | CRITICAL events in window| 3       |
//! | events of any severity   | 10      |
//!
//! A threshold crossing within the cooldown of an open alert updates that
//! alert instead of raising a new one.
//!
//! # Alert lifecycle
//!
//! ```text
//!   [Open] ──acknowledge_alert()──> [Acknowledged]
//!     │
//!     └──latest trigger leaves the retention window──> [Expired]
//! ```
//!
//! # Locking
//!
//! Each user's state sits behind its own `Mutex`; the user map is behind an
//! `RwLock` that is only write-locked to insert or remove users. Recording
//! events for different users never contends on the same mutex. Aggregate
//! reads clone the entry handles under a brief read lock, then lock users one
//! at a time.
//!
//! Eviction and expiry are lazy: they happen whenever a user's state is
//! touched. [`SecurityMonitor::sweep`] (or the background task from
//! [`SecurityMonitor::spawn_sweeper`]) also drops users whose window emptied.

mod alert;
mod clock;
mod stats;
mod window;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Severity, ThreatCategory};
use crate::config::MonitorConfig;
use crate::error::{GuardError, Result};
use crate::validator::ValidationResult;

pub use alert::{Alert, AlertReason, AlertStatus, MAX_ALERT_EVENTS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use stats::{rank_users, SecurityStatistics, UserViolationCount};
pub use window::{SecurityEvent, UserViolationWindow};

#[derive(Debug, Default)]
struct UserState {
    window: UserViolationWindow,
    alerts: Vec<Alert>,
}

impl UserState {
    fn is_empty(&self) -> bool {
        self.window.is_empty() && self.alerts.is_empty()
    }
}

/// Outcome of one [`SecurityMonitor::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Events dropped from windows
    pub evicted_events: usize,
    /// Alerts moved to `Expired`
    pub expired_alerts: usize,
    /// Closed alerts dropped from memory
    pub pruned_alerts: usize,
    /// Users removed because nothing about them remained
    pub removed_users: usize,
}

/// Thread-safe violation monitor.
#[derive(Debug)]
pub struct SecurityMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    users: RwLock<HashMap<String, Arc<Mutex<UserState>>>>,
    total_alerts: AtomicU64,
    acknowledged_alerts: AtomicU64,
    expired_alerts: AtomicU64,
    total_events: AtomicU64,
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl SecurityMonitor {
    /// Monitor on the wall clock.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Monitor on a custom clock.
    pub fn with_clock(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            users: RwLock::new(HashMap::new()),
            total_alerts: AtomicU64::new(0),
            acknowledged_alerts: AtomicU64::new(0),
            expired_alerts: AtomicU64::new(0),
            total_events: AtomicU64::new(0),
        }
    }

    /// Active thresholds.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Current time according to the monitor's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record one violation, stamped now.
    pub fn record_security_violation(
        &self,
        user_id: &str,
        template_id: &str,
        category: ThreatCategory,
        severity: Severity,
    ) {
        self.record_security_violation_at(user_id, template_id, category, severity, self.now());
    }

    /// Record one violation with an explicit timestamp. Returns the alert
    /// raised or updated by this event, if any.
    pub fn record_security_violation_at(
        &self,
        user_id: &str,
        template_id: &str,
        category: ThreatCategory,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Option<Alert> {
        self.record_event(SecurityEvent {
            user_id: user_id.to_string(),
            template_id: template_id.to_string(),
            category,
            severity,
            timestamp,
        })
    }

    /// Record every violation of a validation result.
    /// Returns the distinct alerts raised or updated, in their latest state.
    pub fn record_result(
        &self,
        user_id: &str,
        template_id: &str,
        result: &ValidationResult,
    ) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = Vec::new();
        for event in result.to_events(user_id, template_id, self.now()) {
            if let Some(alert) = self.record_event(event) {
                match alerts.iter_mut().find(|a| a.id == alert.id) {
                    Some(existing) => *existing = alert,
                    None => alerts.push(alert),
                }
            }
        }
        alerts
    }

    /// Record an event. Returns the alert raised or updated, if any.
    pub fn record_event(&self, event: SecurityEvent) -> Option<Alert> {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let entry = self.entry(&event.user_id);
        let mut state = lock(&entry);
        let cutoff = self.cutoff();
        self.refresh(&mut state, cutoff);

        let dropped = state
            .window
            .push(event.clone(), self.config.max_events_per_user);
        if dropped > 0 {
            tracing::debug!(user_id = %event.user_id, dropped, "window at capacity");
        }
        if event.timestamp < cutoff {
            state.window.evict_before(cutoff);
            return None;
        }

        self.evaluate(&mut state, event)
    }

    fn evaluate(&self, state: &mut UserState, event: SecurityEvent) -> Option<Alert> {
        let critical = state.window.count_severity(Severity::Critical);
        let total = state.window.len();
        let reason = if critical >= self.config.alert_critical_count {
            AlertReason::CriticalCount
        } else if total >= self.config.alert_total_count {
            AlertReason::TotalCount
        } else {
            return None;
        };

        let cooldown = self.config.alert_cooldown();
        if let Some(alert) = state
            .alerts
            .iter_mut()
            .rev()
            .find(|a| a.is_open() && event.timestamp - a.triggered_at <= cooldown)
        {
            alert.retrigger(event);
            tracing::warn!(
                alert_id = %alert.id,
                user_id = %alert.user_id,
                severity = %alert.severity,
                trigger_count = alert.trigger_count,
                "security alert re-triggered"
            );
            return Some(alert.clone());
        }

        let alert = Alert::new(event, reason);
        self.total_alerts.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            category = %alert.category,
            severity = %alert.severity,
            reason = ?reason,
            critical_events = critical,
            window_events = total,
            "security alert raised"
        );
        state.alerts.push(alert.clone());
        Some(alert)
    }

    /// Evict aged events and expire open alerts whose latest trigger aged out.
    fn refresh(&self, state: &mut UserState, cutoff: DateTime<Utc>) -> (usize, usize) {
        let evicted = state.window.evict_before(cutoff);
        let mut expired = 0;
        for alert in state.alerts.iter_mut().filter(|a| a.is_open()) {
            if alert.triggered_at < cutoff {
                alert.status = AlertStatus::Expired;
                expired += 1;
                tracing::info!(alert_id = %alert.id, user_id = %alert.user_id, "security alert expired");
            }
        }
        if expired > 0 {
            self.expired_alerts
                .fetch_add(expired as u64, Ordering::Relaxed);
        }
        (evicted, expired)
    }

    /// Open alerts across all users, newest first.
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        let cutoff = self.cutoff();
        let mut alerts: Vec<Alert> = Vec::new();
        for entry in self.entries() {
            let mut state = lock(&entry);
            self.refresh(&mut state, cutoff);
            alerts.extend(state.alerts.iter().filter(|a| a.is_open()).cloned());
        }
        sort_newest_first(&mut alerts);
        alerts
    }

    /// Every retained alert for `user_id`, newest first.
    pub fn alerts_for_user(&self, user_id: &str) -> Vec<Alert> {
        let Some(entry) = self.existing_entry(user_id) else {
            return Vec::new();
        };
        let mut state = lock(&entry);
        self.refresh(&mut state, self.cutoff());
        let mut alerts = state.alerts.clone();
        sort_newest_first(&mut alerts);
        alerts
    }

    /// Look up an alert by id.
    pub fn get_alert(&self, alert_id: &str) -> Option<Alert> {
        let cutoff = self.cutoff();
        self.entries().into_iter().find_map(|entry| {
            let mut state = lock(&entry);
            self.refresh(&mut state, cutoff);
            state.alerts.iter().find(|a| a.id == alert_id).cloned()
        })
    }

    /// Move an open alert to `Acknowledged`.
    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<Alert> {
        let cutoff = self.cutoff();
        for entry in self.entries() {
            let mut state = lock(&entry);
            self.refresh(&mut state, cutoff);
            let Some(alert) = state.alerts.iter_mut().find(|a| a.id == alert_id) else {
                continue;
            };
            if !alert.is_open() {
                return Err(GuardError::AlertNotOpen {
                    id: alert_id.to_string(),
                    status: alert.status.to_string(),
                });
            }
            alert.status = AlertStatus::Acknowledged;
            self.acknowledged_alerts.fetch_add(1, Ordering::Relaxed);
            tracing::info!(alert_id = %alert.id, user_id = %alert.user_id, "security alert acknowledged");
            return Ok(alert.clone());
        }
        Err(GuardError::AlertNotFound(alert_id.to_string()))
    }

    /// Snapshot of a user's window after eviction.
    pub fn user_window(&self, user_id: &str) -> Option<UserViolationWindow> {
        let entry = self.existing_entry(user_id)?;
        let mut state = lock(&entry);
        self.refresh(&mut state, self.cutoff());
        Some(state.window.clone())
    }

    /// Aggregate statistics across all tracked users.
    pub fn get_security_statistics(&self) -> SecurityStatistics {
        let cutoff = self.cutoff();
        let mut stats = SecurityStatistics::default();
        let mut users = Vec::new();

        for (user_id, entry) in self.named_entries() {
            let mut state = lock(&entry);
            self.refresh(&mut state, cutoff);

            stats.active_alerts += state.alerts.iter().filter(|a| a.is_open()).count();
            for (category, count) in state.window.by_category() {
                *stats.events_by_category.entry(*category).or_default() += count;
            }
            for (severity, count) in state.window.by_severity() {
                *stats.events_by_severity.entry(*severity).or_default() += count;
            }
            if let Some(last_event_at) = state.window.last_event_at() {
                users.push(UserViolationCount {
                    user_id,
                    count: state.window.len(),
                    last_event_at,
                });
            }
        }

        stats.tracked_users = users.len();
        rank_users(&mut users);
        users.truncate(self.config.top_users_limit);
        stats.top_violating_users = users;
        stats.total_alerts = self.total_alerts.load(Ordering::Relaxed);
        stats.acknowledged_alerts = self.acknowledged_alerts.load(Ordering::Relaxed);
        stats.expired_alerts = self.expired_alerts.load(Ordering::Relaxed);
        stats.total_events = self.total_events.load(Ordering::Relaxed);
        stats
    }

    /// Evict, expire, drop closed alerts older than the retention window and
    /// remove users with nothing left.
    pub fn sweep(&self) -> SweepReport {
        let cutoff = self.cutoff();
        let mut report = SweepReport::default();
        let mut empty = Vec::new();

        for (user_id, entry) in self.named_entries() {
            let mut state = lock(&entry);
            let (evicted, expired) = self.refresh(&mut state, cutoff);
            report.evicted_events += evicted;
            report.expired_alerts += expired;

            let before = state.alerts.len();
            state
                .alerts
                .retain(|a| a.is_open() || a.triggered_at >= cutoff);
            report.pruned_alerts += before - state.alerts.len();

            if state.is_empty() {
                empty.push(user_id);
            }
        }

        if !empty.is_empty() {
            let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
            for user_id in empty {
                // Skip users picked up by a concurrent recorder since the scan.
                let removable = users
                    .get(&user_id)
                    .is_some_and(|e| Arc::strong_count(e) == 1 && lock(e).is_empty());
                if removable {
                    users.remove(&user_id);
                    report.removed_users += 1;
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                evicted_events = report.evicted_events,
                expired_alerts = report.expired_alerts,
                pruned_alerts = report.pruned_alerts,
                removed_users = report.removed_users,
                "monitor sweep"
            );
        }
        report
    }

    /// Run [`sweep`](Self::sweep) every `period` on the current tokio runtime.
    /// The task ends once the monitor is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.sweep();
            }
        })
    }

    /// Users currently held in memory.
    pub fn tracked_user_count(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn cutoff(&self) -> DateTime<Utc> {
        self.now()
            .checked_sub_signed(self.config.retention_window())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn entry(&self, user_id: &str) -> Arc<Mutex<UserState>> {
        if let Some(entry) = self.existing_entry(user_id) {
            return entry;
        }
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(users.entry(user_id.to_string()).or_default())
    }

    fn existing_entry(&self, user_id: &str) -> Option<Arc<Mutex<UserState>>> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn entries(&self) -> Vec<Arc<Mutex<UserState>>> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn named_entries(&self) -> Vec<(String, Arc<Mutex<UserState>>)> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}

fn lock(entry: &Mutex<UserState>) -> MutexGuard<'_, UserState> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sort_newest_first(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        b.triggered_at
            .cmp(&a.triggered_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
