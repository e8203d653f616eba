//! Per-user sliding window of security events.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Severity, ThreatCategory};

/// One violation attributed to a user and template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    /// Reporting user
    pub user_id: String,
    /// Template the violation was found in
    pub template_id: String,
    /// Threat category
    pub category: ThreatCategory,
    /// Severity
    pub severity: Severity,
    /// When the violation happened
    pub timestamp: DateTime<Utc>,
}

/// Time-ordered event buffer with counters derived from its contents.
///
/// Counters are only touched by [`push`](Self::push) and the eviction
/// methods, in the same step as the buffer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserViolationWindow {
    events: VecDeque<SecurityEvent>,
    by_category: BTreeMap<ThreatCategory, usize>,
    by_severity: BTreeMap<Severity, usize>,
}

impl UserViolationWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `event` in timestamp order, then drop the oldest events until
    /// at most `max_events` remain. Returns the number dropped.
    pub fn push(&mut self, event: SecurityEvent, max_events: usize) -> usize {
        *self.by_category.entry(event.category).or_default() += 1;
        *self.by_severity.entry(event.severity).or_default() += 1;

        let pos = self
            .events
            .partition_point(|e| e.timestamp <= event.timestamp);
        self.events.insert(pos, event);

        let mut dropped = 0;
        while self.events.len() > max_events.max(1) {
            self.pop_oldest();
            dropped += 1;
        }
        dropped
    }

    /// Drop events older than `cutoff`. Returns the number dropped.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut dropped = 0;
        while self.events.front().is_some_and(|e| e.timestamp < cutoff) {
            self.pop_oldest();
            dropped += 1;
        }
        dropped
    }

    fn pop_oldest(&mut self) {
        let Some(event) = self.events.pop_front() else {
            return;
        };
        decrement(&mut self.by_category, event.category);
        decrement(&mut self.by_severity, event.severity);
    }

    /// Events in the window.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the window holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.events.iter()
    }

    /// Events in `category`.
    pub fn count_category(&self, category: ThreatCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    /// Events at `severity`.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Per-category counters.
    pub fn by_category(&self) -> &BTreeMap<ThreatCategory, usize> {
        &self.by_category
    }

    /// Per-severity counters.
    pub fn by_severity(&self) -> &BTreeMap<Severity, usize> {
        &self.by_severity
    }

    /// Timestamp of the newest event.
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.events.back().map(|e| e.timestamp)
    }

    /// Recount from the buffer and compare with the maintained counters.
    pub fn counters_consistent(&self) -> bool {
        let mut categories: BTreeMap<ThreatCategory, usize> = BTreeMap::new();
        let mut severities: BTreeMap<Severity, usize> = BTreeMap::new();
        for e in &self.events {
            *categories.entry(e.category).or_default() += 1;
            *severities.entry(e.severity).or_default() += 1;
        }
        categories == self.by_category && severities == self.by_severity
    }
}

fn decrement<K: Ord>(map: &mut BTreeMap<K, usize>, key: K) {
    if let Some(count) = map.get_mut(&key) {
        *count -= 1;
        if *count == 0 {
            map.remove(&key);
        }
    }
}
