//! Aggregate monitor statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Severity, ThreatCategory};

/// Event count for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserViolationCount {
    /// User id
    pub user_id: String,
    /// Events currently in the user's window
    pub count: usize,
    /// Newest event in the window
    pub last_event_at: DateTime<Utc>,
}

/// Snapshot across every tracked user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatistics {
    /// Alerts ever raised
    pub total_alerts: u64,
    /// Alerts currently open
    pub active_alerts: usize,
    /// Alerts acknowledged
    pub acknowledged_alerts: u64,
    /// Alerts expired
    pub expired_alerts: u64,
    /// Events ever recorded
    pub total_events: u64,
    /// Users with at least one event in their window
    pub tracked_users: usize,
    /// In-window events by category
    pub events_by_category: BTreeMap<ThreatCategory, usize>,
    /// In-window events by severity
    pub events_by_severity: BTreeMap<Severity, usize>,
    /// Users by in-window event count, highest first
    pub top_violating_users: Vec<UserViolationCount>,
}

/// Sort by count descending, ties by most recent event first, then by id so
/// the order is total.
pub fn rank_users(users: &mut [UserViolationCount]) {
    users.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.last_event_at.cmp(&a.last_event_at))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_rank_users() {
        let now = Utc::now();
        let mut users = vec![
            UserViolationCount {
                user_id: "a".into(),
                count: 2,
                last_event_at: now - Duration::seconds(10),
            },
            UserViolationCount {
                user_id: "b".into(),
                count: 5,
                last_event_at: now - Duration::seconds(60),
            },
            UserViolationCount {
                user_id: "c".into(),
                count: 2,
                last_event_at: now,
            },
        ];
        rank_users(&mut users);
        let order: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
