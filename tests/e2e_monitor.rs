//! End-to-end monitoring tests.
//!
//! These tests drive the monitor through the guard facade and directly,
//! covering alert lifecycle, statistics, concurrency and background sweeps.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use template_guard::monitor::{AlertReason, Clock, ManualClock};
use template_guard::{
    AlertStatus, AuditSink, GuardConfig, GuardError, JsonLinesAuditSink, MemoryAuditSink,
    MonitorConfig, SecurityEvent, SecurityMonitor, Severity, TemplateGuard, ThreatCategory,
};

fn manual_monitor(config: MonitorConfig) -> (Arc<SecurityMonitor>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let monitor = Arc::new(SecurityMonitor::with_clock(config, clock.clone()));
    (monitor, clock)
}

/// Three CRITICAL events for one user raise exactly one alert
#[test]
fn test_critical_burst_single_alert() {
    let (monitor, _) = manual_monitor(MonitorConfig::default());

    for _ in 0..3 {
        monitor.record_security_violation(
            "user-1",
            "tpl-1",
            ThreatCategory::CodeInjection,
            Severity::Critical,
        );
    }

    let alerts = monitor.get_active_alerts();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.user_id, "user-1");
    assert_eq!(alert.template_id, "tpl-1");
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.reason, AlertReason::CriticalCount);
    assert_eq!(alert.status, AlertStatus::Open);
    assert_eq!(monitor.get_security_statistics().total_alerts, 1);
}

/// Ten events across five users rank every user
#[test]
fn test_top_violators_ranked() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());
    let plan = [("u1", 1), ("u2", 4), ("u3", 2), ("u4", 1), ("u5", 2)];

    for (user, count) in plan {
        for _ in 0..count {
            monitor.record_security_violation(user, "t", ThreatCategory::Xss, Severity::Low);
            clock.advance(Duration::seconds(1));
        }
    }

    let stats = monitor.get_security_statistics();
    assert_eq!(stats.total_events, 10);
    assert_eq!(stats.tracked_users, 5);

    let ranked: Vec<(&str, usize)> = stats
        .top_violating_users
        .iter()
        .map(|u| (u.user_id.as_str(), u.count))
        .collect();
    // Ties go to the most recent offender.
    assert_eq!(
        ranked,
        vec![("u2", 4), ("u5", 2), ("u3", 2), ("u4", 1), ("u1", 1)]
    );
    assert!(stats
        .top_violating_users
        .windows(2)
        .all(|w| w[0].count >= w[1].count));
}

#[test]
fn test_top_violators_truncated() {
    let config = MonitorConfig {
        top_users_limit: 2,
        ..MonitorConfig::default()
    };
    let (monitor, _) = manual_monitor(config);
    for i in 0..6 {
        monitor.record_security_violation(&format!("u{i}"), "t", ThreatCategory::Xss, Severity::Low);
    }

    let stats = monitor.get_security_statistics();
    assert_eq!(stats.tracked_users, 6);
    assert_eq!(stats.top_violating_users.len(), 2);
}

#[test]
fn test_alert_lifecycle() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());

    for _ in 0..3 {
        monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Critical);
    }
    let acked_id = monitor.get_active_alerts()[0].id.clone();
    monitor.acknowledge_alert(&acked_id).unwrap();

    clock.advance(Duration::minutes(10));
    for _ in 0..3 {
        monitor.record_security_violation("b", "t", ThreatCategory::Xss, Severity::Critical);
    }
    let open_id = monitor.get_active_alerts()[0].id.clone();
    assert_ne!(open_id, acked_id);

    // Ack'd alert stays acknowledged; open one expires once the window passes.
    clock.advance(Duration::hours(1) + Duration::seconds(1));
    assert!(monitor.get_active_alerts().is_empty());
    assert_eq!(
        monitor.get_alert(&open_id).unwrap().status,
        AlertStatus::Expired
    );
    assert_eq!(
        monitor.get_alert(&acked_id).unwrap().status,
        AlertStatus::Acknowledged
    );

    let err = monitor.acknowledge_alert(&open_id).unwrap_err();
    assert!(matches!(err, GuardError::AlertNotOpen { .. }));

    let stats = monitor.get_security_statistics();
    assert_eq!(stats.total_alerts, 2);
    assert_eq!(stats.acknowledged_alerts, 1);
    assert_eq!(stats.expired_alerts, 1);
    assert_eq!(stats.active_alerts, 0);
}

#[test]
fn test_sweep_prunes_closed_alerts() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());
    for _ in 0..3 {
        monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Critical);
    }

    clock.advance(Duration::hours(2));
    let report = monitor.sweep();
    assert_eq!(report.evicted_events, 3);
    assert_eq!(report.expired_alerts, 1);
    assert_eq!(report.pruned_alerts, 1);
    assert_eq!(report.removed_users, 1);
    assert!(monitor.alerts_for_user("a").is_empty());
}

#[test]
fn test_window_slides() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());
    monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Critical);
    monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Critical);

    clock.advance(Duration::minutes(61));
    monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Critical);

    // First two aged out, so no CRITICAL burst.
    assert!(monitor.get_active_alerts().is_empty());
    let window = monitor.user_window("a").unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window.count_severity(Severity::Critical), 1);
}

#[test]
fn test_out_of_order_events() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());
    let now = clock.now();
    for offset in [30, 10, 20] {
        monitor.record_event(SecurityEvent {
            user_id: "a".to_string(),
            template_id: "t".to_string(),
            category: ThreatCategory::SqlInjection,
            severity: Severity::High,
            timestamp: now - Duration::seconds(offset),
        });
    }

    let window = monitor.user_window("a").unwrap();
    let stamps: Vec<_> = window.events().map(|e| e.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(window.last_event_at(), Some(now - Duration::seconds(10)));
}

/// Many threads recording at once never lose events or double-raise alerts
#[test]
fn test_concurrent_recording() {
    let monitor = Arc::new(SecurityMonitor::with_clock(
        MonitorConfig::default(),
        Arc::new(ManualClock::default()),
    ));
    let threads = 8;
    let per_thread = 50;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                let own = format!("user-{i}");
                for _ in 0..per_thread {
                    monitor.record_security_violation(&own, "t", ThreatCategory::Xss, Severity::Low);
                    monitor.record_security_violation(
                        "shared",
                        "t",
                        ThreatCategory::PathTraversal,
                        Severity::Medium,
                    );
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = monitor.get_security_statistics();
    assert_eq!(stats.total_events, (threads * per_thread * 2) as u64);
    assert_eq!(stats.tracked_users, threads + 1);
    // One alert per user; every later crossing falls inside the cooldown.
    assert_eq!(stats.total_alerts, (threads + 1) as u64);
    assert_eq!(monitor.get_active_alerts().len(), threads + 1);

    let shared = monitor.user_window("shared").unwrap();
    assert_eq!(shared.len(), threads * per_thread);
    assert!(shared.counters_consistent());
}

#[test]
fn test_guard_feeds_monitor_and_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let memory = Arc::new(MemoryAuditSink::new());
    let file = Arc::new(JsonLinesAuditSink::append_to(&path).unwrap());

    let guard = TemplateGuard::new(GuardConfig::default())
        .unwrap()
        .with_audit_sink(memory.clone())
        .with_audit_sink(file.clone());

    let clean = guard.check("alice", "welcome", "Hi {{name}}").unwrap();
    assert!(clean.is_secure);

    let mut violations = 0;
    for _ in 0..3 {
        let result = guard
            .check("mallory", "profile", "<script>eval(document.cookie)</script>")
            .unwrap();
        violations += result.violations.len();
    }
    file.flush().unwrap();

    assert_eq!(memory.len(), violations);
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), violations);
    for line in content.lines() {
        let event: SecurityEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.user_id, "mallory");
    }

    let alerts = guard.monitor().alerts_for_user("mallory");
    assert_eq!(alerts.len(), 1);
    assert!(guard.monitor().alerts_for_user("alice").is_empty());
}

#[test]
fn test_record_result_returns_alerts() {
    let (monitor, _) = manual_monitor(MonitorConfig::default());
    let validator = template_guard::Validator::builtin().unwrap();
    let result = validator
        .validate("<script>x</script> <script>y</script> javascript:z")
        .unwrap();
    assert!(result.violations.len() >= 3);

    let alerts = monitor.record_result("u", "t", &result);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
}

#[tokio::test]
async fn test_background_sweeper() {
    let (monitor, clock) = manual_monitor(MonitorConfig::default());
    monitor.record_security_violation("a", "t", ThreatCategory::Xss, Severity::Low);
    assert_eq!(monitor.tracked_user_count(), 1);

    let handle = monitor.spawn_sweeper(std::time::Duration::from_millis(10));
    clock.advance(Duration::hours(2));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(monitor.tracked_user_count(), 0);

    drop(monitor);
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}

#[test]
fn test_sweeper_on_runtime_block_on() {
    let (monitor, _) = manual_monitor(MonitorConfig::default());
    tokio_test::block_on(async {
        let handle = monitor.spawn_sweeper(std::time::Duration::from_millis(5));
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    });
}
