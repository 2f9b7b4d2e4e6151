//! Alert storage and the throttle gate.
//!
//! [`AlertStore`] is the single source of truth for alert state: active
//! alerts, acknowledged alerts, and a bounded history of resolved ones.
//! The throttle gate keeps O(1) per-rule window counters so repeated rule
//! firings are suppressed without scanning history.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::types::{Alert, AlertStatus, EscalationCursor, ThrottlePolicy};

/// Maximum number of alerts to keep in memory.
/// Prevents unbounded growth from accumulating historical alerts.
const MAX_ALERTS: usize = 1000;

/// Per-rule throttle window state.
#[derive(Debug, Clone, Copy)]
struct ThrottleWindow {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Outcome of consulting the throttle gate for a rule firing.
#[derive(Debug, Clone)]
pub enum ThrottleDecision {
    /// The rule may produce a new alert.
    Allow,
    /// The rule hit its quota; the most recent alert for it is returned
    /// unchanged and no new alert is created.
    Suppress(Box<Alert>),
}

/// Manages alert state and rule throttling.
#[derive(Clone, Default)]
pub struct AlertStore {
    alerts: Arc<RwLock<Vec<Alert>>>,
    throttle: Arc<DashMap<String, ThrottleWindow>>,
}

impl AlertStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { alerts: Arc::new(RwLock::new(Vec::new())), throttle: Arc::new(DashMap::new()) }
    }

    // ========== Throttle gate ==========

    /// Consults the throttle gate for a firing of `rule_id`.
    ///
    /// When the rule already produced `max_alerts` alerts inside the current
    /// `period_minutes` window, returns [`ThrottleDecision::Suppress`] with
    /// the most recent alert for the rule. Suppression has no side effect on
    /// the store. When allowed, the window counter is advanced; the caller
    /// is expected to insert the new alert.
    #[must_use]
    pub fn check_throttle(&self, rule_id: &str, policy: ThrottlePolicy) -> ThrottleDecision {
        let now = Utc::now();
        let period = Duration::minutes(i64::from(policy.period_minutes));

        let exhausted = {
            let mut window = self
                .throttle
                .entry(rule_id.to_string())
                .or_insert(ThrottleWindow { window_start: now, count: 0 });

            if now.signed_duration_since(window.window_start) >= period {
                window.window_start = now;
                window.count = 0;
            }

            if window.count >= policy.max_alerts {
                true
            } else {
                window.count += 1;
                false
            }
        };

        if exhausted {
            debug!(rule_id = %rule_id, "Throttle window exhausted, suppressing");
            if let Some(latest) = self.latest_for_rule(rule_id) {
                return ThrottleDecision::Suppress(Box::new(latest));
            }
            // Counter says suppress but the prior alert was evicted from
            // memory; fall through and let the firing produce a fresh one.
        }

        ThrottleDecision::Allow
    }

    // ========== Alert lifecycle ==========

    /// Inserts a new alert.
    ///
    /// Enforces a maximum capacity of [`MAX_ALERTS`]: at 90% capacity all
    /// resolved alerts are evicted first; if still full, the oldest alerts
    /// are dropped FIFO so active and recent alerts are preserved.
    pub fn insert(&self, alert: Alert) {
        let mut alerts = self.alerts.write();

        if alerts.len() >= MAX_ALERTS * 9 / 10 {
            alerts.retain(|a| !matches!(a.status, AlertStatus::Resolved));
        }
        while alerts.len() >= MAX_ALERTS {
            alerts.remove(0);
        }

        alerts.push(alert);
    }

    /// Acknowledges an alert by ID.
    ///
    /// Returns the updated alert, or `None` if no alert with the ID exists.
    pub fn acknowledge(&self, alert_id: &str, by: &str) -> Option<Alert> {
        let mut alerts = self.alerts.write();
        let alert = alerts.iter_mut().find(|a| a.id == alert_id)?;
        alert.acknowledge(by);
        Some(alert.clone())
    }

    /// Resolves an alert by ID.
    ///
    /// Returns the updated alert, or `None` if no alert with the ID exists.
    pub fn resolve(&self, alert_id: &str, by: &str) -> Option<Alert> {
        let mut alerts = self.alerts.write();
        let alert = alerts.iter_mut().find(|a| a.id == alert_id)?;
        alert.resolve(by);
        Some(alert.clone())
    }

    /// Records the escalation cursor for an alert.
    ///
    /// The cursor only moves forward; a stale update (lower level) is
    /// ignored unless the cursor is being re-armed by a policy restart.
    pub fn set_escalation_cursor(&self, alert_id: &str, cursor: EscalationCursor) -> bool {
        let mut alerts = self.alerts.write();
        if let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.escalation = Some(cursor);
            true
        } else {
            false
        }
    }

    /// Links an alert to an incident.
    pub fn link_incident(&self, alert_id: &str, incident_id: &str) -> bool {
        let mut alerts = self.alerts.write();
        if let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.incident_id = Some(incident_id.to_string());
            true
        } else {
            false
        }
    }

    // ========== Queries ==========

    /// Gets a specific alert by ID.
    #[must_use]
    pub fn get(&self, alert_id: &str) -> Option<Alert> {
        self.alerts.read().iter().find(|a| a.id == alert_id).cloned()
    }

    /// Current status of an alert, used for fire-time rechecks.
    #[must_use]
    pub fn status(&self, alert_id: &str) -> Option<AlertStatus> {
        self.alerts.read().iter().find(|a| a.id == alert_id).map(|a| a.status)
    }

    /// All alerts, newest last.
    #[must_use]
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Alerts filtered by status.
    #[must_use]
    pub fn by_status(&self, status: AlertStatus) -> Vec<Alert> {
        self.alerts.read().iter().filter(|a| a.status == status).cloned().collect()
    }

    /// Most recent alert produced by a rule.
    #[must_use]
    pub fn latest_for_rule(&self, rule_id: &str) -> Option<Alert> {
        self.alerts.read().iter().rev().find(|a| a.rule_id == rule_id).cloned()
    }

    /// Count of alerts produced by a rule.
    #[must_use]
    pub fn count_for_rule(&self, rule_id: &str) -> usize {
        self.alerts.read().iter().filter(|a| a.rule_id == rule_id).count()
    }

    /// Count of currently active alerts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.alerts.read().iter().filter(|a| a.status == AlertStatus::Active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::AlertSeverity;

    fn test_alert(id: &str, rule_id: &str) -> Alert {
        Alert::new(
            id.to_string(),
            rule_id.to_string(),
            AlertSeverity::Warning,
            format!("alert {id}"),
            None,
            vec![],
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = AlertStore::new();
        store.insert(test_alert("a1", "r1"));

        assert!(store.get("a1").is_some());
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_acknowledge_and_resolve() {
        let store = AlertStore::new();
        store.insert(test_alert("a1", "r1"));

        let acked = store.acknowledge("a1", "ops").unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("ops"));

        let resolved = store.resolve("a1", "ops").unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        assert!(store.acknowledge("missing", "ops").is_none());
        assert!(store.resolve("missing", "ops").is_none());
    }

    #[test]
    fn test_throttle_allows_up_to_max() {
        let store = AlertStore::new();
        let policy = ThrottlePolicy { period_minutes: 15, max_alerts: 2 };

        for i in 0..2 {
            match store.check_throttle("r1", policy) {
                ThrottleDecision::Allow => store.insert(test_alert(&format!("a{i}"), "r1")),
                ThrottleDecision::Suppress(_) => panic!("firing {i} should be allowed"),
            }
        }

        for _ in 0..3 {
            match store.check_throttle("r1", policy) {
                ThrottleDecision::Suppress(prior) => assert_eq!(prior.id, "a1"),
                ThrottleDecision::Allow => panic!("should be suppressed"),
            }
        }

        assert_eq!(store.count_for_rule("r1"), 2);
    }

    #[test]
    fn test_throttle_windows_are_per_rule() {
        let store = AlertStore::new();
        let policy = ThrottlePolicy { period_minutes: 15, max_alerts: 1 };

        assert!(matches!(store.check_throttle("r1", policy), ThrottleDecision::Allow));
        store.insert(test_alert("a1", "r1"));
        assert!(matches!(store.check_throttle("r2", policy), ThrottleDecision::Allow));
    }

    #[test]
    fn test_escalation_cursor_and_incident_link() {
        let store = AlertStore::new();
        store.insert(test_alert("a1", "r1"));

        assert!(store.set_escalation_cursor(
            "a1",
            EscalationCursor { policy_id: "p1".into(), level: 1, next_fire_at: None },
        ));
        assert!(store.link_incident("a1", "inc-1"));

        let alert = store.get("a1").unwrap();
        assert_eq!(alert.escalation.as_ref().unwrap().level, 1);
        assert_eq!(alert.incident_id.as_deref(), Some("inc-1"));

        assert!(!store.set_escalation_cursor(
            "missing",
            EscalationCursor { policy_id: "p1".into(), level: 0, next_fire_at: None },
        ));
    }

    #[test]
    fn test_capacity_eviction_prefers_resolved() {
        let store = AlertStore::new();

        for i in 0..MAX_ALERTS {
            let mut alert = test_alert(&format!("a{i}"), "r1");
            if i < 200 {
                alert.resolve("ops");
            }
            store.insert(alert);
        }

        store.insert(test_alert("fresh", "r1"));
        assert!(store.get("fresh").is_some());
        assert!(store.all().len() <= MAX_ALERTS);
    }
}
