//! Alerting: rule evaluation, the throttle gate, and alert state.
//!
//! The [`SignalIntake`] turns recorded metrics into alerts through the
//! configured rules; the [`AlertStore`] is the single source of truth for
//! alert state and owns the per-rule throttle windows.

pub mod intake;
pub mod store;
pub mod types;

pub use intake::{SignalIntake, SignalOutcome};
pub use store::{AlertStore, ThrottleDecision};
pub use types::{
    Alert, AlertCondition, AlertRule, AlertSeverity, AlertStatus, ComparisonOp, EscalationCursor,
    MetricSnapshot, ThrottlePolicy,
};
