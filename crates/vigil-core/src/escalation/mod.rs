//! Timed escalation of unhandled alerts and incidents.
//!
//! Policies define ordered levels with delays, channels, responders, and
//! actions; the scheduler arms one cancellable timer per entity and walks
//! the levels while the entity stays active.

pub mod policy;
pub mod scheduler;

pub use policy::{
    first_matching, EscalationAction, EscalationLevel, EscalationPolicy, PolicyConditions,
    TimeWindow,
};
pub use scheduler::{EscalationScheduler, EscalationTarget};
