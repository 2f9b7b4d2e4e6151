//! Integration tests for the vigil engine.
//!
//! Each module exercises one concern through the full runtime, built with
//! recording doubles from [`mock_infrastructure`] in place of real
//! notification and runbook collaborators:
//!
//! - `throttle_tests`: alert admission and per-rule suppression windows
//! - `escalation_tests`: level timing under a paused clock
//! - `runbook_tests`: automated response, rollback ordering, audit records
//! - `incident_tests`: lifecycle transitions and post-mortem generation
//! - `scenario_tests`: end-to-end signal-to-resolution walks
//! - `runtime_tests`: shutdown, builder validation, configuration loading

pub mod mock_infrastructure;

#[cfg(test)]
mod escalation_tests;
#[cfg(test)]
mod incident_tests;
#[cfg(test)]
mod runbook_tests;
#[cfg(test)]
mod runtime_tests;
#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
mod throttle_tests;
