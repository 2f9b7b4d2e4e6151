//! Status-page integration seam.

use async_trait::async_trait;
use tracing::info;

use super::types::Incident;

/// Public status-page collaborator.
///
/// Calls are fire-and-forget: the manager spawns them with a snapshot of
/// the incident and never awaits the result on the incident path. Failures
/// are the implementation's to log.
#[async_trait]
pub trait StatusPage: Send + Sync {
    /// Publishes or updates the affected components for an incident.
    async fn update_component_status(&self, incident: &Incident);

    /// Marks the affected components recovered.
    async fn resolve_component_status(&self, incident: &Incident);
}

/// Stand-in status page that only logs. Used by the CLI simulator.
#[derive(Debug, Default)]
pub struct LogStatusPage;

#[async_trait]
impl StatusPage for LogStatusPage {
    async fn update_component_status(&self, incident: &Incident) {
        info!(
            incident_id = %incident.id,
            severity = incident.severity.as_str(),
            services = ?incident.affected_services,
            "Status page updated (log status page)"
        );
    }

    async fn resolve_component_status(&self, incident: &Incident) {
        info!(
            incident_id = %incident.id,
            services = ?incident.affected_services,
            "Status page resolved (log status page)"
        );
    }
}
