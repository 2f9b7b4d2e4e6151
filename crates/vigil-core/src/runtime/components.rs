//! Core component container for the engine runtime.

use std::sync::Arc;

use crate::{
    alerts::{AlertStore, SignalIntake},
    escalation::EscalationScheduler,
    incidents::IncidentManager,
    metrics::MetricsCollector,
    notify::NotificationDispatcher,
    runbooks::RunbookExecutor,
};

/// Container for all initialized engine components.
///
/// All components are wrapped in `Arc` for efficient sharing across threads
/// and tasks. Components implement interior mutability where needed and are
/// safe to clone and share.
#[derive(Clone)]
pub struct EngineComponents {
    metrics: Arc<MetricsCollector>,
    alert_store: Arc<AlertStore>,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<EscalationScheduler>,
    executor: Arc<RunbookExecutor>,
    incident_manager: Arc<IncidentManager>,
    intake: Arc<SignalIntake>,
}

impl EngineComponents {
    /// Creates a new components container.
    ///
    /// Called by `EngineBuilder` during initialization.
    #[must_use]
    pub fn new(
        metrics: Arc<MetricsCollector>,
        alert_store: Arc<AlertStore>,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<EscalationScheduler>,
        executor: Arc<RunbookExecutor>,
        incident_manager: Arc<IncidentManager>,
        intake: Arc<SignalIntake>,
    ) -> Self {
        Self { metrics, alert_store, dispatcher, scheduler, executor, incident_manager, intake }
    }

    /// Returns a reference to the metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Returns a reference to the alert store.
    #[must_use]
    pub fn alert_store(&self) -> &Arc<AlertStore> {
        &self.alert_store
    }

    /// Returns a reference to the notification dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Returns a reference to the escalation scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<EscalationScheduler> {
        &self.scheduler
    }

    /// Returns a reference to the runbook executor.
    #[must_use]
    pub fn executor(&self) -> &Arc<RunbookExecutor> {
        &self.executor
    }

    /// Returns a reference to the incident manager.
    #[must_use]
    pub fn incident_manager(&self) -> &Arc<IncidentManager> {
        &self.incident_manager
    }

    /// Returns a reference to the signal intake.
    #[must_use]
    pub fn intake(&self) -> &Arc<SignalIntake> {
        &self.intake
    }
}
