//! Builder pattern for initializing the engine runtime with configurable
//! collaborators.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    alerts::{AlertStore, SignalIntake},
    config::EngineConfig,
    escalation::EscalationScheduler,
    incidents::{IncidentManager, StatusPage},
    metrics::MetricsCollector,
    notify::{LogNotifier, NotificationDispatcher, Notifier},
    runbooks::{RunbookCollaborators, RunbookExecutor, SimulatedCollaborators},
};

use super::{components::EngineComponents, lifecycle::EngineRuntime};

/// Errors that can occur during runtime initialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No configuration was provided to the builder.
    #[error("No configuration provided")]
    MissingConfig,

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),
}

/// Configuration options for the runtime builder.
#[derive(Clone)]
struct RuntimeOptions {
    enable_stale_sweep: bool,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { enable_stale_sweep: true, shutdown_channel_capacity: 16 }
    }
}

/// Builder for constructing an [`EngineRuntime`] with injected
/// collaborators.
///
/// # Examples
///
/// ```no_run
/// # use vigil_core::{config::EngineConfig, runtime::EngineBuilder};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EngineConfig::load()?;
///
/// let runtime = EngineBuilder::new()
///     .with_config(config)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    notifier: Option<Arc<dyn Notifier>>,
    collaborators: Option<Arc<dyn RunbookCollaborators>>,
    status_page: Option<Arc<dyn StatusPage>>,
    options: RuntimeOptions,
}

impl EngineBuilder {
    /// Creates a new runtime builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            notifier: None,
            collaborators: None,
            status_page: None,
            options: RuntimeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the notification delivery collaborator. Defaults to the
    /// log-only stand-in.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the runbook step collaborators. Defaults to the simulated
    /// stand-in.
    #[must_use]
    pub fn with_collaborators(mut self, collaborators: Arc<dyn RunbookCollaborators>) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Enables status-page integration.
    #[must_use]
    pub fn with_status_page(mut self, status_page: Arc<dyn StatusPage>) -> Self {
        self.status_page = Some(status_page);
        self
    }

    /// Disables the background stale-incident sweep.
    #[must_use]
    pub fn disable_stale_sweep(mut self) -> Self {
        self.options.enable_stale_sweep = false;
        self
    }

    /// Sets custom shutdown channel capacity (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    /// Builds the runtime: validates configuration, wires components in
    /// dependency order, and starts background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingConfig`] when no configuration was
    /// provided, or [`RuntimeError::ConfigValidation`] when it is invalid.
    pub fn build(self) -> Result<EngineRuntime, RuntimeError> {
        let config = self.config.ok_or(RuntimeError::MissingConfig)?;
        config.validate().map_err(RuntimeError::ConfigValidation)?;

        info!(
            rules = config.rules.len(),
            policies = config.policies.len(),
            channels = config.channels.len(),
            runbooks = config.runbooks.len(),
            "Initializing engine runtime"
        );

        let metrics = Arc::new(MetricsCollector::new());
        let alert_store = Arc::new(AlertStore::new());

        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let dispatcher =
            Arc::new(NotificationDispatcher::new(config.channels.clone(), notifier));
        debug!("Notification dispatcher initialized");

        let scheduler = Arc::new(EscalationScheduler::new(
            config.policies.clone(),
            Arc::clone(&alert_store),
            Arc::clone(&dispatcher),
        ));

        let collaborators =
            self.collaborators.unwrap_or_else(|| Arc::new(SimulatedCollaborators));
        let executor = Arc::new(RunbookExecutor::new(config.runbooks.clone(), collaborators));

        let mut incident_manager = IncidentManager::new(
            Arc::clone(&alert_store),
            Arc::clone(&dispatcher),
            Arc::clone(&scheduler),
            Arc::clone(&executor),
            config.engine.notify_channels.clone(),
        );
        if let Some(status_page) = self.status_page {
            incident_manager = incident_manager.with_status_page(status_page);
        }
        let incident_manager = Arc::new(incident_manager);
        // The scheduler reaches the manager through a weak reference; the
        // strong direction is manager -> scheduler.
        scheduler.bind_incident_manager(Arc::downgrade(&incident_manager));
        debug!("Incident manager bound to escalation scheduler");

        let intake = Arc::new(SignalIntake::new(
            Arc::clone(&metrics),
            config.rules.clone(),
            Arc::clone(&alert_store),
            Arc::clone(&dispatcher),
            Arc::clone(&scheduler),
            Arc::clone(&incident_manager),
            config.engine.notify_channels.clone(),
        ));

        let components = EngineComponents::new(
            metrics,
            alert_store,
            dispatcher,
            scheduler,
            executor,
            incident_manager,
            intake,
        );

        let (shutdown_tx, _) = broadcast::channel(self.options.shutdown_channel_capacity);

        Ok(EngineRuntime::new(components, shutdown_tx, config, self.options.enable_stale_sweep))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
