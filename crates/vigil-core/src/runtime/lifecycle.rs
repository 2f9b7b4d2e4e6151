//! Runtime lifecycle management including background tasks and graceful
//! shutdown.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    alerts::{SignalIntake, SignalOutcome},
    config::EngineConfig,
    incidents::IncidentManager,
};

use super::{builder::EngineBuilder, components::EngineComponents};

/// Main runtime container managing component lifecycles and background
/// tasks.
///
/// Owns all initialized components, the stale-incident sweep task, and the
/// shutdown broadcast channel. When `shutdown()` is called, background
/// tasks are signaled and awaited and every pending escalation timer is
/// cancelled.
pub struct EngineRuntime {
    components: EngineComponents,
    shutdown_tx: broadcast::Sender<()>,
    config: EngineConfig,
    sweep_task: Option<JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl EngineRuntime {
    /// Creates a new builder for constructing an `EngineRuntime`.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Creates a new runtime with initialized components and starts
    /// background tasks.
    ///
    /// Called by `EngineBuilder` during initialization.
    pub(super) fn new(
        components: EngineComponents,
        shutdown_tx: broadcast::Sender<()>,
        config: EngineConfig,
        enable_stale_sweep: bool,
    ) -> Self {
        let sweep_task = enable_stale_sweep.then(|| {
            let task = Self::start_stale_sweep(
                Arc::clone(components.incident_manager()),
                config.engine.sweep_interval_seconds,
                config.engine.stale_after_minutes,
                shutdown_tx.subscribe(),
            );
            debug!("Stale-incident sweep task started");
            task
        });

        Self {
            components,
            shutdown_tx,
            config,
            sweep_task,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a reference to all runtime components.
    #[must_use]
    pub fn components(&self) -> &EngineComponents {
        &self.components
    }

    /// Returns a reference to the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Convenience accessor for the signal intake.
    #[must_use]
    pub fn intake(&self) -> &Arc<SignalIntake> {
        self.components.intake()
    }

    /// Convenience accessor for the incident manager.
    #[must_use]
    pub fn incident_manager(&self) -> &Arc<IncidentManager> {
        self.components.incident_manager()
    }

    /// Records a metric observation through the signal intake.
    ///
    /// Returns one outcome per rule firing; see
    /// [`SignalIntake::record_metric`].
    pub async fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        tags: Vec<String>,
        dimensions: HashMap<String, String>,
    ) -> Vec<SignalOutcome> {
        self.intake().record_metric(name, value, unit, tags, dimensions).await
    }

    /// Creates a new shutdown receiver for external shutdown coordination.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiates graceful shutdown of all background tasks.
    ///
    /// Broadcasts the shutdown signal, awaits the sweep task, and cancels
    /// every pending escalation timer. Idempotent: a duplicate call is
    /// logged and ignored.
    pub async fn shutdown(self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("Initiating engine runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            debug!(error = %e, "No shutdown receivers were listening");
        }

        if let Some(sweep_task) = self.sweep_task {
            match sweep_task.await {
                Ok(()) => debug!("Stale sweep task completed"),
                Err(e) if e.is_cancelled() => debug!("Stale sweep task cancelled"),
                Err(e) => error!(error = %e, "Stale sweep task failed"),
            }
        }

        self.components.scheduler().cancel_all();

        info!("Engine runtime shutdown complete");
    }

    /// Waits indefinitely for a shutdown signal, then performs cleanup.
    ///
    /// Useful for binaries that keep the runtime alive while waiting for
    /// external signals (SIGTERM, Ctrl+C).
    pub async fn wait_for_shutdown(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = shutdown_rx.recv().await;
        info!("Shutdown signal received, runtime terminating");
        self.shutdown().await;
    }

    /// Starts the periodic stale-incident sweep.
    fn start_stale_sweep(
        incident_manager: Arc<IncidentManager>,
        interval_seconds: u64,
        stale_after_minutes: i64,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // First tick after one full interval, not immediately; shutdown
            // wins when both branches are ready.
            let period = Duration::from_secs(interval_seconds);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        debug!("Stale sweep received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reminded = incident_manager.sweep_stale(stale_after_minutes).await;
                        if !reminded.is_empty() {
                            info!(count = reminded.len(), "Stale incident reminders sent");
                        }
                    }
                }
            }
        })
    }
}
