//! Notification fan-out.
//!
//! The dispatcher renders one message per (event, channel) pair and hands it
//! to the injected [`Notifier`]. Fan-out is best effort: a rate-limited or
//! failing channel is skipped or logged individually and never blocks the
//! remaining channels.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use super::{
    rate_limit::ChannelRateLimiter,
    types::{ChannelConfig, NotificationEvent, Notifier, NotifyError, RenderedMessage},
};

/// Why a channel did not receive a message.
#[derive(Debug)]
pub enum DispatchFailure {
    /// Channel id is not configured.
    UnknownChannel,
    /// Channel is disabled in configuration.
    Disabled,
    /// Channel's hourly quota or cooldown denied the send.
    RateLimited,
    /// The delivery collaborator returned an error.
    Delivery(NotifyError),
}

/// Outcome of dispatching to a single channel.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Channel the outcome refers to.
    pub channel_id: String,
    /// `Ok` on delivery, otherwise the reason the channel was skipped.
    pub result: Result<(), DispatchFailure>,
}

/// Fans out notifications to configured channels.
pub struct NotificationDispatcher {
    channels: HashMap<String, ChannelConfig>,
    notifier: Arc<dyn Notifier>,
    rate_limiter: ChannelRateLimiter,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over the given channel configurations.
    #[must_use]
    pub fn new(channels: Vec<ChannelConfig>, notifier: Arc<dyn Notifier>) -> Self {
        let channels = channels.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { channels, notifier, rate_limiter: ChannelRateLimiter::new() }
    }

    /// Whether a channel id is configured.
    #[must_use]
    pub fn has_channel(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id)
    }

    /// Ids of all configured channels.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Dispatches an event to the named channels, best effort.
    ///
    /// Every channel gets an outcome; failures on one channel never abort
    /// dispatch to the others. No entity lock is held by callers across this
    /// call — events carry cloned snapshots.
    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
        channel_ids: &[String],
    ) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(channel_ids.len());

        for channel_id in channel_ids {
            let result = self.dispatch_one(event, channel_id).await;
            outcomes.push(DispatchOutcome { channel_id: channel_id.clone(), result });
        }

        outcomes
    }

    async fn dispatch_one(
        &self,
        event: &NotificationEvent,
        channel_id: &str,
    ) -> Result<(), DispatchFailure> {
        let Some(channel) = self.channels.get(channel_id) else {
            warn!(channel_id = %channel_id, "Notification channel not configured, skipping");
            return Err(DispatchFailure::UnknownChannel);
        };

        if !channel.enabled {
            debug!(channel_id = %channel_id, "Channel disabled, skipping");
            return Err(DispatchFailure::Disabled);
        }

        if !self.rate_limiter.try_acquire(channel_id, channel.max_per_hour, channel.cooldown_seconds) {
            warn!(
                channel_id = %channel_id,
                event_type = event.event_type(),
                "Channel rate limit exceeded, skipping"
            );
            return Err(DispatchFailure::RateLimited);
        }

        let message = render(event);
        match self.notifier.send(&message, channel).await {
            Ok(()) => {
                debug!(
                    channel_id = %channel_id,
                    event_type = event.event_type(),
                    "Notification delivered"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    channel_id = %channel_id,
                    event_type = event.event_type(),
                    error = %e,
                    "Notification delivery failed"
                );
                Err(DispatchFailure::Delivery(e))
            }
        }
    }
}

/// Renders a message for an event. Templates are keyed by event type; the
/// exact wording is presentation, not contract.
fn render(event: &NotificationEvent) -> RenderedMessage {
    let (subject, body) = match event {
        NotificationEvent::AlertCreated(alert) => (
            format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.message),
            match &alert.snapshot {
                Some(s) => format!(
                    "Alert {} fired by rule {}: {} = {:.2} (threshold {:.2})",
                    alert.id, alert.rule_id, s.metric, s.value, s.threshold
                ),
                None => format!("Alert {} fired by rule {}", alert.id, alert.rule_id),
            },
        ),
        NotificationEvent::AlertEscalated { alert, level } => (
            format!(
                "[ESCALATION L{level}] [{}] {}",
                alert.severity.as_str().to_uppercase(),
                alert.message
            ),
            format!("Alert {} escalated to level {level} (rule {})", alert.id, alert.rule_id),
        ),
        NotificationEvent::IncidentCreated(incident) => (
            format!(
                "[INCIDENT {}] {}",
                incident.severity.as_str().to_uppercase(),
                incident.title
            ),
            format!(
                "Incident {} opened: {}. Affected services: {}",
                incident.id,
                incident.description,
                incident.affected_services.join(", ")
            ),
        ),
        NotificationEvent::IncidentUpdated(incident) => (
            format!("[INCIDENT UPDATE] {}", incident.title),
            format!(
                "Incident {} is now {} ({})",
                incident.id,
                incident.status.as_str(),
                incident.severity.as_str()
            ),
        ),
        NotificationEvent::IncidentEscalated { incident, level } => (
            format!(
                "[ESCALATION L{level}] [INCIDENT {}] {}",
                incident.severity.as_str().to_uppercase(),
                incident.title
            ),
            format!("Incident {} escalated to level {level}", incident.id),
        ),
        NotificationEvent::IncidentResolved(incident) => (
            format!("[RESOLVED] {}", incident.title),
            match incident.metrics.resolution_time_minutes {
                Some(mins) => format!("Incident {} resolved after {mins} minutes", incident.id),
                None => format!("Incident {} resolved", incident.id),
            },
        ),
        NotificationEvent::IncidentStale(incident) => (
            format!("[STALE] {}", incident.title),
            format!(
                "Incident {} has been investigating since {} without progress",
                incident.id, incident.detected_at
            ),
        ),
    };

    RenderedMessage { event_type: event.event_type().to_string(), subject, body }
}
