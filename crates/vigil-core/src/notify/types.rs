//! Notification channel types and the delivery collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{alerts::Alert, incidents::Incident};

/// Discriminator for channel delivery mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Slack,
    Sms,
    Webhook,
    Pagerduty,
    Teams,
    Discord,
}

impl ChannelKind {
    /// Static label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Sms => "sms",
            Self::Webhook => "webhook",
            Self::Pagerduty => "pagerduty",
            Self::Teams => "teams",
            Self::Discord => "discord",
        }
    }
}

/// Per-variant delivery target configuration.
///
/// Validated at load time so channel `send` implementations never see a
/// target of the wrong shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelTarget {
    Email {
        recipients: Vec<String>,
    },
    Slack {
        webhook_url: String,
        #[serde(default)]
        channel: Option<String>,
    },
    Sms {
        phone_numbers: Vec<String>,
    },
    Webhook {
        url: String,
    },
    Pagerduty {
        integration_key: String,
    },
    Teams {
        webhook_url: String,
    },
    Discord {
        webhook_url: String,
    },
}

impl ChannelTarget {
    /// The channel kind this target belongs to.
    #[must_use]
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Email { .. } => ChannelKind::Email,
            Self::Slack { .. } => ChannelKind::Slack,
            Self::Sms { .. } => ChannelKind::Sms,
            Self::Webhook { .. } => ChannelKind::Webhook,
            Self::Pagerduty { .. } => ChannelKind::Pagerduty,
            Self::Teams { .. } => ChannelKind::Teams,
            Self::Discord { .. } => ChannelKind::Discord,
        }
    }
}

/// A configured notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique identifier referenced by rules and escalation levels.
    pub id: String,
    /// Whether this channel may receive notifications.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Delivery target, tagged by channel type.
    pub target: ChannelTarget,
    /// Maximum notifications per rolling hour. Defaults to `100`.
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,
    /// Minimum seconds between consecutive sends. Defaults to `0`.
    #[serde(default)]
    pub cooldown_seconds: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_per_hour() -> u32 {
    100
}

/// Events the dispatcher can render and fan out.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    AlertCreated(Alert),
    AlertEscalated { alert: Alert, level: usize },
    IncidentCreated(Incident),
    IncidentUpdated(Incident),
    IncidentEscalated { incident: Incident, level: usize },
    IncidentResolved(Incident),
    IncidentStale(Incident),
}

impl NotificationEvent {
    /// Template key for this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AlertCreated(_) => "alert_created",
            Self::AlertEscalated { .. } => "alert_escalated",
            Self::IncidentCreated(_) => "incident_created",
            Self::IncidentUpdated(_) => "incident_updated",
            Self::IncidentEscalated { .. } => "incident_escalated",
            Self::IncidentResolved(_) => "incident_resolved",
            Self::IncidentStale(_) => "incident_stale",
        }
    }
}

/// A message rendered for one (event, channel) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Template key the message was rendered from.
    pub event_type: String,
    /// Short subject line.
    pub subject: String,
    /// Full message body.
    pub body: String,
}

/// Errors surfaced by a channel's delivery mechanism.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The external delivery call failed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The channel rejected the message (bad target, payload too large).
    #[error("channel rejected message: {0}")]
    Rejected(String),
}

/// External delivery collaborator.
///
/// Concrete transports (SMTP, Slack webhooks, SMS gateways, paging APIs)
/// live outside the engine; the engine depends only on this contract.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a rendered message to the given channel.
    async fn send(&self, message: &RenderedMessage, channel: &ChannelConfig) -> Result<(), NotifyError>;
}

/// Stand-in notifier that logs deliveries instead of performing them.
///
/// Used by the CLI simulator and as a default when no transport is wired.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &RenderedMessage, channel: &ChannelConfig) -> Result<(), NotifyError> {
        info!(
            channel_id = %channel.id,
            channel_kind = channel.target.kind().as_str(),
            event_type = %message.event_type,
            subject = %message.subject,
            "Notification delivered (log notifier)"
        );
        Ok(())
    }
}
