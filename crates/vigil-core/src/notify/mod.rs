//! Notification dispatch.
//!
//! ## Components
//!
//! - **[`NotificationDispatcher`]**: renders messages and fans out to channels
//! - **[`Notifier`]**: injected delivery collaborator (one `send` contract
//!   for email/slack/sms/webhook/pagerduty/teams/discord)
//! - **[`ChannelRateLimiter`]**: per-channel hourly quota + cooldown
//! - **[`ChannelConfig`]** / **[`ChannelTarget`]**: per-variant structured
//!   channel configuration, validated at load time

pub mod dispatcher;
pub mod rate_limit;
pub mod types;

pub use dispatcher::{DispatchFailure, DispatchOutcome, NotificationDispatcher};
pub use rate_limit::ChannelRateLimiter;
pub use types::{
    ChannelConfig, ChannelKind, ChannelTarget, LogNotifier, NotificationEvent, Notifier,
    NotifyError, RenderedMessage,
};
