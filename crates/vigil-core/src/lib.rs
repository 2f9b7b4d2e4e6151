//! # Vigil Core
//!
//! Core library for the Vigil alert and incident response engine.
//!
//! This crate provides the foundational components for:
//!
//! - **[`metrics`]**: In-memory metric buffering with windowed aggregation
//!   (average, sum, min, max, count, p95) feeding rule evaluation.
//!
//! - **[`alerts`]**: Signal intake, threshold rule evaluation, the per-rule
//!   throttle gate, and the bounded alert store.
//!
//! - **[`escalation`]**: Escalation policies with severity, tag, and
//!   time-window matching, plus the cancellable timer scheduler that walks
//!   alerts and incidents through policy levels.
//!
//! - **[`notify`]**: Channel configuration, per-channel rate limiting, and
//!   the best-effort notification dispatcher.
//!
//! - **[`incidents`]**: Incident lifecycle management, the timeline,
//!   stale-incident sweeps, status-page propagation, and post-mortem
//!   generation.
//!
//! - **[`runbooks`]**: Automated runbook execution with per-step timeouts,
//!   retry, and rollback on failure.
//!
//! - **[`runtime`]**: Builder-based initialization, component wiring, and
//!   graceful shutdown.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SignalIntake                          │
//! │  ┌──────────────────┐  ┌───────────────┐  ┌──────────────┐   │
//! │  │ MetricsCollector │  │  AlertRules   │  │  AlertStore  │   │
//! │  └────────┬─────────┘  └───────┬───────┘  └──────┬───────┘   │
//! │           │                    │                 │           │
//! │           └──────── evaluate ──┴── throttle ─────┘           │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ alert admitted
//!             ┌───────────────┼───────────────────┐
//!             ▼               ▼                   ▼
//!   ┌──────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//!   │  Notification    │ │   Escalation    │ │    Incident     │
//!   │   Dispatcher     │ │   Scheduler     │ │    Manager      │
//!   └──────────────────┘ └─────────────────┘ └────────┬────────┘
//!                                                     │
//!                                       ┌─────────────┴──────────┐
//!                                       ▼                        ▼
//!                              ┌─────────────────┐      ┌──────────────┐
//!                              │ RunbookExecutor │      │  PostMortem  │
//!                              └─────────────────┘      └──────────────┘
//! ```
//!
//! ## Signal Flow
//!
//! ```text
//! Metric / Event
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Rule Check  │ ─── No match ──► Buffered only
//! └──────┬──────┘
//!        │ Conditions satisfied
//!        ▼
//! ┌─────────────┐
//! │ Throttle    │ ─── Exhausted ──► Suppressed (count recorded)
//! └──────┬──────┘
//!        │ Allowed
//!        ▼
//! ┌─────────────┐      ┌──────────────────┐
//! │ AlertStore  │ ───► │ Notify + Escalate│
//! └──────┬──────┘      └──────────────────┘
//!        │ Critical
//!        ▼
//! ┌─────────────┐      ┌──────────────────┐
//! │  Incident   │ ───► │ Auto runbooks,   │
//! │  created    │      │ status page      │
//! └─────────────┘      └──────────────────┘
//! ```

pub mod alerts;
pub mod config;
pub mod escalation;
pub mod incidents;
pub mod metrics;
pub mod notify;
pub mod runbooks;
pub mod runtime;
