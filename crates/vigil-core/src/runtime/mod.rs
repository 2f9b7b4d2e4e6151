//! Engine runtime initialization and lifecycle management.
//!
//! This module provides a unified initialization API for all engine
//! components, suitable for both long-running daemon deployments and
//! embedded use cases (test harnesses, platform services that host the
//! engine in-process). It manages component lifecycles, the background
//! stale-incident sweep, and graceful shutdown coordination.
//!
//! # Examples
//!
//! ## Daemon Usage
//!
//! ```no_run
//! use vigil_core::{config::EngineConfig, runtime::EngineRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load()?;
//!
//!     let runtime = EngineRuntime::builder().with_config(config).build()?;
//!
//!     // Feed signals from the host application.
//!     let intake = runtime.intake();
//!
//!     // ... wire intake into the metric pipeline ...
//!
//!     runtime.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Embedded Usage
//!
//! ```no_run
//! use vigil_core::{config::EngineConfig, runtime::EngineRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load()?;
//!
//!     // Minimal runtime without the background sweep.
//!     let runtime =
//!         EngineRuntime::builder().with_config(config).disable_stale_sweep().build()?;
//!
//!     runtime.record_metric("error_rate", 7.5, "percent", vec![], Default::default()).await;
//!
//!     // Manual shutdown when done.
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod lifecycle;

pub use builder::{EngineBuilder, RuntimeError};
pub use components::EngineComponents;
pub use lifecycle::EngineRuntime;
