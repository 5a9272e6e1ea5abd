//! # scenehub-app
//!
//! Application layer — the scene engine, use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SceneRepository` — scenes, pending automations, attribute lookups
//!   - `DeviceRepository` — devices by id or identity
//!   - `TaskLogRepository` — the task audit trail
//!   - `DeviceControl` — read and set device attributes
//!   - `EventPublisher` — emit device events
//! - Run the **scene engine**: a time-ordered task queue, a scheduler loop,
//!   condition evaluation, scene expansion and the daily arrange task
//! - Record every executed task in the task log and aggregate results up the
//!   task tree
//! - Provide the `SceneService` use-cases and an in-process event bus
//!
//! ## Dependency rule
//! Depends on `scenehub-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod condition;
pub mod config;
pub mod event_bus;
pub mod manager;
pub mod ports;
pub mod scheduler;
pub mod services;
pub mod task;
pub mod task_log;

#[cfg(test)]
mod testing;
