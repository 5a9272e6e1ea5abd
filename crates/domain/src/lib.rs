//! # scenehub-domain
//!
//! Pure domain model for the scenehub scene engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** and the **attribute** values scenes read and set
//! - Define **Scenes** with their conditions, tasks, effective window and
//!   repeat policy
//! - Define **Task logs** and the rule deriving a parent result from its
//!   children
//! - Define **Device events** (attribute-change notifications)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod attribute;
pub mod device;
pub mod event;
pub mod scene;
pub mod task_log;
