//! # scenehub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `scenehub-app::ports`
//!   (`SceneRepository`, `DeviceRepository`, `TaskLogRepository`)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `scenehub-app` (for port traits) and `scenehub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod time;

pub mod device_repo;
pub mod pool;
pub mod scene_repo;
pub mod task_log_repo;

pub use device_repo::SqliteDeviceRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use scene_repo::SqliteSceneRepository;
pub use task_log_repo::SqliteTaskLogRepository;
