//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Together the three repositories form the entity store the scene engine
//! reads scenes and devices from and writes its audit trail to.

pub mod device_control;
pub mod device_repo;
pub mod event_bus;
pub mod scene_repo;
pub mod task_log_repo;

pub use device_control::DeviceControl;
pub use device_repo::DeviceRepository;
pub use event_bus::EventPublisher;
pub use scene_repo::SceneRepository;
pub use task_log_repo::TaskLogRepository;
