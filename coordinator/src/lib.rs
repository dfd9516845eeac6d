pub mod config;
pub mod error;
pub mod limits;
pub mod link;
pub mod partition;
pub mod scheduler;
pub mod service;

pub use config::CoordinatorConfig;
pub use error::{CoordinatorErr, DispatchErr, RequestErr, Result};
pub use limits::RequestLimits;
pub use link::WorkerLink;
pub use partition::PartitionPolicy;
pub use scheduler::TaskScheduler;
pub use service::Coordinator;
