pub mod config;
pub mod error;
pub mod executor;
pub mod service;

pub use config::WorkerConfig;
pub use error::{BatchErr, Result, WorkerErr};
pub use executor::ExecutionPool;
pub use service::WorkerService;
