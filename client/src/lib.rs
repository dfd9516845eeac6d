pub mod error;
mod session;

pub use error::ClientErr;
pub use session::SimulationClient;
