pub mod controller;
pub mod metrics;
pub mod orchestrator;

pub use controller::*;
pub use orchestrator::*;
