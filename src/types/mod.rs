pub mod tick;
pub mod bar;
pub mod signal;
pub mod metrics;

pub use tick::*;
pub use bar::*;
pub use signal::*;
pub use metrics::*;
