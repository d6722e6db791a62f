pub mod health;
pub mod telemetry;

pub use health::*;
pub use telemetry::*;
