pub mod config;
pub mod fleet_types;
pub mod sim_types;
pub mod telemetry_types;

pub use config::*;
pub use fleet_types::*;
pub use sim_types::*;
pub use telemetry_types::*;
