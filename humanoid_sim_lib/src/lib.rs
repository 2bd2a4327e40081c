//! # Humanoid Simulation Library
//!
//! Shared types and simulation models for the humanoid telemetry dashboard.
//! This library owns the tick-driven core: battery/power model, motion
//! state, telemetry recording, and session aggregation. Rendering, maps,
//! charts, and the cloud store are external collaborators that consume the
//! snapshots and payloads produced here.

pub mod sim;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use sim::*;
pub use types::*;
pub use utils::*;
