use crate::types::fleet_types::RunRecord;
use crate::types::sim_types::{now_ms, JointAngles, RobotStatus};
use serde::{Deserialize, Serialize};

/// Why a flush was triggered. Any reason other than `Auto` is a
/// checkpoint: it rolls session totals into fleet totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlushReason {
    Auto,
    PowerOff,
    Dead,
    Charged,
    Manual,
}

impl FlushReason {
    pub fn is_checkpoint(&self) -> bool {
        !matches!(self, FlushReason::Auto)
    }
}

/// One rolling sample for live display and log export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryPacket {
    pub seq: u64,
    pub timestamp_ms: u64,
    pub battery: f64,
    pub velocity: f64,
    /// Ground-plane position (x, z) in meters
    pub position: (f64, f64),
    pub status: RobotStatus,
    pub joints: JointAngles,
}

/// Slower-cadence sample for the map trail and cloud flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSample {
    pub lat: f64,
    pub lon: f64,
    pub battery: f64,
    pub speed: f64,
}

/// Simulated diagnostics readouts shown on the monitoring tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemVitals {
    pub temp_c: f64,
    pub volts: f64,
    pub cpu_load_pct: f64,
}

impl Default for SystemVitals {
    fn default() -> Self {
        Self {
            temp_c: 40.0,
            volts: 24.0,
            cpu_load_pct: 12.0,
        }
    }
}

impl SystemVitals {
    /// Advance the diagnostics model one tick. Load is derived from speed;
    /// temperature lerps toward its load target.
    pub fn update(&mut self, speed: f64, dt: f64) {
        let load = speed.abs() * 8.0 + 12.0;
        self.cpu_load_pct = load;
        self.volts = 24.1 - load / 200.0;
        let target = 45.0 + load / 5.0;
        let factor = dt.min(1.0);
        self.temp_c += (target - self.temp_c) * factor;
    }
}

/// Full-snapshot document written to the store on every flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushPayload {
    pub doc_id: String,
    pub timestamp: u64,
    pub reason: FlushReason,

    pub battery: f64,
    pub velocity: f64,
    pub total_cycles: u32,
    pub total_distance: f64,
    pub session_distance: f64,
    /// Charge cycles completed this session, not yet folded into the
    /// fleet total at the time this document was written.
    pub session_cycles: u32,
    pub battery_consumed: f64,

    pub vitals: SystemVitals,
    pub joints: JointAngles,
    /// Most recent path samples (at most 20)
    pub path: Vec<PathSample>,
    pub history: Vec<RunRecord>,
}

impl FlushPayload {
    pub fn new(reason: FlushReason) -> Self {
        Self {
            doc_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            reason,
            battery: 0.0,
            velocity: 0.0,
            total_cycles: 0,
            total_distance: 0.0,
            session_distance: 0.0,
            session_cycles: 0,
            battery_consumed: 0.0,
            vitals: SystemVitals::default(),
            joints: JointAngles::default(),
            path: Vec::new(),
            history: Vec::new(),
        }
    }
}
