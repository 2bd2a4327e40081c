// Telemetry recorder: the fast packet ring buffer and the slower map
// trail buffer, each with its own simulated-time cadence.

use crate::sim::motion::MOTION_EPSILON;
use crate::types::config::SimSettings;
use crate::types::sim_types::{now_ms, RobotStatus, SimulationState};
use crate::types::telemetry_types::{PathSample, TelemetryPacket};
use eyre::Result;
use std::collections::VecDeque;

/// Packet ring buffer capacity (oldest dropped first)
pub const PACKET_LOG_CAP: usize = 50;

/// Path samples exported per flush
pub const PATH_EXPORT_CAP: usize = 20;

/// Dual-cadence telemetry recorder.
///
/// Both cadences are gated on simulated elapsed time, each with its own
/// last-sample mark. The packet cadence shortens under active input; the
/// path cadence only fires while the robot is actually moving.
#[derive(Debug, Clone, Default)]
pub struct TelemetryRecorder {
    packet_log: VecDeque<TelemetryPacket>,
    path_buffer: Vec<PathSample>,
    last_packet_at: f64,
    last_path_at: f64,
    next_seq: u64,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a packet if the cadence interval has elapsed.
    pub fn maybe_record_packet(
        &mut self,
        now: f64,
        state: &SimulationState,
        status: RobotStatus,
        active_input: bool,
        settings: &SimSettings,
    ) -> Option<&TelemetryPacket> {
        let interval = if active_input {
            settings.packet_interval_active
        } else {
            settings.packet_interval
        };

        if now - self.last_packet_at <= interval {
            return None;
        }
        self.last_packet_at = now;

        let packet = TelemetryPacket {
            seq: self.next_seq,
            timestamp_ms: now_ms(),
            battery: state.battery,
            velocity: state.speed,
            position: (state.position.x, state.position.y),
            status,
            joints: state.joint_angles,
        };
        self.next_seq += 1;

        self.packet_log.push_back(packet);
        while self.packet_log.len() > PACKET_LOG_CAP {
            self.packet_log.pop_front();
        }
        self.packet_log.back()
    }

    /// Record a path sample if moving and the fixed interval has elapsed.
    pub fn maybe_record_path(
        &mut self,
        now: f64,
        state: &SimulationState,
        lat: f64,
        lon: f64,
        settings: &SimSettings,
    ) -> bool {
        if state.speed.abs() <= MOTION_EPSILON {
            return false;
        }
        if now - self.last_path_at <= settings.record_interval {
            return false;
        }
        self.last_path_at = now;

        self.path_buffer.push(PathSample {
            lat,
            lon,
            battery: state.battery,
            speed: state.speed,
        });
        true
    }

    pub fn packets(&self) -> impl Iterator<Item = &TelemetryPacket> {
        self.packet_log.iter()
    }

    pub fn packet_count(&self) -> usize {
        self.packet_log.len()
    }

    pub fn latest_packet(&self) -> Option<&TelemetryPacket> {
        self.packet_log.back()
    }

    pub fn path_len(&self) -> usize {
        self.path_buffer.len()
    }

    /// The most recent path samples, capped for export.
    pub fn path_tail(&self) -> Vec<PathSample> {
        let skip = self.path_buffer.len().saturating_sub(PATH_EXPORT_CAP);
        self.path_buffer[skip..].to_vec()
    }

    /// Drop the buffered trail (checkpoint flush).
    pub fn clear_path(&mut self) {
        self.path_buffer.clear();
    }

    /// Serialize the full packet ring buffer for download.
    pub fn export_packets(&self) -> Result<String> {
        let packets: Vec<&TelemetryPacket> = self.packet_log.iter().collect();
        Ok(serde_json::to_string_pretty(&packets)?)
    }
}
