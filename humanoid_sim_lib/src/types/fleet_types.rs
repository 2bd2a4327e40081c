use crate::types::telemetry_types::{FlushPayload, FlushReason};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum retained run records
pub const RUN_HISTORY_CAP: usize = 10;

/// Sessions shorter than this (meters) are noise and never enter history
pub const RUN_DISTANCE_THRESHOLD: f64 = 5.0;

/// Floor for the efficiency divisor so zero-consumption runs stay finite
pub const EFFICIENCY_EPSILON: f64 = 1.0;

/// Summary of one completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub distance_m: f64,
    pub battery_consumed_pct: f64,
}

impl RunRecord {
    pub fn new(distance_m: f64, battery_consumed_pct: f64) -> Self {
        Self {
            distance_m: distance_m.max(0.0),
            battery_consumed_pct: battery_consumed_pct.max(0.0),
        }
    }

    /// Meters travelled per percent of battery spent.
    pub fn efficiency(&self) -> f64 {
        self.distance_m / self.battery_consumed_pct.max(EFFICIENCY_EPSILON)
    }
}

/// Ordered run history, most-recent-last, capped at [`RUN_HISTORY_CAP`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    entries: VecDeque<RunRecord>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RunRecord) {
        self.entries.push_back(record);
        while self.entries.len() > RUN_HISTORY_CAP {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &RunRecord> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<RunRecord> {
        self.entries.iter().cloned().collect()
    }

    /// The two chart series: raw distance and derived efficiency.
    pub fn chart_series(&self) -> (Vec<f64>, Vec<f64>) {
        let distance = self.entries.iter().map(|r| r.distance_m).collect();
        let efficiency = self.entries.iter().map(|r| r.efficiency()).collect();
        (distance, efficiency)
    }
}

/// Cross-session totals. Monotonically non-decreasing within a process;
/// only a startup reload from the store replaces them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FleetAggregate {
    pub total_distance: f64,
    pub total_cycles: u32,
}

impl FleetAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed fleet totals and run history from prior checkpoint documents.
    ///
    /// AUTO snapshots are skipped: they repeat session totals that a later
    /// checkpoint rolls up. Sessions at or below the noise threshold stay
    /// out of history but still count toward the raw totals.
    pub fn seed_from_documents(docs: &[FlushPayload]) -> (Self, RunHistory) {
        let mut fleet = FleetAggregate::new();
        let mut history = RunHistory::new();

        for doc in docs {
            if doc.reason == FlushReason::Auto {
                continue;
            }

            fleet.total_distance += doc.session_distance;
            fleet.total_cycles += doc.session_cycles;

            if doc.session_distance > RUN_DISTANCE_THRESHOLD {
                history.push(RunRecord::new(
                    doc.session_distance.floor(),
                    doc.battery_consumed,
                ));
            }
        }

        (fleet, history)
    }
}
