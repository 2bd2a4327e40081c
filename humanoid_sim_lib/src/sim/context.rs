// The owned simulation context: one tick function drives power, motion,
// joints, and telemetry cadences, and reports discrete events back to the
// node layer. No ambient globals; collaborators consume snapshots.

use crate::sim::motion::update_motion;
use crate::sim::power::{PowerEvent, PowerModel};
use crate::sim::recorder::TelemetryRecorder;
use crate::sim::session::SessionTracker;
use crate::types::config::SimSettings;
use crate::types::fleet_types::{FleetAggregate, RunHistory, RunRecord, RUN_DISTANCE_THRESHOLD};
use crate::types::sim_types::{
    now_ms, ControlInput, JointOffsets, MotionAction, SimulationState,
};
use crate::types::telemetry_types::{FlushPayload, FlushReason, SystemVitals};
use crate::utils::geo::GeoProjector;
use eyre::Result;
use tracing::info;

/// Discrete events a tick (or a power toggle) can emit. The node layer
/// turns `FlushRequested` into a store write; render collaborators use the
/// alert events for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    FlushRequested(FlushReason),
    AlertRaised,
    AlertCleared,
    CycleCompleted,
}

/// What one tick hands back to collaborators.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub snapshot: SimulationState,
    pub action: MotionAction,
    pub events: Vec<SimEvent>,
}

/// Owner of all mutable simulation state. Single writer: the node's tick
/// loop. Everything time-based runs on simulated elapsed seconds.
#[derive(Debug)]
pub struct SimulationContext {
    settings: SimSettings,
    state: SimulationState,
    joints: JointOffsets,
    power: PowerModel,
    recorder: TelemetryRecorder,
    session: SessionTracker,
    history: RunHistory,
    fleet: FleetAggregate,
    vitals: SystemVitals,
    geo: GeoProjector,
    sim_time: f64,
}

impl SimulationContext {
    pub fn new(settings: SimSettings) -> Self {
        Self::with_seed(settings, FleetAggregate::new(), RunHistory::new())
    }

    /// Start with fleet totals and run history seeded from the store.
    pub fn with_seed(settings: SimSettings, fleet: FleetAggregate, history: RunHistory) -> Self {
        let state = SimulationState::new();
        let geo = GeoProjector::new(settings.base_lat, settings.base_lon);
        let session = SessionTracker::new(now_ms(), state.battery);
        Self {
            settings,
            state,
            joints: JointOffsets::default(),
            power: PowerModel::new(),
            recorder: TelemetryRecorder::new(),
            session,
            history,
            fleet,
            vitals: SystemVitals::default(),
            geo,
            sim_time: 0.0,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn joints(&self) -> &JointOffsets {
        &self.joints
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// Runtime-tunable settings (the dashboard sliders mutate these).
    pub fn settings_mut(&mut self) -> &mut SimSettings {
        &mut self.settings
    }

    pub fn geo(&self) -> &GeoProjector {
        &self.geo
    }

    pub fn geo_mut(&mut self) -> &mut GeoProjector {
        &mut self.geo
    }

    pub fn vitals(&self) -> &SystemVitals {
        &self.vitals
    }

    pub fn run_history(&self) -> &RunHistory {
        &self.history
    }

    pub fn fleet(&self) -> &FleetAggregate {
        &self.fleet
    }

    pub fn recorder(&self) -> &TelemetryRecorder {
        &self.recorder
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn session_distance(&self) -> f64 {
        self.session.distance()
    }

    /// Fleet distance plus the running session (the headline readout).
    pub fn total_distance(&self) -> f64 {
        self.fleet.total_distance + self.session.distance()
    }

    /// Fleet cycles plus pending ones from this session.
    pub fn total_cycles(&self) -> u32 {
        self.fleet.total_cycles + self.power.pending_cycles()
    }

    pub fn battery_alert_active(&self) -> bool {
        self.power.alert_active()
    }

    /// Advance the simulation by one frame delta.
    pub fn tick(&mut self, input: &ControlInput, dt: f64) -> TickOutcome {
        self.sim_time += dt;
        let mut events = Vec::new();

        // Battery first, using last tick's speed, then its transitions
        for event in self.power.apply(&mut self.state, &self.settings, input.charging, dt) {
            match event {
                PowerEvent::BatteryDead => {
                    // Forced shutdown behaves like a power-off: joints
                    // stop, the session clock pauses
                    self.joints.zero_all();
                    self.session.pause(now_ms());
                    events.push(SimEvent::AlertRaised);
                    events.push(SimEvent::FlushRequested(FlushReason::Dead));
                }
                PowerEvent::ChargeComplete => {
                    events.push(SimEvent::CycleCompleted);
                    events.push(SimEvent::FlushRequested(FlushReason::Charged));
                }
                PowerEvent::AlertCleared => events.push(SimEvent::AlertCleared),
            }
        }

        self.vitals.update(self.state.speed, dt);

        let status = self.state.status(input.charging);
        self.recorder.maybe_record_packet(
            self.sim_time,
            &self.state,
            status,
            input.any_active(),
            &self.settings,
        );

        let travelled = update_motion(&mut self.state, &self.settings, input, dt);
        self.session.add_distance(travelled);

        if self.state.powered {
            self.joints
                .apply_input(&input.joints, self.settings.joint_speed, dt);
            self.state.joint_angles.accumulate(&self.joints);
        }

        let (lat, lon) = self.geo.project(&self.state.position);
        self.recorder
            .maybe_record_path(self.sim_time, &self.state, lat, lon, &self.settings);

        TickOutcome {
            snapshot: self.state.clone(),
            action: self.state.action(),
            events,
        }
    }

    /// User power toggle. Returns the events the toggle produced.
    pub fn set_powered(&mut self, on: bool, now_ms: u64) -> Vec<SimEvent> {
        if on == self.state.powered {
            return Vec::new();
        }

        if on {
            info!("System power on");
            self.state.powered = true;
            self.session.resume(now_ms, self.state.battery);
            Vec::new()
        } else {
            info!("System power off");
            self.state.powered = false;
            self.joints.zero_all();
            self.session.pause(now_ms);
            vec![SimEvent::FlushRequested(FlushReason::PowerOff)]
        }
    }

    /// Assemble a full-snapshot flush payload.
    ///
    /// Checkpoint reasons roll session state into fleet totals: pending
    /// cycles always fold; distance folds (with a RunRecord) only when the
    /// session moved past the noise threshold. AUTO flushes mutate nothing.
    pub fn build_flush_payload(&mut self, reason: FlushReason) -> FlushPayload {
        let pending = self.power.pending_cycles();
        let consumed = self.session.battery_consumed(self.state.battery);

        let mut payload = FlushPayload::new(reason);
        payload.battery = self.state.battery;
        payload.velocity = self.state.speed;
        payload.total_cycles = self.fleet.total_cycles + pending;
        payload.total_distance = self.total_distance();
        payload.session_distance = self.session.distance();
        payload.session_cycles = pending;
        payload.battery_consumed = consumed;
        payload.vitals = self.vitals.clone();
        payload.joints = self.state.joint_angles;
        payload.path = self.recorder.path_tail();

        if reason.is_checkpoint() {
            let folded = self.power.take_pending_cycles();
            self.fleet.total_cycles += folded;

            if self.session.distance() > RUN_DISTANCE_THRESHOLD {
                self.history
                    .push(RunRecord::new(self.session.distance().floor(), consumed));
                self.fleet.total_distance += self.session.distance();
                self.session.reset_after_checkpoint(self.state.battery);
                self.recorder.clear_path();
            }
        }

        payload.history = self.history.to_vec();
        payload
    }

    /// Serialize the packet ring buffer for download.
    pub fn export_packet_log(&self) -> Result<String> {
        self.recorder.export_packets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn forward_input() -> ControlInput {
        ControlInput {
            forward: true,
            ..ControlInput::default()
        }
    }

    fn charge_input() -> ControlInput {
        ControlInput {
            charging: true,
            ..ControlInput::default()
        }
    }

    fn walk_for(ctx: &mut SimulationContext, seconds: f64) -> Vec<SimEvent> {
        let ticks = (seconds / DT).round() as usize;
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(ctx.tick(&forward_input(), DT).events);
        }
        events
    }

    #[test]
    fn test_walk_drain_end_to_end() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        walk_for(&mut ctx, 10.0);
        // 10 s of walking at 0.10 %/s, within ramp-up tolerance
        assert!((ctx.state().battery - 99.0).abs() < 0.05);
        assert!(ctx.session_distance() > 30.0);
    }

    #[test]
    fn test_charge_end_to_end_fires_one_charged_flush() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        ctx.state.battery = 0.0;
        ctx.state.powered = false;

        let seconds = 100.0 / ctx.settings().charge_rate + 1.0;
        let ticks = (seconds / DT).round() as usize;
        let mut charged_flushes = 0;
        for _ in 0..ticks {
            let outcome = ctx.tick(&charge_input(), DT);
            charged_flushes += outcome
                .events
                .iter()
                .filter(|e| **e == SimEvent::FlushRequested(FlushReason::Charged))
                .count();
        }

        assert_eq!(ctx.state().battery, 100.0);
        assert_eq!(charged_flushes, 1);
        assert_eq!(ctx.total_cycles(), 1);
    }

    #[test]
    fn test_dead_battery_emits_alert_and_dead_flush() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        ctx.state.battery = 0.005;
        let outcome = ctx.tick(&forward_input(), DT);
        assert!(outcome.events.contains(&SimEvent::AlertRaised));
        assert!(outcome
            .events
            .contains(&SimEvent::FlushRequested(FlushReason::Dead)));
        assert!(!ctx.state().powered);
        assert!(ctx.battery_alert_active());
        // Joint offsets zeroed by the forced shutdown
        assert_eq!(ctx.joints().forearm, 0.0);
    }

    #[test]
    fn test_auto_flush_is_pure_snapshot() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        walk_for(&mut ctx, 5.0);
        let dist_before = ctx.session_distance();
        assert!(dist_before > RUN_DISTANCE_THRESHOLD);

        let payload = ctx.build_flush_payload(FlushReason::Auto);
        assert!(payload.history.is_empty());
        assert_eq!(ctx.run_history().len(), 0);
        assert_eq!(ctx.fleet().total_distance, 0.0);
        assert!((ctx.session_distance() - dist_before).abs() < 1e-9);
    }

    #[test]
    fn test_checkpoint_flush_rolls_session_into_fleet() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        walk_for(&mut ctx, 5.0);
        let dist = ctx.session_distance();
        assert!(dist > RUN_DISTANCE_THRESHOLD);

        let payload = ctx.build_flush_payload(FlushReason::PowerOff);
        assert_eq!(payload.history.len(), 1);
        assert_eq!(payload.history[0].distance_m, dist.floor());
        assert!((payload.session_distance - dist).abs() < 1e-9);

        assert_eq!(ctx.run_history().len(), 1);
        assert!((ctx.fleet().total_distance - dist).abs() < 1e-9);
        assert_eq!(ctx.session_distance(), 0.0);
        assert_eq!(ctx.recorder().path_len(), 0);
    }

    #[test]
    fn test_short_session_checkpoint_keeps_distance_out_of_history() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        walk_for(&mut ctx, 0.5);
        let dist = ctx.session_distance();
        assert!(dist < RUN_DISTANCE_THRESHOLD);

        ctx.build_flush_payload(FlushReason::PowerOff);
        assert_eq!(ctx.run_history().len(), 0);
        assert_eq!(ctx.fleet().total_distance, 0.0);
        // Below threshold nothing folds; the session keeps accruing
        assert!((ctx.session_distance() - dist).abs() < 1e-9);
    }

    #[test]
    fn test_power_toggle_zeroes_joints_and_requests_flush() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        let events = ctx.set_powered(false, 1_000);
        assert_eq!(events, vec![SimEvent::FlushRequested(FlushReason::PowerOff)]);
        assert_eq!(ctx.joints().shoulder, 0.0);
        assert_eq!(ctx.joints().forearm, 0.0);

        // Toggling on again emits nothing and re-baselines the session
        let events = ctx.set_powered(true, 5_000);
        assert!(events.is_empty());
        assert!(ctx.state().powered);

        // Redundant toggle is a no-op
        assert!(ctx.set_powered(true, 6_000).is_empty());
    }

    #[test]
    fn test_unpowered_robot_does_not_move_or_pose() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        ctx.set_powered(false, 0);

        let input = ControlInput {
            forward: true,
            joints: crate::types::sim_types::JointInput {
                shoulder_up: true,
                ..Default::default()
            },
            ..ControlInput::default()
        };
        for _ in 0..60 {
            ctx.tick(&input, DT);
        }
        assert_eq!(ctx.state().speed, 0.0);
        assert_eq!(ctx.session_distance(), 0.0);
        assert_eq!(ctx.joints().shoulder, 0.0);
    }

    #[test]
    fn test_path_samples_appear_while_walking() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        walk_for(&mut ctx, 7.0);
        // 2 s cadence, minus the ramp-up before speed crosses the epsilon
        let len = ctx.recorder().path_len();
        assert!((2..=3).contains(&len), "unexpected path len {}", len);

        let payload = ctx.build_flush_payload(FlushReason::Auto);
        assert_eq!(payload.path.len(), len);
    }

    #[test]
    fn test_charged_flush_folds_cycles_without_distance() {
        let mut ctx = SimulationContext::new(SimSettings::default());
        ctx.state.battery = 100.0;
        ctx.tick(&charge_input(), DT);
        assert_eq!(ctx.total_cycles(), 1);

        let payload = ctx.build_flush_payload(FlushReason::Charged);
        assert_eq!(payload.session_cycles, 1);
        assert_eq!(payload.total_cycles, 1);
        // Folded into the fleet; total stays the same
        assert_eq!(ctx.fleet().total_cycles, 1);
        assert_eq!(ctx.total_cycles(), 1);

        let payload = ctx.build_flush_payload(FlushReason::Charged);
        assert_eq!(payload.session_cycles, 0);
        assert_eq!(payload.total_cycles, 1);
    }
}
