// Session tracking: per-session distance and battery baseline, plus the
// pause/resume clock shift so elapsed-time rates ignore powered-off gaps.

use tracing::debug;

/// Per-session accumulators. A checkpoint flush rolls these into fleet
/// totals and resets them.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    distance: f64,
    start_battery: f64,
    started_at_ms: u64,
    paused_at_ms: Option<u64>,
}

impl SessionTracker {
    pub fn new(now_ms: u64, battery: f64) -> Self {
        Self {
            distance: 0.0,
            start_battery: battery,
            started_at_ms: now_ms,
            paused_at_ms: None,
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn add_distance(&mut self, meters: f64) {
        self.distance += meters;
    }

    /// Battery spent since the session baseline, clamped at zero (charging
    /// past the baseline does not produce negative consumption).
    pub fn battery_consumed(&self, current_battery: f64) -> f64 {
        (self.start_battery - current_battery).max(0.0)
    }

    /// Session elapsed time in milliseconds, excluding completed pauses.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }

    /// Record the instant power went off.
    pub fn pause(&mut self, now_ms: u64) {
        self.paused_at_ms = Some(now_ms);
    }

    /// Power back on: shift the session start forward by the paused
    /// duration and re-baseline battery at the current level.
    pub fn resume(&mut self, now_ms: u64, current_battery: f64) {
        if let Some(paused_at) = self.paused_at_ms.take() {
            let pause_duration = now_ms.saturating_sub(paused_at);
            self.started_at_ms += pause_duration;
            debug!("Session clock shifted by {} ms pause", pause_duration);
        }
        self.start_battery = current_battery;
    }

    /// Checkpoint flush: clear distance and re-baseline battery.
    pub fn reset_after_checkpoint(&mut self, current_battery: f64) {
        self.distance = 0.0;
        self.start_battery = current_battery;
    }
}
