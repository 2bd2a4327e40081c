// Motion state: directional flags -> smoothed speed, heading, position,
// and accumulated session distance.

use crate::types::config::SimSettings;
use crate::types::sim_types::{ControlInput, SimulationState};
use nalgebra::Vector2;

/// Speeds below this magnitude are treated as standing still
pub const MOTION_EPSILON: f64 = 0.1;

/// Exponential smoothing rate toward the target speed (1/s)
const SPEED_SMOOTHING_RATE: f64 = 5.0;

/// Advance speed, heading, and position one tick.
///
/// Returns the distance travelled this tick (meters, always >= 0).
/// While unpowered the speed is forced to zero and nothing moves.
pub fn update_motion(
    state: &mut SimulationState,
    settings: &SimSettings,
    input: &ControlInput,
    dt: f64,
) -> f64 {
    if !state.powered {
        state.speed = 0.0;
        return 0.0;
    }

    // Forward wins the tie if both directions are held
    let mut target = if input.forward {
        settings.walk_speed
    } else if input.backward {
        -settings.reverse_speed
    } else {
        0.0
    };
    if input.run {
        target *= settings.run_factor;
    }

    // Exponential smoothing; the factor is capped so a large dt cannot
    // overshoot the target
    let factor = (dt * SPEED_SMOOTHING_RATE).min(1.0);
    state.speed += (target - state.speed) * factor;

    if input.left {
        state.heading_rad += settings.turn_speed * dt;
    }
    if input.right {
        state.heading_rad -= settings.turn_speed * dt;
    }

    // Heading turns in the x/z ground plane; heading 0 faces +z
    let direction = Vector2::new(state.heading_rad.sin(), state.heading_rad.cos());
    let step = state.speed * dt;
    state.position += direction * step;

    if state.speed.abs() > MOTION_EPSILON {
        step.abs()
    } else {
        0.0
    }
}
