use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Directional and joint control flags for one tick.
///
/// The node layer owns key state; the simulation only sees these flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ControlInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
    pub charging: bool,
    pub joints: JointInput,
}

impl ControlInput {
    /// Whether any control input is active. Drives the fast packet cadence.
    pub fn any_active(&self) -> bool {
        self.forward
            || self.backward
            || self.left
            || self.right
            || self.run
            || self.charging
            || self.joints.any_active()
    }
}

/// Per-joint up/down key flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JointInput {
    pub shoulder_up: bool,
    pub shoulder_down: bool,
    pub arm_up: bool,
    pub arm_down: bool,
    pub forearm_up: bool,
    pub forearm_down: bool,
    pub hand_up: bool,
    pub hand_down: bool,
}

impl JointInput {
    pub fn any_active(&self) -> bool {
        self.shoulder_up
            || self.shoulder_down
            || self.arm_up
            || self.arm_down
            || self.forearm_up
            || self.forearm_down
            || self.hand_up
            || self.hand_down
    }
}

/// Per-tick incremental rotation applied to the four controllable joints.
///
/// The render collaborator adds these onto the base bone rotations each
/// tick. All four are zeroed the instant power goes off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JointOffsets {
    pub shoulder: f64,
    pub arm: f64,
    pub forearm: f64,
    pub hand: f64,
}

impl Default for JointOffsets {
    fn default() -> Self {
        // Rest pose keeps the forearm slightly bent
        Self {
            shoulder: 0.0,
            arm: 0.0,
            forearm: -0.3,
            hand: 0.0,
        }
    }
}

impl JointOffsets {
    pub fn zero_all(&mut self) {
        self.shoulder = 0.0;
        self.arm = 0.0;
        self.forearm = 0.0;
        self.hand = 0.0;
    }

    /// Adjust offsets from held joint keys. Sign convention follows the
    /// rig: "up" raises the shoulder and hand but flexes arm and forearm
    /// toward the body.
    pub fn apply_input(&mut self, input: &JointInput, joint_speed: f64, dt: f64) {
        let step = joint_speed * dt;
        if input.shoulder_up {
            self.shoulder += step;
        }
        if input.shoulder_down {
            self.shoulder -= step;
        }
        if input.arm_up {
            self.arm -= step;
        }
        if input.arm_down {
            self.arm += step;
        }
        if input.forearm_up {
            self.forearm -= step;
        }
        if input.forearm_down {
            self.forearm += step;
        }
        if input.hand_up {
            self.hand += step;
        }
        if input.hand_down {
            self.hand -= step;
        }
    }
}

/// Accumulated bone rotations reported in telemetry (radians).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub shoulder: f64,
    pub arm: f64,
    pub forearm: f64,
    pub hand: f64,
}

impl JointAngles {
    /// Fold the current offsets into the accumulated rotations, as the
    /// renderer does when posing the skeleton each frame.
    pub fn accumulate(&mut self, offsets: &JointOffsets) {
        self.shoulder += offsets.shoulder;
        self.arm += offsets.arm;
        self.forearm += offsets.forearm;
        self.hand += offsets.hand;
    }
}

/// Robot status reported in telemetry packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotStatus {
    Running,
    Charging,
    Offline,
}

/// Animation action the render collaborator should blend toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionAction {
    Idle,
    Walk,
    Run,
}

/// Blend duration when switching actions (seconds).
pub const ACTION_FADE_SECS: f64 = 0.2;

impl MotionAction {
    pub fn for_speed(speed: f64) -> Self {
        let mag = speed.abs();
        if mag > 4.0 {
            MotionAction::Run
        } else if mag > 0.1 {
            MotionAction::Walk
        } else {
            MotionAction::Idle
        }
    }
}

/// Mutable snapshot of the robot at an instant.
///
/// Single writer: the simulation context mutates this every tick. Render
/// collaborators receive clones.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub powered: bool,
    /// Battery charge, always clamped to [0, 100]
    pub battery: f64,
    /// Smoothed signed speed (m/s)
    pub speed: f64,
    /// Position on the ground plane (x, z) in meters
    pub position: Vector2<f64>,
    /// Heading about the vertical axis (radians)
    pub heading_rad: f64,
    /// Accumulated bone rotations for telemetry
    pub joint_angles: JointAngles,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            powered: true,
            battery: 100.0,
            speed: 0.0,
            position: Vector2::zeros(),
            heading_rad: 0.0,
            joint_angles: JointAngles::default(),
        }
    }

    pub fn status(&self, charging: bool) -> RobotStatus {
        if self.powered {
            RobotStatus::Running
        } else if charging {
            RobotStatus::Charging
        } else {
            RobotStatus::Offline
        }
    }

    pub fn action(&self) -> MotionAction {
        MotionAction::for_speed(self.speed)
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}
