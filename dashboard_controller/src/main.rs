use eyre::Result;
use humanoid_sim_lib::{
    init_tracing, now_ms, ControlInput, FleetAggregate, FlushPayload, FlushReason, JointInput,
    SimEvent, SimSettings, SimulationContext,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod store;
use store::store_from_env;

/// Simulated frame delta driven by the tick interval
const TICK_DT: f64 = 1.0 / 60.0;

/// AUTO flush timer period
const AUTO_FLUSH_SECS: u64 = 15;

/// AUTO flushes only fire once the session has moved this far (meters).
/// Keeps a stationary session from spamming the store.
const AUTO_FLUSH_MIN_DISTANCE: f64 = 10.0;

const CONFIG_PATH: &str = "config/simulation.toml";

/// Latched key state, toggled by stdin commands. Plays the role of the
/// browser's pressed-key map: the simulation only ever sees the resulting
/// `ControlInput` flags.
#[derive(Debug, Default)]
struct KeyState {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    run: bool,
    charging: bool,
    joints: JointInput,
}

impl KeyState {
    fn control_input(&self) -> ControlInput {
        ControlInput {
            forward: self.forward,
            backward: self.backward,
            left: self.left,
            right: self.right,
            run: self.run,
            charging: self.charging,
            joints: self.joints,
        }
    }

    /// Toggle the binding for a single key. Returns false when the key is
    /// not a movement/joint binding.
    fn toggle(&mut self, key: &str) -> bool {
        match key {
            "w" => self.forward = !self.forward,
            "s" => self.backward = !self.backward,
            "a" => self.left = !self.left,
            "d" => self.right = !self.right,
            "r" => self.run = !self.run,
            "e" => self.charging = !self.charging,
            "t" => self.joints.shoulder_up = !self.joints.shoulder_up,
            "g" => self.joints.shoulder_down = !self.joints.shoulder_down,
            "y" => self.joints.arm_up = !self.joints.arm_up,
            "h" => self.joints.arm_down = !self.joints.arm_down,
            "u" => self.joints.forearm_up = !self.joints.forearm_up,
            "j" => self.joints.forearm_down = !self.joints.forearm_down,
            "i" => self.joints.hand_up = !self.joints.hand_up,
            "k" => self.joints.hand_down = !self.joints.hand_down,
            _ => return false,
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing();

    info!("Starting dashboard controller node...");

    let settings = match SimSettings::load_from_file(CONFIG_PATH) {
        Ok(settings) => {
            info!("Loaded settings from {}", CONFIG_PATH);
            settings
        }
        Err(e) => {
            info!("Using default settings ({})", e);
            SimSettings::default()
        }
    };

    let store = store_from_env();

    // Seed fleet totals and run history from prior checkpoint documents
    let docs = match store.load_documents() {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Could not load telemetry history: {}", e);
            Vec::new()
        }
    };
    let (fleet, history) = FleetAggregate::seed_from_documents(&docs);
    info!(
        "Seeded {} run records, {:.0} m fleet distance, {} cycles",
        history.len(),
        fleet.total_distance,
        fleet.total_cycles
    );

    let mut ctx = SimulationContext::with_seed(settings, fleet, history);

    // Store writes are fire-and-forget: payloads cross this channel and the
    // tick loop never waits on the write
    let (flush_tx, mut flush_rx) = mpsc::unbounded_channel::<FlushPayload>();
    let store_task = {
        let store = store.clone();
        tokio::spawn(async move {
            while let Some(payload) = flush_rx.recv().await {
                match store.append(&payload) {
                    Ok(()) => debug!("Stored {:?} flush", payload.reason),
                    // Best-effort telemetry: log and drop, no retry
                    Err(e) => warn!("Telemetry write failed, dropping {:?} flush: {}", payload.reason, e),
                }
            }
        })
    };

    // Stdin command reader
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if cmd_tx.send(line).is_err() {
                break;
            }
        }
    });

    info!("Dashboard controller initialized");
    info!("Commands (toggle on/off):");
    info!("  w/s - walk forward/backward, a/d - turn left/right");
    info!("  r - run, e - charge");
    info!("  t/g y/h u/j i/k - shoulder/arm/forearm/hand up/down");
    info!("  p - power, f - manual flush, x - export packet log, q - quit");
    info!("  gps <lat> <lon> - adopt a GPS fix (no args marks fix unavailable)");
    info!("  idle/walk <x> - drain multiplier sliders");

    let mut keys = KeyState::default();
    let mut tick = tokio::time::interval(Duration::from_secs_f64(TICK_DT));
    let mut auto_flush = tokio::time::interval(Duration::from_secs(AUTO_FLUSH_SECS));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let outcome = ctx.tick(&keys.control_input(), TICK_DT);
                for event in outcome.events {
                    match event {
                        SimEvent::FlushRequested(reason) => {
                            let payload = ctx.build_flush_payload(reason);
                            if flush_tx.send(payload).is_err() {
                                warn!("Store task gone, {:?} flush dropped", reason);
                            }
                        }
                        SimEvent::AlertRaised => warn!("BATTERY DEPLETED - system offline"),
                        SimEvent::AlertCleared => info!("Battery alert cleared"),
                        SimEvent::CycleCompleted => {
                            info!("Charge cycle complete ({} total)", ctx.total_cycles());
                        }
                    }
                }
            }
            _ = auto_flush.tick() => {
                if ctx.state().powered && ctx.session_distance() > AUTO_FLUSH_MIN_DISTANCE {
                    let payload = ctx.build_flush_payload(FlushReason::Auto);
                    if flush_tx.send(payload).is_err() {
                        warn!("Store task gone, AUTO flush dropped");
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(line) => {
                        if !handle_command(line.trim(), &mut keys, &mut ctx, &flush_tx) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    info!("Shutting down");
    drop(flush_tx);
    store_task.await.ok();
    Ok(())
}

/// Process one stdin command. Returns false to quit.
fn handle_command(
    line: &str,
    keys: &mut KeyState,
    ctx: &mut SimulationContext,
    flush_tx: &mpsc::UnboundedSender<FlushPayload>,
) -> bool {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        Some(cmd) => cmd,
        None => return true,
    };

    match cmd {
        "q" => return false,
        "p" => {
            let turn_on = !ctx.state().powered;
            for event in ctx.set_powered(turn_on, now_ms()) {
                if let SimEvent::FlushRequested(reason) = event {
                    let payload = ctx.build_flush_payload(reason);
                    if flush_tx.send(payload).is_err() {
                        warn!("Store task gone, {:?} flush dropped", reason);
                    }
                }
            }
        }
        "f" => {
            let payload = ctx.build_flush_payload(FlushReason::Manual);
            if flush_tx.send(payload).is_err() {
                warn!("Store task gone, manual flush dropped");
            }
        }
        "x" => match export_packet_log(ctx) {
            Ok(path) => info!("Packet log exported to {}", path),
            Err(e) => warn!("Export failed: {}", e),
        },
        "gps" => {
            let lat = parts.next().and_then(|v| v.parse::<f64>().ok());
            let lon = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    ctx.geo_mut().set_fix(lat, lon);
                    info!("GPS fix acquired at ({:.4}, {:.4})", lat, lon);
                }
                // Failed acquisition keeps the default anchor
                _ => {
                    ctx.geo_mut().mark_unavailable();
                    warn!("GPS fix unavailable, keeping default anchor");
                }
            }
        }
        "idle" | "walk" => match parts.next().and_then(|v| v.parse::<f64>().ok()) {
            Some(value) if value >= 0.0 => {
                if cmd == "idle" {
                    ctx.settings_mut().idle_multiplier = value;
                } else {
                    ctx.settings_mut().walk_multiplier = value;
                }
                info!("{} drain multiplier set to {:.1}x", cmd, value);
            }
            _ => warn!("Usage: {} <multiplier>", cmd),
        },
        other => {
            if keys.toggle(other) {
                debug!("Key '{}' toggled", other);
            } else {
                debug!("Unknown command '{}'", other);
            }
        }
    }
    true
}

fn export_packet_log(ctx: &SimulationContext) -> Result<String> {
    let json = ctx.export_packet_log()?;
    let path = format!("robot_log_{}.json", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    std::fs::write(&path, json)?;
    Ok(path)
}
