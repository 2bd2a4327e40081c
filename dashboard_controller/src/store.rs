// Telemetry store collaborators: a JSON-lines file store and the offline
// no-op fallback. Flushes are best-effort; nothing here retries.

use eyre::Result;
use humanoid_sim_lib::FlushPayload;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Environment variable selecting the store file. Absent means offline.
pub const STORE_PATH_ENV: &str = "TELEMETRY_STORE_PATH";

/// Document store the flush task writes to and the node seeds from.
pub trait TelemetryStore: Send + Sync {
    fn append(&self, payload: &FlushPayload) -> Result<()>;
    fn load_documents(&self) -> Result<Vec<FlushPayload>>;
}

/// Append-only JSON-lines file, one flush document per line.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TelemetryStore for JsonFileStore {
    fn append(&self, payload: &FlushPayload) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(payload)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn load_documents(&self) -> Result<Vec<FlushPayload>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FlushPayload>(&line) {
                Ok(doc) => docs.push(doc),
                // A corrupt line loses one document, not the whole history
                Err(e) => warn!("Skipping unreadable store document: {}", e),
            }
        }
        Ok(docs)
    }
}

/// Offline mode: every operation is a no-op. Warns exactly once and keeps
/// a count of skipped writes.
pub struct OfflineStore {
    warned: AtomicBool,
    skipped: AtomicU64,
}

impl OfflineStore {
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn skipped_writes(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl TelemetryStore for OfflineStore {
    fn append(&self, _payload: &FlushPayload) -> Result<()> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("Running in offline mode: telemetry writes are skipped");
        }
        self.skipped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn load_documents(&self) -> Result<Vec<FlushPayload>> {
        Ok(Vec::new())
    }
}

/// Pick the store implementation from the environment.
pub fn store_from_env() -> Arc<dyn TelemetryStore> {
    match env::var(STORE_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            info!("Telemetry store: {}", path);
            Arc::new(JsonFileStore::new(PathBuf::from(path)))
        }
        _ => Arc::new(OfflineStore::new()),
    }
}
