//! State persistence for saving and restoring battery state between sessions
//!
//! The engine never talks to storage directly: every mutating operation emits
//! a state-changed notification, and the [`SnapshotWriter`] adapter consumes
//! those notifications and writes one snapshot per change. On attach, the
//! engine restores from the last snapshot the store still holds.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use crate::battery::{BatteryEvent, EventType};
use crate::errors::RestoreError;
use crate::registry::EngineRegistry;

/// Persisted attribute key for the discharge window
pub const ATTR_DISCHARGE_DAYS: &str = "discharge_days";

/// Persisted attribute key for the reset origin timestamp
pub const ATTR_LAST_RESET: &str = "last_reset";

/// Persisted attribute key for the most recent recompute timestamp
pub const ATTR_LAST_UPDATE: &str = "last_update";

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, String>;

/// One persisted snapshot: the primary value plus string-keyed attributes
///
/// This mirrors the host store's opaque representation: the level is a string
/// rounded to two decimals, timestamps are RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    /// Primary state value (the battery level)
    pub state: String,

    /// String-keyed attributes
    pub attributes: HashMap<String, String>,
}

impl PersistedSnapshot {
    /// Build a snapshot from engine state fields
    pub fn from_fields(
        level: f64,
        discharge_days: u32,
        last_reset: DateTime<Utc>,
        last_update: DateTime<Utc>,
    ) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_DISCHARGE_DAYS.to_string(), discharge_days.to_string());
        attributes.insert(ATTR_LAST_RESET.to_string(), last_reset.to_rfc3339());
        attributes.insert(ATTR_LAST_UPDATE.to_string(), last_update.to_rfc3339());

        Self {
            state: format!("{:.2}", level),
            attributes,
        }
    }

    /// Parse the primary value as a finite battery level
    pub fn parse_level(&self) -> std::result::Result<f64, RestoreError> {
        match self.state.as_str() {
            "" | "unknown" | "unavailable" => {
                return Err(RestoreError::InvalidNumber(self.state.clone()))
            }
            _ => {}
        }

        let level: f64 = self
            .state
            .parse()
            .map_err(|_| RestoreError::InvalidNumber(self.state.clone()))?;

        if !level.is_finite() {
            return Err(RestoreError::NonFiniteValue);
        }
        Ok(level)
    }

    /// Parse the `last_reset` attribute
    pub fn parse_last_reset(&self) -> std::result::Result<DateTime<Utc>, RestoreError> {
        self.parse_timestamp(ATTR_LAST_RESET)
    }

    /// Parse the `last_update` attribute
    pub fn parse_last_update(&self) -> std::result::Result<DateTime<Utc>, RestoreError> {
        self.parse_timestamp(ATTR_LAST_UPDATE)
    }

    /// Parse the `discharge_days` attribute
    pub fn parse_discharge_days(&self) -> std::result::Result<u32, RestoreError> {
        let raw = self
            .attributes
            .get(ATTR_DISCHARGE_DAYS)
            .ok_or(RestoreError::MissingAttribute(ATTR_DISCHARGE_DAYS))?;

        let days: u32 = raw
            .parse()
            .map_err(|_| RestoreError::InvalidNumber(raw.clone()))?;

        if days < 1 {
            return Err(RestoreError::InvalidNumber(raw.clone()));
        }
        Ok(days)
    }

    fn parse_timestamp(&self, key: &'static str) -> std::result::Result<DateTime<Utc>, RestoreError> {
        let raw = self
            .attributes
            .get(key)
            .ok_or(RestoreError::MissingAttribute(key))?;

        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| RestoreError::InvalidTimestamp(raw.clone()))
    }
}

/// Storage backend for persisted snapshots
///
/// The read happens once at attach time; writes are driven by state-changed
/// notifications, never streamed.
pub trait StateStore: Send + Sync {
    /// Return the last snapshot for an entity, if one exists
    fn restore(&self, entity_key: &str) -> Option<PersistedSnapshot>;

    /// Persist a snapshot for an entity
    fn write(&self, entity_key: &str, snapshot: &PersistedSnapshot) -> Result<()>;
}

/// On-disk store keeping one JSON file per entity
pub struct JsonFileStore {
    /// Directory holding the snapshot files
    store_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at the platform data directory
    pub fn new() -> Self {
        let store_dir = Self::default_store_dir()
            .unwrap_or_else(|_| PathBuf::from("virtual_battery_state"));

        Self { store_dir }
    }

    /// Create a store rooted at an explicit directory
    pub fn with_dir(store_dir: PathBuf) -> Self {
        Self { store_dir }
    }

    /// Check if a snapshot file exists for an entity
    pub fn snapshot_exists(&self, entity_key: &str) -> bool {
        self.snapshot_path(entity_key).exists()
    }

    /// Delete the snapshot file for an entity
    pub fn delete(&self, entity_key: &str) -> Result<()> {
        let path = self.snapshot_path(entity_key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| format!("Failed to delete snapshot file: {}", e))?;

            log::info!("Deleted persisted snapshot for {}", entity_key);
        }

        Ok(())
    }

    fn snapshot_path(&self, entity_key: &str) -> PathBuf {
        // Entity keys are config-entry ids; no path separators expected
        self.store_dir.join(format!("{}.json", entity_key))
    }

    fn default_store_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| "Could not determine local data directory".to_string())?;

        Ok(data_dir.join("virtual-battery"))
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for JsonFileStore {
    fn restore(&self, entity_key: &str) -> Option<PersistedSnapshot> {
        let path = self.snapshot_path(entity_key);
        if !path.exists() {
            return None;
        }

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("Failed to read snapshot file for {}: {}", entity_key, err);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::warn!("Failed to parse snapshot file for {}: {}", entity_key, err);
                None
            }
        }
    }

    fn write(&self, entity_key: &str, snapshot: &PersistedSnapshot) -> Result<()> {
        if !self.store_dir.exists() {
            fs::create_dir_all(&self.store_dir)
                .map_err(|e| format!("Failed to create snapshot directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;

        fs::write(self.snapshot_path(entity_key), json)
            .map_err(|e| format!("Failed to write snapshot file: {}", e))?;

        Ok(())
    }
}

/// In-memory store for tests and ephemeral setups
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, PersistedSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots currently held
    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().unwrap().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn restore(&self, entity_key: &str) -> Option<PersistedSnapshot> {
        self.snapshots.lock().unwrap().get(entity_key).cloned()
    }

    fn write(&self, entity_key: &str, snapshot: &PersistedSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(entity_key.to_string(), snapshot.clone());
        Ok(())
    }
}

/// Persistence adapter consuming state-changed notifications
///
/// Subscribes to the event broker and snapshots the originating engine on
/// every notification. Decouples the engine from storage timing entirely.
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Spawn the writer task
    ///
    /// The receiver should be subscribed with
    /// [`crate::battery::EventFilter::state_changes_only`].
    pub fn spawn(
        mut rx: Receiver<BatteryEvent>,
        registry: EngineRegistry,
        store: std::sync::Arc<dyn StateStore>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if event.get_type() != EventType::StateChanged {
                    continue;
                }

                let entity_id = event.entity_id().to_string();
                let snapshot = registry
                    .find(&entity_id)
                    .map(|engine| engine.lock().unwrap().snapshot());

                match snapshot {
                    Some(snapshot) => {
                        if let Err(err) = store.write(&entity_id, &snapshot) {
                            log::warn!("Failed to persist snapshot for {}: {}", entity_id, err);
                        }
                    }
                    None => {
                        // Entity already unloaded; the notification raced teardown
                        log::debug!("State change for unknown entity {}", entity_id);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_snapshot() -> PersistedSnapshot {
        let reset = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        PersistedSnapshot::from_fields(73.456, 30, reset, reset + chrono::Duration::hours(2))
    }

    #[test]
    fn test_snapshot_fields() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.state, "73.46");
        assert_eq!(snapshot.attributes[ATTR_DISCHARGE_DAYS], "30");
        assert!(snapshot.attributes[ATTR_LAST_RESET].starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn test_snapshot_parses_back() {
        let snapshot = sample_snapshot();

        assert!((snapshot.parse_level().unwrap() - 73.46).abs() < 1e-9);
        assert_eq!(snapshot.parse_discharge_days().unwrap(), 30);
        assert_eq!(
            snapshot.parse_last_reset().unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap()
        );
    }

    #[test]
    fn test_unusable_state_values() {
        let mut snapshot = sample_snapshot();

        for bad in ["", "unknown", "unavailable", "not-a-number"] {
            snapshot.state = bad.to_string();
            assert!(snapshot.parse_level().is_err(), "accepted {:?}", bad);
        }

        snapshot.state = "inf".to_string();
        assert_eq!(snapshot.parse_level(), Err(RestoreError::NonFiniteValue));
    }

    #[test]
    fn test_missing_attributes() {
        let mut snapshot = sample_snapshot();
        snapshot.attributes.remove(ATTR_LAST_RESET);

        assert_eq!(
            snapshot.parse_last_reset(),
            Err(RestoreError::MissingAttribute(ATTR_LAST_RESET))
        );
    }

    #[test]
    fn test_invalid_discharge_days() {
        let mut snapshot = sample_snapshot();
        snapshot
            .attributes
            .insert(ATTR_DISCHARGE_DAYS.to_string(), "0".to_string());
        assert!(snapshot.parse_discharge_days().is_err());

        snapshot
            .attributes
            .insert(ATTR_DISCHARGE_DAYS.to_string(), "thirty".to_string());
        assert!(snapshot.parse_discharge_days().is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.restore("battery_1").is_none());

        let snapshot = sample_snapshot();
        store.write("battery_1", &snapshot).unwrap();

        assert_eq!(store.restore("battery_1"), Some(snapshot));
        assert_eq!(store.len(), 1);
    }
}
