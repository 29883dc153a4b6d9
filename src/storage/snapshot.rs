//! Whole-store snapshots persisted as JSON with atomic writes.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{AccountingPeriod, Client, SignoffRecord};
use crate::errors::StorageError;
use crate::storage::{DocumentRow, PeriodSetupRow};

pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Serializable image of every committed table.
pub struct StoreSnapshot {
    #[serde(default = "StoreSnapshot::schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub periods: Vec<AccountingPeriod>,
    #[serde(default)]
    pub setups: Vec<PeriodSetupRow>,
    #[serde(default)]
    pub documents: Vec<DocumentRow>,
    #[serde(default)]
    pub signoffs: Vec<SignoffRecord>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            clients: Vec::new(),
            periods: Vec::new(),
            setups: Vec::new(),
            documents: Vec::new(),
            signoffs: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    pub fn schema_version_default() -> u8 {
        SNAPSHOT_SCHEMA_VERSION
    }
}

/// Writes the snapshot to disk atomically by staging to a temporary file.
pub fn save_snapshot_to_path(snapshot: &StoreSnapshot, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&tmp, json)?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Loads a snapshot from disk, rejecting images written by a newer schema.
pub fn load_snapshot_from_path(path: &Path) -> Result<StoreSnapshot, StorageError> {
    let data = fs::read_to_string(path)?;
    let snapshot: StoreSnapshot = serde_json::from_str(&data)?;
    if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
        return Err(StorageError::Persistence(format!(
            "snapshot schema v{} is newer than supported v{}",
            snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION
        )));
    }
    Ok(snapshot)
}
