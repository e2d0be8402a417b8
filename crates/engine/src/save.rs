use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::world::{WorldState, REPUTATION_MAX, REPUTATION_MIN};

pub const SAVE_FORMAT_VERSION: u32 = 1;

pub type SaveLoadResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub format_version: u32,
    pub saved_at_unix: u64,
    pub label: String,
    pub state: WorldState,
}

/// All slots live in one JSON blob on disk; every operation reads and
/// rewrites the whole file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SaveBlob {
    slots: BTreeMap<u32, SaveRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotSummary {
    pub slot: u32,
    pub label: String,
    pub saved_at_unix: u64,
}

#[derive(Debug)]
pub struct SaveBank {
    path: PathBuf,
}

impl SaveBank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save_to_slot(&self, slot: u32, label: &str, state: &WorldState) -> SaveLoadResult<()> {
        let mut blob = self.read_blob_or_default()?;
        let saved_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        blob.slots.insert(
            slot,
            SaveRecord {
                format_version: SAVE_FORMAT_VERSION,
                saved_at_unix,
                label: label.to_string(),
                state: state.clone(),
            },
        );
        self.write_blob(&blob)?;
        info!(slot, label, "saved game");
        Ok(())
    }

    /// Validated snapshot from `slot`. On any failure the caller's current
    /// state is untouched because nothing is applied here.
    pub fn load_from_slot(&self, slot: u32) -> SaveLoadResult<WorldState> {
        let blob = self.read_blob()?;
        let record = blob
            .slots
            .get(&slot)
            .ok_or_else(|| format!("no save in slot {slot}"))?;
        Self::validate_record(slot, record)?;
        Ok(record.state.clone())
    }

    pub fn delete_slot(&self, slot: u32) -> SaveLoadResult<bool> {
        let mut blob = self.read_blob_or_default()?;
        let removed = blob.slots.remove(&slot).is_some();
        if removed {
            self.write_blob(&blob)?;
        }
        Ok(removed)
    }

    /// Slot summaries in ascending slot order. A missing blob is an empty
    /// bank, not an error.
    pub fn enumerate_slots(&self) -> SaveLoadResult<Vec<SlotSummary>> {
        let blob = self.read_blob_or_default()?;
        Ok(blob
            .slots
            .iter()
            .map(|(slot, record)| SlotSummary {
                slot: *slot,
                label: record.label.clone(),
                saved_at_unix: record.saved_at_unix,
            })
            .collect())
    }

    fn read_blob(&self) -> SaveLoadResult<SaveBlob> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|error| format!("read save bank '{}': {error}", self.path.display()))?;
        Self::parse_blob_json(&raw)
    }

    fn read_blob_or_default(&self) -> SaveLoadResult<SaveBlob> {
        if !self.path.exists() {
            return Ok(SaveBlob::default());
        }
        self.read_blob()
    }

    fn write_blob(&self, blob: &SaveBlob) -> SaveLoadResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| format!("create save dir '{}': {error}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(blob)
            .map_err(|error| format!("serialize save bank: {error}"))?;
        fs::write(&self.path, json)
            .map_err(|error| format!("write save bank '{}': {error}", self.path.display()))
    }

    fn parse_blob_json(raw: &str) -> SaveLoadResult<SaveBlob> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        match serde_path_to_error::deserialize::<_, SaveBlob>(&mut deserializer) {
            Ok(blob) => Ok(blob),
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    Err(format!("parse save bank json: {source}"))
                } else {
                    Err(format!("parse save bank json at {path}: {source}"))
                }
            }
        }
    }

    fn validation_err(path: &str, message: impl Into<String>) -> String {
        format!("validation failed at {path}: {}", message.into())
    }

    fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
        Self::validation_err(path, format!("expected {expected}, got {actual}"))
    }

    fn validate_record(slot: u32, record: &SaveRecord) -> SaveLoadResult<()> {
        let prefix = format!("slots[{slot}]");
        if record.format_version != SAVE_FORMAT_VERSION {
            return Err(Self::expected_actual(
                &format!("{prefix}.format_version"),
                SAVE_FORMAT_VERSION,
                record.format_version,
            ));
        }

        let state = &record.state;
        if state.current_room().is_empty() {
            return Err(Self::validation_err(
                &format!("{prefix}.state.current_room"),
                "empty room id",
            ));
        }
        if !state.position().x.is_finite() {
            return Err(Self::expected_actual(
                &format!("{prefix}.state.position.x"),
                "finite number",
                state.position().x,
            ));
        }
        if !state.position().y.is_finite() {
            return Err(Self::expected_actual(
                &format!("{prefix}.state.position.y"),
                "finite number",
                state.position().y,
            ));
        }
        if state.reputation() < REPUTATION_MIN || state.reputation() > REPUTATION_MAX {
            return Err(Self::expected_actual(
                &format!("{prefix}.state.reputation"),
                format!("value in [{REPUTATION_MIN}, {REPUTATION_MAX}]"),
                state.reputation(),
            ));
        }

        let mut seen = BTreeSet::new();
        for (index, item) in state.inventory().iter().enumerate() {
            if !seen.insert(item) {
                return Err(Self::validation_err(
                    &format!("{prefix}.state.inventory[{index}]"),
                    format!("duplicate item '{item}'"),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::world::FlagValue;
    use tempfile::tempdir;

    fn sample_state() -> WorldState {
        let mut state = WorldState::new("harbor", Point::new(42.0, 17.0));
        state.give_item("lantern");
        state.set_flag("met_captain", FlagValue::Bool(true));
        state.adjust_reputation(30);
        state
    }

    #[test]
    fn save_and_load_round_trips_through_disk() {
        let dir = tempdir().expect("tempdir");
        let bank = SaveBank::new(dir.path().join("saves.json"));
        let state = sample_state();

        bank.save_to_slot(1, "before the cellar", &state)
            .expect("save");
        let restored = bank.load_from_slot(1).expect("load");
        assert_eq!(restored, state);
    }

    #[test]
    fn slots_are_independent_and_enumerable() {
        let dir = tempdir().expect("tempdir");
        let bank = SaveBank::new(dir.path().join("saves.json"));
        let state = sample_state();

        bank.save_to_slot(3, "late", &state).expect("save");
        bank.save_to_slot(1, "early", &state).expect("save");

        let slots = bank.enumerate_slots().expect("enumerate");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].slot, 1);
        assert_eq!(slots[0].label, "early");
        assert_eq!(slots[1].slot, 3);
    }

    #[test]
    fn delete_removes_only_the_named_slot() {
        let dir = tempdir().expect("tempdir");
        let bank = SaveBank::new(dir.path().join("saves.json"));
        let state = sample_state();

        bank.save_to_slot(1, "keep", &state).expect("save");
        bank.save_to_slot(2, "drop", &state).expect("save");

        assert!(bank.delete_slot(2).expect("delete"));
        assert!(!bank.delete_slot(2).expect("second delete"));
        assert!(bank.load_from_slot(1).is_ok());
        assert!(bank.load_from_slot(2).is_err());
    }

    #[test]
    fn missing_blob_enumerates_empty_but_load_fails() {
        let dir = tempdir().expect("tempdir");
        let bank = SaveBank::new(dir.path().join("saves.json"));

        assert!(bank.enumerate_slots().expect("enumerate").is_empty());
        assert!(bank.load_from_slot(1).is_err());
    }

    #[test]
    fn corrupt_blob_reports_the_json_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("saves.json");
        std::fs::write(&path, r#"{"slots": {"1": {"format_version": "nope"}}}"#)
            .expect("write corrupt blob");

        let bank = SaveBank::new(path);
        let error = bank.load_from_slot(1).expect_err("corrupt");
        assert!(error.contains("parse save bank json at"), "{error}");
        assert!(error.contains("format_version"), "{error}");
    }

    #[test]
    fn version_mismatch_is_rejected_with_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("saves.json");
        let bank = SaveBank::new(&path);
        bank.save_to_slot(1, "old", &sample_state()).expect("save");

        let raw = std::fs::read_to_string(&path).expect("read");
        let bumped = raw.replacen("\"format_version\": 1", "\"format_version\": 99", 1);
        assert_ne!(raw, bumped);
        std::fs::write(&path, bumped).expect("rewrite");

        let error = bank.load_from_slot(1).expect_err("version mismatch");
        assert!(error.contains("validation failed at slots[1].format_version"), "{error}");
    }

    #[test]
    fn out_of_range_reputation_fails_validation() {
        let record = SaveRecord {
            format_version: SAVE_FORMAT_VERSION,
            saved_at_unix: 0,
            label: "hacked".to_string(),
            state: sample_state(),
        };
        let raw = serde_json::to_string(&record).expect("serialize");
        let tampered = raw.replace("\"reputation\":30", "\"reputation\":900");
        assert_ne!(raw, tampered);
        let record: SaveRecord = serde_json::from_str(&tampered).expect("reparse");

        let error = SaveBank::validate_record(1, &record).expect_err("bad reputation");
        assert!(error.contains("reputation"), "{error}");
    }
}
