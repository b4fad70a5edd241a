use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::records::domain::{EntryMode, SchoolType};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Lookup key for a program's year weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightingKey {
    pub duration_years: u8,
    pub school_type: SchoolType,
    pub entry_mode: EntryMode,
}

/// Serialized form of one weighting row: year of study to weight fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingEntry {
    pub duration_years: u8,
    pub school_type: SchoolType,
    pub entry_mode: EntryMode,
    pub weights: BTreeMap<u8, f64>,
}

impl WeightingEntry {
    pub fn key(&self) -> WeightingKey {
        WeightingKey {
            duration_years: self.duration_years,
            school_type: self.school_type,
            entry_mode: self.entry_mode,
        }
    }
}

/// Immutable year weighting table, loaded once per process.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightingTable {
    entries: HashMap<WeightingKey, BTreeMap<u8, f64>>,
}

impl WeightingTable {
    /// Built-in weights for the program shapes the registry offers.
    pub fn standard() -> Self {
        const ROWS: &[(u8, SchoolType, EntryMode, &[(u8, f64)])] = &[
            (2, SchoolType::Standard, EntryMode::Regular, &[(1, 0.4), (2, 0.6)]),
            (
                3,
                SchoolType::Standard,
                EntryMode::Regular,
                &[(1, 0.2), (2, 0.3), (3, 0.5)],
            ),
            (3, SchoolType::Standard, EntryMode::DirectEntry, &[(2, 0.4), (3, 0.6)]),
            (
                4,
                SchoolType::Standard,
                EntryMode::Regular,
                &[(1, 0.15), (2, 0.15), (3, 0.3), (4, 0.4)],
            ),
            (
                4,
                SchoolType::Standard,
                EntryMode::DirectEntry,
                &[(2, 0.2), (3, 0.35), (4, 0.45)],
            ),
            (
                5,
                SchoolType::Professional,
                EntryMode::Regular,
                &[(1, 0.1), (2, 0.15), (3, 0.2), (4, 0.25), (5, 0.3)],
            ),
            (
                5,
                SchoolType::Professional,
                EntryMode::DirectEntry,
                &[(2, 0.15), (3, 0.2), (4, 0.3), (5, 0.35)],
            ),
        ];

        let entries = ROWS
            .iter()
            .map(|(duration_years, school_type, entry_mode, weights)| {
                (
                    WeightingKey {
                        duration_years: *duration_years,
                        school_type: *school_type,
                        entry_mode: *entry_mode,
                    },
                    weights.iter().copied().collect(),
                )
            })
            .collect();

        Self { entries }
    }

    pub fn from_entries(entries: Vec<WeightingEntry>) -> Result<Self, ConfigError> {
        let mut table = HashMap::new();

        for entry in entries {
            let key = entry.key();
            if entry.weights.is_empty() {
                return Err(ConfigError::InvalidWeighting {
                    detail: format!("{} has no year weights", describe(&key)),
                });
            }
            if let Some((year, _)) = entry
                .weights
                .iter()
                .find(|(year, weight)| **year == 0 || **year > key.duration_years || **weight < 0.0)
            {
                return Err(ConfigError::InvalidWeighting {
                    detail: format!("{} has an invalid weight for year {year}", describe(&key)),
                });
            }

            let total: f64 = entry.weights.values().sum();
            if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(ConfigError::InvalidWeighting {
                    detail: format!("{} weights sum to {total:.4}, expected 1.0", describe(&key)),
                });
            }

            if table.insert(key, entry.weights).is_some() {
                return Err(ConfigError::InvalidWeighting {
                    detail: format!("{} is defined more than once", describe(&key)),
                });
            }
        }

        Ok(Self { entries: table })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::WeightingIo {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<WeightingEntry> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::WeightingParse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(entries)
    }

    pub fn weights(&self, key: &WeightingKey) -> Option<&BTreeMap<u8, f64>> {
        self.entries.get(key)
    }

    pub fn weight_for(&self, key: &WeightingKey, year_of_study: u8) -> Option<f64> {
        self.weights(key)?.get(&year_of_study).copied()
    }
}

fn describe(key: &WeightingKey) -> String {
    format!(
        "{}-year {:?} program ({:?} entry)",
        key.duration_years, key.school_type, key.entry_mode
    )
}
