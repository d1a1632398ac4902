//! Test plan definition and JSON loading
//!
//! A test plan is an ordered list of (file, rounds, mode) entries, read once
//! at orchestration start. Stored as JSON with serde defaults so hand-written
//! plans can omit the round count.

use crate::audio::output::PlaybackMode;
use crate::DEFAULT_ROUNDS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_rounds() -> u32 {
    DEFAULT_ROUNDS
}

/// One (file, rounds, mode) tuple of the plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Path to the WAV fixture file
    pub path: PathBuf,
    /// Number of independent rounds to run (default 5)
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Delivery strategy for every round of this entry
    pub mode: PlaybackMode,
}

impl PlanEntry {
    /// File name for result tagging (falls back to the full path string)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Ordered sequence of plan entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestPlan {
    /// Entries in execution order
    pub entries: Vec<PlanEntry>,
}

impl TestPlan {
    /// Load a plan from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let plan: TestPlan = serde_json::from_str(&contents)?;
        tracing::info!(path = %path.display(), entries = plan.entries.len(), "Loaded test plan");
        Ok(plan)
    }

    /// Save the plan as pretty-printed JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Total number of rounds across all entries
    pub fn total_rounds(&self) -> u64 {
        self.entries.iter().map(|e| e.rounds as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_round_trip() {
        let plan = TestPlan {
            entries: vec![
                PlanEntry {
                    path: PathBuf::from("/tmp/test_60s.wav"),
                    rounds: 5,
                    mode: PlaybackMode::Streaming,
                },
                PlanEntry {
                    path: PathBuf::from("/tmp/test_5min.wav"),
                    rounds: 3,
                    mode: PlaybackMode::Static,
                },
            ],
        };

        let json = serde_json::to_string(&plan).unwrap();
        let loaded: TestPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].rounds, 3);
        assert_eq!(loaded.entries[1].mode, PlaybackMode::Static);
        assert_eq!(loaded.total_rounds(), 8);
    }

    #[test]
    fn test_rounds_default_to_five() {
        let json = r#"{"entries": [{"path": "a.wav", "mode": "streaming"}]}"#;
        let plan: TestPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.entries[0].rounds, 5);
    }

    #[test]
    fn test_file_name_tag() {
        let entry = PlanEntry {
            path: PathBuf::from("/storage/music/test_10min.wav"),
            rounds: 5,
            mode: PlaybackMode::Static,
        };
        assert_eq!(entry.file_name(), "test_10min.wav");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");

        let plan = TestPlan {
            entries: vec![PlanEntry {
                path: PathBuf::from("x.wav"),
                rounds: 2,
                mode: PlaybackMode::Streaming,
            }],
        };
        plan.save(&path).unwrap();

        let loaded = TestPlan::load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].rounds, 2);
    }
}
