//! Storage backends for experiment records

use std::fs;
use std::path::{Path, PathBuf};

use super::tracker::Experiment;
use crate::error::{PipelineError, Result};

const EXPERIMENTS_FILE: &str = "experiments.json";

/// Persists experiment records
pub trait StorageBackend {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Human-readable location of the stored records
    fn location(&self) -> String;
}

/// Stores all experiments in one JSON document on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiments_file(&self) -> PathBuf {
        self.base_dir.join(EXPERIMENTS_FILE)
    }
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(experiments)?;

        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = self.base_dir.join(format!("{}.tmp", EXPERIMENTS_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.experiments_file())?;
        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let path = self.experiments_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| {
            PipelineError::TrackingError(format!("corrupt store {}: {}", path.display(), e))
        })
    }

    fn location(&self) -> String {
        format!("file://{}", self.base_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));
        assert!(storage.load_experiments().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let experiments = vec![Experiment::new("first"), Experiment::new("second")];
        storage.save_experiments(&experiments).unwrap();

        let loaded = storage.load_experiments().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].name, "second");
        assert_eq!(loaded[0].experiment_id, experiments[0].experiment_id);
    }

    #[test]
    fn test_corrupt_store_is_tracking_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(EXPERIMENTS_FILE), "{not json").unwrap();
        let err = LocalStorage::new(dir.path()).load_experiments().unwrap_err();
        assert!(matches!(err, PipelineError::TrackingError(_)));
    }
}
