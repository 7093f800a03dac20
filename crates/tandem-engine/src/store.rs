//! JSON-file solution store.

use std::path::{Path, PathBuf};

use tandem_core::{
    BlockId, FieldId, SolutionId, SolutionIndex, SolutionMode, SolutionRecord, SolutionStore,
    StoreError,
};

use crate::cache::write_json_atomic;

/// [`SolutionStore`] that keeps its index in memory and mirrors every
/// mutation to a JSON file (normally the session's `runtime.json`).
///
/// Writes are atomic (write to `.tmp`, then rename), so a crash leaves
/// either the previous or the new index on disk.
#[derive(Debug)]
pub struct JsonSolutionStore {
    path: PathBuf,
    index: SolutionIndex,
}

impl JsonSolutionStore {
    /// An empty store persisting to `path`. The file is not read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: SolutionIndex::new(),
        }
    }

    /// A store at `path`, loading any index already persisted there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self::new(path);
        store.load_run_time_details()?;
        Ok(store)
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory index.
    pub fn index(&self) -> &SolutionIndex {
        &self.index
    }

    fn persist(&self) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &self.index)
    }
}

impl SolutionStore for JsonSolutionStore {
    fn record(&mut self, record: SolutionRecord) -> Result<(), StoreError> {
        self.index.insert(record);
        self.persist()
    }

    fn last_time_step(&self, field: FieldId, mode: SolutionMode) -> Option<usize> {
        self.index.last_time_step(field, mode)
    }

    fn last_adaptive_step(
        &self,
        block: BlockId,
        mode: SolutionMode,
        time_step: usize,
    ) -> Option<usize> {
        self.index.last_adaptive_step(block, mode, time_step)
    }

    fn last_time(&self, block: BlockId) -> Option<f64> {
        self.index.last_time(block)
    }

    fn remove_time_step(&mut self, time_step: usize) -> Result<(), StoreError> {
        if self.index.remove_time_step(time_step) > 0 {
            self.persist()?;
        }
        Ok(())
    }

    fn remove_solution(&mut self, id: &SolutionId) -> Result<(), StoreError> {
        if self.index.remove(id) {
            self.persist()?;
        }
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.index.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn load_run_time_details(&mut self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(&self.path)?;
        self.index = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("deserialization failed: {e}")))?;
        Ok(())
    }

    fn relocate(&mut self, runtime: &Path) {
        if self.path.as_path() != runtime {
            self.path = runtime.to_path_buf();
            self.index.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(block: u32, ts: usize, k: usize, mode: SolutionMode) -> SolutionRecord {
        let b = BlockId(block);
        SolutionRecord {
            id: match mode {
                SolutionMode::Normal => SolutionId::normal(b, ts, k),
                SolutionMode::Reference => SolutionId::reference(b, ts, k),
            },
            fields: vec![FieldId(block)],
            time: ts as f64 * 0.5,
        }
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");

        let mut s = JsonSolutionStore::new(&path);
        s.record(rec(0, 0, 0, SolutionMode::Normal)).unwrap();
        s.record(rec(0, 0, 0, SolutionMode::Reference)).unwrap();
        s.record(rec(0, 0, 1, SolutionMode::Reference)).unwrap();
        drop(s);

        let s = JsonSolutionStore::open(&path).unwrap();
        assert_eq!(s.index().len(), 3);
        let state = s.adaptivity_state(BlockId(0), 0);
        assert_eq!(state.last_normal, Some(0));
        assert_eq!(state.last_reference, Some(1));
    }

    #[test]
    fn removals_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");

        let mut s = JsonSolutionStore::new(&path);
        for ts in 0..3 {
            s.record(rec(1, ts, 0, SolutionMode::Normal)).unwrap();
        }
        s.remove_time_step(2).unwrap();
        s.remove_solution(&SolutionId::normal(BlockId(1), 0, 0))
            .unwrap();

        let s = JsonSolutionStore::open(&path).unwrap();
        assert_eq!(s.last_time_step(FieldId(1), SolutionMode::Normal), Some(1));
        assert_eq!(s.index().len(), 1);
        assert_eq!(s.last_time(BlockId(1)), Some(0.5));
    }

    #[test]
    fn clear_all_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");
        let mut s = JsonSolutionStore::new(&path);
        s.record(rec(0, 0, 0, SolutionMode::Normal)).unwrap();
        assert!(path.exists());
        s.clear_all().unwrap();
        assert!(!path.exists());
        assert!(s.index().is_empty());
    }

    #[test]
    fn relocate_switches_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a").join("runtime.json");
        let b = dir.path().join("b").join("runtime.json");

        let mut s = JsonSolutionStore::new(&a);
        s.record(rec(0, 0, 0, SolutionMode::Normal)).unwrap();
        s.relocate(&a);
        assert_eq!(s.index().len(), 1);

        s.relocate(&b);
        assert_eq!(s.path(), b.as_path());
        assert!(s.index().is_empty());
        s.record(rec(0, 1, 0, SolutionMode::Normal)).unwrap();

        assert_eq!(JsonSolutionStore::open(&a).unwrap().index().len(), 1);
        let reopened = JsonSolutionStore::open(&b).unwrap();
        assert_eq!(
            reopened.last_time_step(FieldId(0), SolutionMode::Normal),
            Some(1)
        );
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            JsonSolutionStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
