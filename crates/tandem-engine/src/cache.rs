//! Per-session cache directory.
//!
//! Layout under `<cache_dir>/<session>/`:
//!
//! | File | Contents |
//! |------|----------|
//! | `initial.mesh` | [`MeshSummary`] JSON written by the mesh generator |
//! | `runtime.json` | Solution index of completed time/adapt steps |
//! | `problem.json` | [`ProblemSnapshot`] taken at structure build |
//!
//! Writes go through a `.tmp` file and a rename so an interrupted solve
//! never leaves a half-written file behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tandem_core::{MeshError, MeshSummary, StoreError};

use crate::config::ProblemConfig;
use crate::problem::ProblemSnapshot;

/// Write `value` as pretty JSON to `path` atomically.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Serialization(format!("serialization failed: {e}")))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Cache directory of one problem session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCache {
    root: PathBuf,
}

impl SessionCache {
    /// Generated mesh.
    pub const MESH_FILE: &'static str = "initial.mesh";
    /// Run-time solution metadata.
    pub const RUNTIME_FILE: &'static str = "runtime.json";
    /// Problem snapshot.
    pub const PROBLEM_FILE: &'static str = "problem.json";

    /// Cache for `session` under `cache_dir`. Nothing is created yet.
    pub fn new(cache_dir: impl AsRef<Path>, session: &str) -> Self {
        Self {
            root: cache_dir.as_ref().join(session),
        }
    }

    /// Cache named by a configuration.
    pub fn from_config(config: &ProblemConfig) -> Self {
        Self::new(&config.cache_dir, &config.session)
    }

    /// Session directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the generated mesh.
    pub fn mesh_path(&self) -> PathBuf {
        self.root.join(Self::MESH_FILE)
    }

    /// Path of the run-time metadata.
    pub fn runtime_path(&self) -> PathBuf {
        self.root.join(Self::RUNTIME_FILE)
    }

    /// Path of the problem snapshot.
    pub fn problem_path(&self) -> PathBuf {
        self.root.join(Self::PROBLEM_FILE)
    }

    /// Create the session directory.
    pub fn ensure(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Delete the session directory and everything in it.
    pub fn clear(&self) -> Result<(), StoreError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Persist a problem snapshot.
    pub fn write_snapshot(&self, snapshot: &ProblemSnapshot) -> Result<(), StoreError> {
        write_json_atomic(&self.problem_path(), snapshot)
    }

    /// `true` if a generated mesh is present.
    pub fn has_mesh(&self) -> bool {
        self.mesh_path().is_file()
    }

    /// Read back the generated mesh.
    pub fn read_mesh(&self) -> Result<MeshSummary, MeshError> {
        let path = self.mesh_path();
        let bytes = fs::read(&path).map_err(|e| MeshError::ReadFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| MeshError::ReadFailed {
            path,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let c = SessionCache::new("/var/cache/tandem", "s1");
        assert_eq!(c.root(), Path::new("/var/cache/tandem/s1"));
        assert_eq!(c.mesh_path(), Path::new("/var/cache/tandem/s1/initial.mesh"));
        assert_eq!(c.runtime_path(), Path::new("/var/cache/tandem/s1/runtime.json"));
    }

    #[test]
    fn mesh_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let c = SessionCache::new(dir.path(), "s");
        assert!(!c.has_mesh());
        c.ensure().unwrap();

        let mesh = MeshSummary {
            nodes: 9,
            elements: 8,
            boundary_markers: vec![0, 1, 1, 2],
        };
        write_json_atomic(&c.mesh_path(), &mesh).unwrap();
        assert!(c.has_mesh());
        assert_eq!(c.read_mesh().unwrap(), mesh);
        assert!(!c.root().join("initial.tmp").exists());

        c.clear().unwrap();
        assert!(!c.root().exists());
        // Clearing twice is fine.
        c.clear().unwrap();
    }

    #[test]
    fn unreadable_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let c = SessionCache::new(dir.path(), "s");
        assert!(matches!(c.read_mesh(), Err(MeshError::ReadFailed { .. })));

        c.ensure().unwrap();
        fs::write(c.mesh_path(), b"not json").unwrap();
        match c.read_mesh() {
            Err(MeshError::ReadFailed { path, .. }) => assert_eq!(path, c.mesh_path()),
            other => panic!("expected ReadFailed, got {other:?}"),
        }
    }
}
