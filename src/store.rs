use crate::errors::DealError;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Flat JSON file holding the identities announced so far.
#[derive(Debug, Clone)]
pub struct DealStore {
    path: PathBuf,
}

impl DealStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last known identity set.
    ///
    /// A missing file or one that does not hold a JSON list of strings means
    /// no history, and an empty list is written back in its place. Any other
    /// read failure is returned as-is and the file is left alone.
    pub fn load(&self) -> Result<HashSet<String>, DealError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No deal history at {}, starting fresh", self.path.display());
                self.reset();
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.persistence_error("read", e)),
        };

        match serde_json::from_slice::<Vec<String>>(&contents) {
            Ok(identities) => {
                let set: HashSet<String> = identities.into_iter().collect();
                info!("Loaded {} known deals from {}", set.len(), self.path.display());
                Ok(set)
            }
            Err(e) => {
                warn!(
                    "Deal history {} is corrupt ({}), resetting to empty",
                    self.path.display(),
                    e
                );
                self.reset();
                Ok(HashSet::new())
            }
        }
    }

    /// Replaces the stored set. The file is swapped in by rename, so a reader
    /// sees either the old list or the new one.
    pub fn save(&self, identities: &HashSet<String>) -> Result<(), DealError> {
        let sorted: BTreeSet<&String> = identities.iter().collect();
        let json = serde_json::to_string(&sorted)
            .map_err(|e| DealError::Persistence(format!("failed to serialize deals: {}", e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.persistence_error("create directory for", e))?;

        let mut temp =
            NamedTempFile::new_in(&dir).map_err(|e| self.persistence_error("create temp file for", e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| self.persistence_error("write", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.persistence_error("sync", e))?;
        temp.persist(&self.path)
            .map_err(|e| self.persistence_error("replace", e.error))?;

        info!("Saved {} deals to {}", identities.len(), self.path.display());
        Ok(())
    }

    fn reset(&self) {
        if let Err(e) = self.save(&HashSet::new()) {
            warn!("Could not reset deal history: {}", e);
        }
    }

    fn persistence_error(&self, action: &str, e: std::io::Error) -> DealError {
        DealError::Persistence(format!("failed to {} {}: {}", action, self.path.display(), e))
    }
}
