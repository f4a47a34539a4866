use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::loader::LoadError;
use super::model::CreditTable;

/// Identity of a source file: where it is, when it last changed, how big it is.
/// Content is never hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl SourceId {
    pub fn of(path: &Path) -> Result<Self, LoadError> {
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io_err)?;
        let meta = std::fs::metadata(&canonical).map_err(io_err)?;
        Ok(SourceId {
            path: canonical,
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Single-slot memo of the last successfully loaded table.
///
/// A failed load leaves the slot untouched; a successful load of a different
/// source replaces it, so an old table is never handed out for a new file.
#[derive(Debug, Default)]
pub struct TableCache {
    entry: Option<(SourceId, Arc<CreditTable>)>,
}

impl TableCache {
    /// Return the cached table for `path`, or run `load` and remember its result.
    pub fn get_or_load<F>(&mut self, path: &Path, load: F) -> Result<Arc<CreditTable>, LoadError>
    where
        F: FnOnce(&Path) -> Result<CreditTable, LoadError>,
    {
        let id = SourceId::of(path)?;
        if let Some((cached_id, table)) = &self.entry {
            if *cached_id == id {
                log::debug!("cache hit for {}", id.path.display());
                return Ok(Arc::clone(table));
            }
        }

        let table = Arc::new(load(&id.path)?);
        self.entry = Some((id, Arc::clone(&table)));
        Ok(table)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn cached_source(&self) -> Option<&SourceId> {
        self.entry.as_ref().map(|(id, _)| id)
    }
}
