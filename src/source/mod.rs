//! Source database discovery and introspection.
//!
//! A data directory holds one SQLite file per database, either directly
//! (`<dir>/<db_id>.sqlite`) or one level down (`<dir>/<db_id>/<db_id>.sqlite`).
//! The database id is the file stem.
//!
//! All access to source files is read-only.

pub mod domain;
pub mod introspect;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub use domain::classify;
pub use introspect::{inspect, introspect, open_read_only, select_all, Introspection, TableReader};

/// File extensions recognized as source databases.
pub const DATABASE_EXTENSIONS: &[&str] = &["sqlite", "sqlite3", "db"];

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceReadError>;

/// A source database (or data directory) could not be read.
#[derive(Error, Debug)]
pub enum SourceReadError {
    /// The path does not exist.
    #[error("source not found: {}", .0.display())]
    Missing(PathBuf),

    /// The file exists but is not a SQLite database.
    #[error("not a SQLite database: {}", .0.display())]
    NotADatabase(PathBuf),

    /// Filesystem error.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite error while reading schema or rows.
    #[error("failed to read {}: {source}", path.display())]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

impl SourceReadError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            SourceReadError::Missing(path.to_path_buf())
        } else {
            SourceReadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub(crate) fn sqlite(path: &Path, source: rusqlite::Error) -> Self {
        SourceReadError::Sqlite {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A database file found under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseFile {
    /// Database id (file stem).
    pub id: String,
    pub path: PathBuf,
}

impl DatabaseFile {
    /// Build from a path, taking the id from the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { id, path }
    }
}

/// Find all database files under `data_dir`, sorted by id.
///
/// When two files share an id, the first in path order is kept.
pub fn discover(data_dir: &Path) -> SourceResult<Vec<DatabaseFile>> {
    let mut paths = Vec::new();

    for entry in read_dir_sorted(data_dir)? {
        if entry.is_dir() {
            for nested in read_dir_sorted(&entry)? {
                if is_database_file(&nested) {
                    paths.push(nested);
                }
            }
        } else if is_database_file(&entry) {
            paths.push(entry);
        }
    }

    let mut files: Vec<DatabaseFile> = Vec::with_capacity(paths.len());
    for path in paths {
        let file = DatabaseFile::from_path(path);
        if let Some(existing) = files.iter().find(|f| f.id == file.id) {
            warn!(
                db_id = %file.id,
                kept = %existing.path.display(),
                skipped = %file.path.display(),
                "duplicate database id"
            );
            continue;
        }
        debug!(db_id = %file.id, path = %file.path.display(), "discovered database");
        files.push(file);
    }

    files.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(files)
}

fn read_dir_sorted(dir: &Path) -> SourceResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SourceReadError::io(dir, e))?;
    let mut paths = entries
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| SourceReadError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn is_database_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    let has_extension = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            DATABASE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);
    !hidden && has_extension && path.is_file()
}
