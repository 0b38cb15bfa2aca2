//! Table files: one JSON object per file.
//!
//! Plain filesystem helpers, no locking. Callers serialize access through the
//! job queue.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use jsondb_core::ResultCode;

/// Parsed table content.
pub type Table = Map<String, Value>;

/// Table-level failure.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("invalid table path {0:?}")]
    InvalidPath(String),
    #[error("cannot create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("table {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("table {path} does not hold a JSON object")]
    NotAnObject { path: PathBuf },
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl TableError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            TableError::Corrupt { .. } | TableError::NotAnObject { .. } => {
                ResultCode::DatabaseCorrupt
            }
            TableError::InvalidPath(_) | TableError::CreateDir { .. } | TableError::Io { .. } => {
                ResultCode::DatabaseError
            }
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        TableError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resolve a caller-supplied table path under `root`.
///
/// Only plain relative paths are accepted; anything that could land outside
/// `root` is rejected.
pub fn resolve(root: &Path, table: &str) -> Result<PathBuf, TableError> {
    let relative = Path::new(table);
    let plain = !table.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && relative.file_name().is_some();

    if !plain {
        return Err(TableError::InvalidPath(table.to_string()));
    }

    Ok(root.join(relative))
}

/// Make sure `path` is a readable table and return its content.
///
/// - missing parent directories are created
/// - a missing file is created holding `{}`
/// - an existing file must parse as a JSON object, otherwise it is corrupt
///   and left untouched
pub fn ensure_exists(path: &Path) -> Result<Table, TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| TableError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let table = Table::new();
            write_object(path, &table)?;
            info!(table = %path.display(), "created empty table");
            return Ok(table);
        }
        Err(e) => return Err(TableError::io(path, e)),
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(table)) => Ok(table),
        Ok(_) => Err(TableError::NotAnObject {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(TableError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace the file at `path` with `table`, compactly encoded.
///
/// Written to a temp file beside the target, fsynced, then renamed over it, so
/// readers see either the old or the new object, never a prefix.
pub fn write_object(path: &Path, table: &Table) -> Result<(), TableError> {
    let encoded = serde_json::to_vec(table).map_err(|e| TableError::io(path, e.into()))?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TableError::InvalidPath(path.display().to_string()))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::now_v7()));

    let write_temp = || -> io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()
    };

    if let Err(e) = write_temp().and_then(|()| std::fs::rename(&temp_path, path)) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(TableError::io(path, e));
    }

    sync_dir(parent).map_err(|e| TableError::io(parent, e))?;

    debug!(table = %path.display(), bytes = encoded.len(), "table written");
    Ok(())
}

/// Persist the directory entry left by a rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_joins_relative_paths() {
        let root = Path::new("db");
        assert_eq!(
            resolve(root, "users/accounts.json").unwrap(),
            PathBuf::from("db/users/accounts.json")
        );
        assert_eq!(resolve(root, "./t.json").unwrap(), PathBuf::from("db/./t.json"));
    }

    #[test]
    fn resolve_rejects_escaping_paths() {
        let root = Path::new("db");
        for bad in ["", "/etc/passwd", "../outside.json", "a/../../b.json", "a/.."] {
            let err = resolve(root, bad).unwrap_err();
            assert_eq!(err.result_code(), ResultCode::DatabaseError, "{bad:?}");
        }
    }

    #[test]
    fn ensure_exists_creates_empty_object_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/table.json");

        let table = ensure_exists(&path).unwrap();

        assert!(table.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn ensure_exists_returns_parsed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, r#"{"a":1,"b":[true,null]}"#).unwrap();

        let table = ensure_exists(&path).unwrap();

        assert_eq!(table.get("a"), Some(&json!(1)));
        assert_eq!(table.get("b"), Some(&json!([true, null])));
    }

    #[test]
    fn garbage_is_corrupt_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = ensure_exists(&path).unwrap_err();

        assert_eq!(err.result_code(), ResultCode::DatabaseCorrupt);
        assert_eq!(std::fs::read(&path).unwrap(), b"{not json");
    }

    #[test]
    fn non_object_top_level_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, b"[1,2,3]").unwrap();

        let err = ensure_exists(&path).unwrap_err();
        assert!(matches!(err, TableError::NotAnObject { .. }));
        assert_eq!(err.result_code(), ResultCode::DatabaseCorrupt);
    }

    #[test]
    fn empty_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(
            ensure_exists(&path).unwrap_err().result_code(),
            ResultCode::DatabaseCorrupt
        );
    }

    #[test]
    fn parent_collision_with_a_file_is_database_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"x").unwrap();
        let path = dir.path().join("blocker/t.json");

        let err = ensure_exists(&path).unwrap_err();
        assert!(matches!(err, TableError::CreateDir { .. }));
        assert_eq!(err.result_code(), ResultCode::DatabaseError);
    }

    #[test]
    fn write_object_is_compact_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let mut table = Table::new();
        table.insert("k".into(), json!({"x": [1, 2]}));

        write_object(&path, &table).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"k":{"x":[1,2]}}"#);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_object_replaces_existing_file_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/t.json");
        ensure_exists(&path).unwrap();

        let mut table = Table::new();
        table.insert("k".into(), json!(1));
        write_object(&path, &table).unwrap();
        table.insert("k".into(), json!(2));
        write_object(&path, &table).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"k":2}"#);
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("a/b")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rewrite_keeps_key_order_and_number_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let original = r#"{"z":1,"big":123456789012345678901234567890,"f":0.1000000000000000055511151231257827}"#;
        std::fs::write(&path, original).unwrap();

        let table = ensure_exists(&path).unwrap();
        write_object(&path, &table).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
