//! JSON-array file persistence for selector configs, vendor data, failed
//! structures and the retry ledger.
//!
//! Every file is a UTF-8 JSON array of flat objects. Reads are forgiving (a
//! missing or malformed file reads as empty); writes replace the whole file.
//! Writes are not atomic and nothing guards against two processes writing
//! the same file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Reads the raw elements of the JSON array at `path`, treating a missing,
/// unreadable or non-array file as empty.
fn read_values(path: &Path) -> Vec<Value> {
    if !path.exists() {
        return Vec::new();
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Error reading existing file {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!("{} does not hold a JSON array, treating it as empty", path.display());
            Vec::new()
        }
        Err(e) => {
            error!("Error reading existing file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Reads a JSON array from `path`, treating a missing, unreadable or
/// non-array file as empty. Elements that do not parse as `T` are skipped.
pub fn read_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    read_values(path)
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping malformed entry in {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Reads a JSON array from `path`, failing on malformed content. A missing
/// file is still an empty list.
pub fn read_array_strict<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!("File {} does not exist", path.display());
        return Ok(Vec::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Replaces the contents of `path` with `items`, pretty-printed.
pub fn write_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(items)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Appends `items` to the array stored at `path` (read, extend, write).
///
/// Existing elements are carried over as raw JSON, whatever their shape.
pub fn append_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut existing = read_values(path);
    for item in items {
        existing.push(serde_json::to_value(item)?);
    }
    write_array(path, &existing)?;
    info!("Data saved to {}", path.display());
    Ok(())
}

/// Logs rather than propagates a persistence failure; the in-memory result
/// of a run is still returned to the caller.
pub fn write_array_logged<T: Serialize>(path: &Path, items: &[T], what: &str) {
    match write_array(path, items) {
        Ok(()) => info!("{} saved to {}", what, path.display()),
        Err(e) => error!("Error saving {}: {:#}", what, e),
    }
}

/// One JSON-array file shared by concurrent jobs within a run.
///
/// Appends are serialized through a lock so interleaved jobs never lose each
/// other's rows.
#[derive(Debug)]
pub struct SharedArrayFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SharedArrayFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append<T: Serialize>(&self, items: &[T]) -> Result<()> {
        let _guard = self.lock.lock().await;
        append_array(&self.path, items)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
    }

    fn row(name: &str) -> Row {
        Row {
            name: name.to_string(),
        }
    }

    #[test]
    fn appending_twice_keeps_both_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor.json");

        append_array(&path, &[row("A")]).unwrap();
        append_array(&path, &[row("B")]).unwrap();

        let rows: Vec<Row> = read_array(&path);
        assert_eq!(rows, vec![row("A"), row("B")]);
    }

    #[test]
    fn appending_keeps_entries_of_other_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor.json");
        fs::write(
            &path,
            r#"[{"Name":"Manual entry","Url":"https://x","City":3},{"Name":"No url entry"}]"#,
        )
        .unwrap();

        append_array(&path, &[row("B")]).unwrap();

        let raw: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0]["City"], 3);
        assert_eq!(raw[1]["Name"], "No url entry");
        assert_eq!(raw[2]["name"], "B");
    }

    #[test]
    fn non_array_files_are_replaced_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor.json");
        fs::write(&path, r#"{"not": "an array"}"#).unwrap();

        append_array(&path, &[row("A")]).unwrap();
        let rows: Vec<Row> = read_array(&path);
        assert_eq!(rows, vec![row("A")]);
    }

    #[test]
    fn unreadable_json_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();
        let rows: Vec<Row> = read_array(&path);
        assert!(rows.is_empty());
        assert!(read_array_strict::<Row>(&path).is_err());
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<Row> = read_array(&dir.path().join("absent.json"));
        assert!(rows.is_empty());
        let strict: Vec<Row> = read_array_strict(&dir.path().join("absent.json")).unwrap();
        assert!(strict.is_empty());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.json");
        write_array(&path, &[row("A")]).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn shared_file_appends_from_concurrent_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let file = SharedArrayFile::new(dir.path().join("shared.json"));

        let names: Vec<String> = (0..8).map(|n| format!("row-{n}")).collect();
        let file = &file;
        let results = futures::future::join_all(names.iter().map(|n| {
            let r = row(n);
            async move { file.append(&[r]).await }
        }))
        .await;
        assert!(results.iter().all(Result::is_ok));

        let rows: Vec<Row> = read_array(file.path());
        assert_eq!(rows.len(), 8);
    }
}
