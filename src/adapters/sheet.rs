//! CSV "sheet" sink.
//!
//! One registration per line under a fixed header row:
//! `Name,Household Members,Address,Phone,Timestamp`.
//! Writes take an exclusive file lock so several interview processes can
//! share one sheet. Every write re-checks the header under that lock.
//!
//! Save keys of written rows live in a sidecar file (`<sheet>.keys`), so a
//! retried save never appends the same record twice.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, info, warn};

use super::{PersistenceError, RecordSink};
use crate::domain::{RecordRow, SHEET_HEADERS};

/// Append-only CSV file with a verified header row
pub struct SheetSink {
    path: PathBuf,
    keys_path: PathBuf,
}

impl SheetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys_path = keys_path_for(&path);
        Self { path, keys_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file holding the save keys already written
    pub fn keys_path(&self) -> &Path {
        &self.keys_path
    }

    /// All lines of the sheet, header included
    pub async fn read_lines(&self) -> Result<Vec<String>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(content.lines().map(|l| l.to_string()).collect())
    }

    async fn run_blocking<F>(&self, f: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&Path, &Path) -> Result<(), PersistenceError> + Send + 'static,
    {
        let path = self.path.clone();
        let keys_path = self.keys_path.clone();
        tokio::task::spawn_blocking(move || f(&path, &keys_path))
            .await
            .map_err(|e| PersistenceError::Storage(format!("sheet task failed: {}", e)))?
    }
}

/// The header line as written to disk
pub fn header_line() -> String {
    SHEET_HEADERS.join(",")
}

/// Quote a cell if it contains a delimiter, quote or line break
pub fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn keys_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "sheet".into());
    name.push(".keys");
    path.with_file_name(name)
}

fn row_line(row: &RecordRow) -> String {
    row.cells()
        .iter()
        .map(|c| csv_cell(c))
        .collect::<Vec<_>>()
        .join(",")
}

fn open_locked(path: &Path) -> Result<File, PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

/// Create the header, or rewrite one that does not match. The caller holds
/// the lock. Returns the file content afterwards.
fn check_header(file: &mut File, path: &Path) -> Result<String, PersistenceError> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut content)?;

    let expected = header_line();
    let first = content.lines().next().map(|l| l.trim_end_matches('\r'));

    let rewritten = match first {
        Some(line) if line == expected => return Ok(content),
        None => format!("{}\n", expected),
        Some(line) => {
            warn!(found = %line, "Sheet header mismatch, rewriting header row");
            let rest = content.split_once('\n').map(|(_, r)| r).unwrap_or("");
            format!("{}\n{}", expected, rest)
        }
    };

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(rewritten.as_bytes())?;
    file.flush()?;
    info!(path = %path.display(), "Sheet headers set to: {}", SHEET_HEADERS.join(", "));
    Ok(rewritten)
}

fn ensure_header_blocking(path: &Path) -> Result<(), PersistenceError> {
    let mut file = open_locked(path)?;
    check_header(&mut file, path)?;
    file.unlock()?;
    Ok(())
}

fn key_recorded(keys_path: &Path, save_key: &str) -> Result<bool, PersistenceError> {
    match std::fs::read_to_string(keys_path) {
        Ok(keys) => Ok(keys.lines().any(|k| k == save_key)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Header check, duplicate check and write, all under one lock
fn append_blocking(
    path: &Path,
    keys_path: &Path,
    save_key: &str,
    line: &str,
) -> Result<(), PersistenceError> {
    let mut file = open_locked(path)?;
    let content = check_header(&mut file, path)?;

    if key_recorded(keys_path, save_key)? {
        debug!(save_key = %save_key, "Row already in sheet, skipping");
        file.unlock()?;
        return Ok(());
    }

    let separator = if content.ends_with('\n') { "" } else { "\n" };
    file.seek(SeekFrom::End(0))?;
    file.write_all(format!("{}{}\n", separator, line).as_bytes())?;
    file.flush()?;

    let mut keys = OpenOptions::new()
        .create(true)
        .append(true)
        .open(keys_path)?;
    writeln!(keys, "{}", save_key)?;
    keys.flush()?;

    file.unlock()?;
    Ok(())
}

#[async_trait]
impl RecordSink for SheetSink {
    fn name(&self) -> &str {
        "sheet"
    }

    async fn ensure_header(&self) -> Result<(), PersistenceError> {
        self.run_blocking(|path, _| ensure_header_blocking(path))
            .await
    }

    async fn append(&self, row: &RecordRow) -> Result<(), PersistenceError> {
        let line = row_line(row);
        let save_key = row.save_key.clone();
        self.run_blocking(move |path, keys_path| {
            append_blocking(path, keys_path, &save_key, &line)
        })
        .await
    }
}
