use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ItemId;

/// A record that tracks whether its on-disk copy is stale. The dirty
/// bit is cleared only after a successful write, so an interrupted
/// flush resumes where it left off.
pub trait DiskRecord: Serialize + DeserializeOwned {
    fn is_dirty(&self) -> bool;
    fn set_dirty(&mut self, dirty: bool);
}

/// File location for `id`: `dir/(id / shard_size)/id`, or `dir/id`
/// when the collection is small enough to stay flat.
pub fn record_path(dir: &Path, id: ItemId, shard_size: Option<u64>) -> PathBuf {
    match shard_size {
        Some(per_shard) => dir.join((id / per_shard).to_string()).join(id.to_string()),
        None => dir.join(id.to_string()),
    }
}

/// Write every dirty record as one JSON file, creating shard
/// directories as needed. Clean records cost no I/O. A failed write is
/// logged and leaves that record dirty for the next flush; it never
/// aborts the batch. Returns the number of files written.
pub fn save_records<R: DiskRecord>(
    records: &mut HashMap<ItemId, R>,
    dir: &Path,
    shard_size: Option<u64>,
) -> Result<usize> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating save directory {}", dir.display()))?;
    let mut written = 0;
    for (&id, record) in records.iter_mut() {
        if !record.is_dirty() {
            continue;
        }
        let path = record_path(dir, id, shard_size);
        match write_record(&path, record) {
            Ok(()) => {
                record.set_dirty(false);
                written += 1;
            }
            Err(err) => {
                tracing::error!(id, error = %err, "failed to persist record");
            }
        }
    }
    Ok(written)
}

/// Remove the persisted file for a deleted record, so the serving
/// layer never sees data for an id that no longer exists. A file that
/// was never written is fine; other failures are logged and retried on
/// the next flush by the caller.
pub fn remove_record_file(dir: &Path, id: ItemId, shard_size: Option<u64>) -> bool {
    let path = record_path(dir, id, shard_size);
    match fs::remove_file(&path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::error!(id, error = %err, "failed to remove stale record file");
            false
        }
    }
}

/// Load every numeric-named record file under `dir`. Malformed files
/// are logged and skipped; a missing directory is an empty collection.
/// Loaded records start clean.
pub fn load_records<R: DiskRecord>(
    dir: &Path,
    shard_size: Option<u64>,
) -> Result<HashMap<ItemId, R>> {
    let mut records = HashMap::new();
    if !dir.exists() {
        return Ok(records);
    }
    let files = match shard_size {
        Some(_) => {
            let mut files = Vec::new();
            for shard in numeric_entries(dir)? {
                if shard.1.is_dir() {
                    files.extend(numeric_entries(&shard.1)?);
                }
            }
            files
        }
        None => numeric_entries(dir)?,
    };
    for (id, path) in files {
        if !path.is_file() {
            continue;
        }
        match read_record(&path) {
            Ok(mut record) => {
                DiskRecord::set_dirty(&mut record, false);
                records.insert(id, record);
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "skipping unreadable record");
            }
        }
    }
    Ok(records)
}

fn write_record<R: Serialize>(path: &Path, record: &R) -> Result<()> {
    let parent = path
        .parent()
        .context("record path has no parent directory")?;
    fs::create_dir_all(parent)?;
    // Write-to-temp-then-rename so the serving layer never reads a
    // partially written file. The .tmp suffix keeps the name
    // non-numeric, invisible to load.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(record)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_record<R: DeserializeOwned>(path: &Path) -> Result<R> {
    let body = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

/// Directory entries whose names are plain decimal numbers.
fn numeric_entries(dir: &Path) -> Result<Vec<(ItemId, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
    {
        let entry = entry?;
        if let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<ItemId>().ok())
        {
            out.push((id, entry.path()));
        }
    }
    Ok(out)
}
