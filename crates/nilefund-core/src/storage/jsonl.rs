//! JSONL export/import for git-friendly sync
//!
//! Each aggregate kind goes to its own `.jsonl` file, one record per line,
//! sorted by id so that re-exporting unchanged state produces identical files.
//!
//! ```text
//! <dir>/
//! ├── projects.jsonl
//! ├── loans.jsonl
//! └── _metadata.json
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::engine::StateSnapshot;
use crate::error::{Error, Result};

pub const PROJECTS_FILE: &str = "projects.jsonl";
pub const LOANS_FILE: &str = "loans.jsonl";
pub const METADATA_FILE: &str = "_metadata.json";

/// Written next to the exported files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub exported_at: DateTime<Utc>,
    pub schema_version: i32,
    pub record_counts: BTreeMap<String, usize>,
    pub total_records: usize,
}

/// Result of an export operation
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub sync_dir: PathBuf,
    pub metadata: SyncMetadata,
    pub files_written: Vec<PathBuf>,
}

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub snapshot: StateSnapshot,
    pub total_records: usize,
}

/// Write every aggregate of the snapshot to `sync_dir`
pub fn export_to_jsonl(snapshot: &StateSnapshot, sync_dir: &Path) -> Result<ExportResult> {
    fs::create_dir_all(sync_dir)?;

    let mut projects: Vec<_> = snapshot.projects.iter().collect();
    projects.sort_by_key(|project| project.id);
    let mut loans: Vec<_> = snapshot.loans.iter().collect();
    loans.sort_by_key(|loan| loan.project_id);

    let projects_path = sync_dir.join(PROJECTS_FILE);
    let loans_path = sync_dir.join(LOANS_FILE);
    let project_count = write_records(&projects_path, &projects)?;
    let loan_count = write_records(&loans_path, &loans)?;

    let mut record_counts = BTreeMap::new();
    record_counts.insert("projects".to_string(), project_count);
    record_counts.insert("loans".to_string(), loan_count);
    let metadata = SyncMetadata {
        exported_at: Utc::now(),
        schema_version: crate::storage::CURRENT_VERSION,
        record_counts,
        total_records: project_count + loan_count,
    };

    let metadata_path = sync_dir.join(METADATA_FILE);
    let metadata_file = File::create(&metadata_path)?;
    serde_json::to_writer_pretty(metadata_file, &metadata)?;

    tracing::info!(
        sync_dir = %sync_dir.display(),
        projects = project_count,
        loans = loan_count,
        "Exported state to JSONL"
    );

    Ok(ExportResult {
        sync_dir: sync_dir.to_path_buf(),
        metadata,
        files_written: vec![projects_path, loans_path, metadata_path],
    })
}

/// Read a snapshot previously written by [`export_to_jsonl`]
///
/// A missing `loans.jsonl` is read as no loans; a missing `projects.jsonl` is
/// an error.
pub fn import_from_jsonl(sync_dir: &Path) -> Result<ImportResult> {
    let projects_path = sync_dir.join(PROJECTS_FILE);
    if !projects_path.exists() {
        return Err(Error::Storage(format!(
            "Sync file not found: {}",
            projects_path.display()
        )));
    }

    let projects = read_records(&projects_path)?;
    let loans_path = sync_dir.join(LOANS_FILE);
    let loans = if loans_path.exists() {
        read_records(&loans_path)?
    } else {
        Vec::new()
    };

    let total_records = projects.len() + loans.len();
    tracing::info!(
        sync_dir = %sync_dir.display(),
        projects = projects.len(),
        loans = loans.len(),
        "Imported state from JSONL"
    );

    Ok(ImportResult {
        snapshot: StateSnapshot { projects, loans },
        total_records,
    })
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(records.len())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            Error::Storage(format!("{} line {}: {}", path.display(), index + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}
