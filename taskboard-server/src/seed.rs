//! Loading the initial task table from a TOML seed file.
//!
//! ```toml
//! [[task]]
//! id = "t-101"
//! title = "Draft engagement letter"
//! status = "todo"
//! priority = "high"
//! due_date = "2026-11-03"
//! locked = false
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use taskboard_proto::task::{Priority, Task, TaskError, TaskStatus};

use crate::store::TaskRecord;

/// Errors raised while loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// Failed to read the seed file.
    #[error("failed to read seed file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML.
    #[error("failed to parse seed file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A task entry breaks the task invariants.
    #[error("invalid task {id:?}: {source}")]
    InvalidTask {
        /// Id of the offending entry.
        id: String,
        /// Validation failure.
        source: TaskError,
    },

    /// Two entries share an id.
    #[error("duplicate task id {0:?}")]
    DuplicateId(String),
}

#[derive(Debug, serde::Deserialize)]
struct SeedFile {
    #[serde(default)]
    task: Vec<SeedTask>,
}

#[derive(Debug, serde::Deserialize)]
struct SeedTask {
    id: String,
    title: String,
    status: TaskStatus,
    #[serde(default)]
    priority: Priority,
    description: Option<String>,
    assignee: Option<String>,
    due_date: Option<NaiveDate>,
    case_id: Option<String>,
    #[serde(default)]
    locked: bool,
}

/// Parses seed TOML into task records, in file order.
///
/// # Errors
///
/// Returns [`SeedError`] on malformed TOML, an invalid task, or a
/// duplicate id.
pub fn parse_seed(contents: &str) -> Result<Vec<TaskRecord>, SeedError> {
    let file: SeedFile = toml::from_str(contents)?;
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(file.task.len());
    for entry in file.task {
        if !seen.insert(entry.id.clone()) {
            return Err(SeedError::DuplicateId(entry.id));
        }
        let mut task = Task::new(entry.id.clone(), entry.title, entry.status)
            .map_err(|source| SeedError::InvalidTask {
                id: entry.id,
                source,
            })?
            .with_priority(entry.priority);
        task.description = entry.description;
        task.assignee = entry.assignee;
        task.due_date = entry.due_date;
        task.case_id = entry.case_id;
        records.push(TaskRecord {
            task,
            locked: entry.locked,
        });
    }
    Ok(records)
}

/// Reads and parses a seed file.
///
/// # Errors
///
/// Returns [`SeedError::ReadFile`] if the file cannot be read, or any
/// error from [`parse_seed`].
pub fn load_seed(path: &Path) -> Result<Vec<TaskRecord>, SeedError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SeedError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_seed(&contents)
}

const DEMO_SEED: &str = r#"
[[task]]
id = "t-101"
title = "Draft engagement letter"
status = "todo"
priority = "high"
description = "Smith v. Jones"
due_date = "2026-11-03"

[[task]]
id = "t-102"
title = "Collect billing records"
status = "todo"

[[task]]
id = "t-103"
title = "Draft invoice for October"
status = "in_progress"
priority = "urgent"
assignee = "mlee"
due_date = "2026-10-31"

[[task]]
id = "t-104"
title = "Prepare deposition outline"
status = "in_progress"
priority = "high"
description = "Witness: R. Alvarez"
case_id = "case-2291"

[[task]]
id = "t-105"
title = "Review lease amendment"
status = "review"
due_date = "2026-11-05"

[[task]]
id = "t-106"
title = "File motion to compel"
status = "done"
priority = "urgent"
case_id = "case-2291"

[[task]]
id = "t-107"
title = "Archive closed matter"
status = "cancelled"
priority = "low"
locked = true
"#;

/// Built-in demo board used when no seed file is configured.
///
/// # Errors
///
/// Never fails in practice; the embedded seed is covered by tests.
pub fn demo_records() -> Result<Vec<TaskRecord>, SeedError> {
    parse_seed(DEMO_SEED)
}
