//! Checkpoint persistence for the research state.
//!
//! Atomic JSON save (write to a temp file, then rename) and restore with
//! unknown-field rejection, so a run can be resumed or inspected later.

use crate::error::{Result, WorkflowError};
use crate::workflow::ResearchState;
use std::path::Path;

/// Save the research state to `path` as pretty-printed JSON.
///
/// Writes to a sibling `.tmp` file first and renames it over the target so
/// a crash mid-write cannot leave a truncated checkpoint.
pub fn save(state: &ResearchState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), "Research state checkpointed");
    Ok(())
}

/// Restore a research state from `path`.
///
/// Unknown fields in the file fail closed with
/// [`WorkflowError::UnknownStateField`].
pub fn load(path: &Path) -> Result<ResearchState> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| {
        if e.to_string().contains("unknown field") {
            WorkflowError::UnknownStateField {
                message: e.to_string(),
            }
            .into()
        } else {
            WorkflowError::Checkpoint {
                message: format!("Failed to parse checkpoint {}: {}", path.display(), e),
            }
            .into()
        }
    })
}
