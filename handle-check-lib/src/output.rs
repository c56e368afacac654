//! Result artifacts written at the end of a completed run.
//!
//! - `<status>_usernames.txt`: one identifier per line, for every status with
//!   at least one identifier
//! - `detailed_results.json`: every outcome, ordered by identifier

use crate::aggregator::ResultSet;
use crate::checkpoint::Checkpoint;
use crate::error::HandleCheckError;
use crate::types::{Outcome, Status};
use crate::utils::write_atomic;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the detailed JSON report.
pub const DETAILED_RESULTS_FILE: &str = "detailed_results.json";

/// File name of the identifier list for `status`.
pub fn status_file_name(status: Status) -> String {
    format!("{}_usernames.txt", status.as_str())
}

/// Create the output directory if needed.
///
/// # Errors
///
/// Returns `FileError` when the directory cannot be created; a run must not
/// start without somewhere to put its results.
pub fn ensure_output_dir(dir: &Path) -> Result<(), HandleCheckError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        HandleCheckError::file_error(
            dir.to_string_lossy(),
            format!("Failed to create output directory: {}", e),
        )
    })
}

/// Write every artifact into `dir`.
///
/// A failing file is logged and skipped; the paths actually written are
/// returned.
pub fn write_results(dir: &Path, results: &ResultSet, checkpoint: &Checkpoint) -> Vec<PathBuf> {
    let mut written = Vec::new();

    for (status, identifiers) in results.iter() {
        let path = dir.join(status_file_name(status));
        let mut contents = identifiers.join("\n");
        contents.push('\n');

        match write_file(&path, contents.as_bytes()) {
            Ok(()) => {
                info!(%status, count = identifiers.len(), path = %path.display(), "Identifier list saved");
                written.push(path);
            }
            Err(e) => warn!(%status, error = %e, "Failed to save identifier list"),
        }
    }

    let path = dir.join(DETAILED_RESULTS_FILE);
    match detailed_json(checkpoint).and_then(|json| write_file(&path, &json)) {
        Ok(()) => {
            info!(path = %path.display(), "Detailed results saved");
            written.push(path);
        }
        Err(e) => warn!(error = %e, "Failed to save detailed results"),
    }

    written
}

fn detailed_json(checkpoint: &Checkpoint) -> Result<Vec<u8>, HandleCheckError> {
    // BTreeMap iteration is already ordered by identifier
    let outcomes: Vec<&Outcome> = checkpoint.outcomes.values().collect();
    Ok(serde_json::to_vec_pretty(&outcomes)?)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), HandleCheckError> {
    write_atomic(path, contents)
        .map_err(|e| HandleCheckError::file_error(path.to_string_lossy(), e.to_string()))
}
