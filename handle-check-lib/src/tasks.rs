//! Building the ordered, deduplicated work queue for a run.

use crate::checkpoint::Checkpoint;
use crate::error::HandleCheckError;
use crate::types::Identifier;
use std::collections::HashSet;
use std::path::Path;

/// Assemble this run's queue from the raw input and the prior checkpoint.
///
/// Identifiers left pending by an interrupted run come first, in their
/// recorded order. Input identifiers follow in input order, skipping those
/// that already have a non-error outcome. Duplicates keep their first
/// position. The function is pure: the same input and checkpoint always yield
/// the same queue.
///
/// # Example
///
/// ```rust
/// use handle_check_lib::{assemble_tasks, Checkpoint};
///
/// let input = vec!["alice".to_string(), "bob".to_string(), "alice".to_string()];
/// let queue = assemble_tasks(&input, &Checkpoint::new());
/// assert_eq!(queue, vec!["alice".to_string(), "bob".to_string()]);
/// ```
pub fn assemble_tasks(input: &[Identifier], checkpoint: &Checkpoint) -> Vec<Identifier> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue = Vec::with_capacity(checkpoint.pending.len() + input.len());

    for identifier in &checkpoint.pending {
        if seen.insert(identifier.as_str()) {
            queue.push(identifier.clone());
        }
    }

    for identifier in input {
        let needs_check = match checkpoint.outcome(identifier) {
            Some(prior) => prior.status.is_retryable(),
            None => true,
        };
        if needs_check && seen.insert(identifier.as_str()) {
            queue.push(identifier.clone());
        }
    }

    queue
}

/// Parse identifiers from text, one per line.
///
/// Lines are trimmed; empty lines and lines starting with '#' are ignored.
pub fn parse_identifiers(content: &str) -> Vec<Identifier> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read identifiers from a file, one per line.
///
/// # Errors
///
/// Returns `FileError` if the file cannot be read.
pub fn read_identifiers(path: &Path) -> Result<Vec<Identifier>, HandleCheckError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HandleCheckError::file_error(
            path.to_string_lossy(),
            format!("Failed to read identifiers: {}", e),
        )
    })?;
    Ok(parse_identifiers(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Availability, Outcome};

    fn ids(names: &[&str]) -> Vec<Identifier> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let queue = assemble_tasks(&ids(&["alice", "bob", "alice"]), &Checkpoint::new());
        assert_eq!(queue, ids(&["alice", "bob"]));
    }

    #[test]
    fn test_prior_terminal_outcomes_are_skipped() {
        let mut checkpoint = Checkpoint::new();
        for (name, availability) in [
            ("alice", Availability::Taken),
            ("bob", Availability::Available),
            ("dave", Availability::Purchasable),
        ] {
            checkpoint
                .outcomes
                .insert(name.into(), Outcome::classified(name, availability));
        }
        checkpoint
            .outcomes
            .insert("carol".into(), Outcome::failed("carol", "timeout"));

        let queue = assemble_tasks(&ids(&["alice", "bob", "carol", "dave", "erin"]), &checkpoint);
        assert_eq!(queue, ids(&["carol", "erin"]));
    }

    #[test]
    fn test_pending_from_prior_run_comes_first() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.pending.extend(ids(&["zed", "yan"]));

        let queue = assemble_tasks(&ids(&["alice", "yan", "bob"]), &checkpoint);
        assert_eq!(queue, ids(&["zed", "yan", "alice", "bob"]));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.pending.extend(ids(&["zed"]));
        checkpoint
            .outcomes
            .insert("carol".into(), Outcome::failed("carol", "boom"));
        let input = ids(&["carol", "alice", "alice"]);

        let first = assemble_tasks(&input, &checkpoint);
        let second = assemble_tasks(&input, &checkpoint);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_identifiers_skips_blank_and_comments() {
        let parsed = parse_identifiers("alice\n\n  bob  \n# comment\r\ncarol\r\n");
        assert_eq!(parsed, ids(&["alice", "bob", "carol"]));
    }

    #[test]
    fn test_read_missing_file_is_file_error() {
        let err = read_identifiers(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, HandleCheckError::FileError { .. }));
    }
}
