// src/rules.rs
//
// =============================================================================
// DRBOT: RULE RUNNER
// =============================================================================
//
// Resolves a rule specification into concrete rule-job files and runs each
// through the engine's batch-job entry point.
//
// A spec is either a single rule-job file, or a `.txt` manifest listing one
// rule-job path per line (`#` comments allowed, relative paths resolved
// against the manifest's directory).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::{EngineError, ReviewerEngine, ERR_RULE_FILE_MISSING};
use crate::tmplog::TmpLog;

#[derive(Debug, Error)]
pub enum RulesError {
    /// The manifest itself is missing; the run aborts early.
    #[error("Rule manifest {0} not found")]
    ManifestMissing(PathBuf),

    /// The manifest could not be read for another reason. The caller logs
    /// the detail and continues with whatever was parsed.
    #[error("Couldn't read rule manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// If `path` is relative, make it absolute by prefixing `basepath`.
///
/// Absolute means: second character is a drive-separator colon, or the first
/// character is a forward slash. This exact test targets the engine's path
/// convention and must not be widened.
pub fn fix_path(path: &str, basepath: &Path) -> PathBuf {
    let mut chars = path.chars();
    let first = chars.next();
    let second = chars.next();
    if second == Some(':') || first == Some('/') {
        PathBuf::from(path)
    } else {
        basepath.join(path)
    }
}

/// Resolve a rule spec into the list of rule-job files to execute.
///
/// A spec whose name contains `.txt` is read as a manifest: lines starting
/// with `#` and empty lines are dropped, relative paths are resolved against
/// the manifest's directory. Anything else is a single rule-job file.
/// Resolved paths are used as-is; existence is the engine's problem.
pub fn resolve_rule_files(spec: &str) -> Result<Vec<PathBuf>, RulesError> {
    if !spec.contains(".txt") {
        return Ok(vec![PathBuf::from(spec)]);
    }

    let path = Path::new(spec);
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            RulesError::ManifestMissing(path.to_path_buf())
        } else {
            RulesError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(text
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| fix_path(line, base))
        .collect())
}

/// Run every rule file through the engine.
///
/// Error code 732 (rule file not found) is reported into the temporary log
/// and execution continues with the next file. Any other engine error aborts
/// the remaining files and propagates to the orchestrator's phase wrapper.
pub fn execute_all(
    engine: &dyn ReviewerEngine,
    workspace: &Path,
    session_id: &str,
    rule_files: &[PathBuf],
    database: &str,
    tmp_log: &mut TmpLog,
) -> Result<(), EngineError> {
    for rule_file in rule_files {
        log::info!("  Checking file: {}", rule_file.display());
        match engine.execute_batch_job(workspace, session_id, rule_file, database) {
            Ok(()) => {}
            Err(EngineError::Execute {
                code: ERR_RULE_FILE_MISSING,
                ..
            }) => {
                tmp_log.log(format!(
                    "Found execution error: File {} not found.",
                    rule_file.display()
                ));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
