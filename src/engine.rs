// src/engine.rs
//
// =============================================================================
// DRBOT: REVIEWER ENGINE PORT
// =============================================================================
//
// The Hexagonal Port to the external data-review engine.
//
// Responsibilities:
// 1. Define the `ReviewerEngine` trait (license bracket + batch-job entry
//    point). All geometry/attribute validation happens on the far side of
//    this trait; drbot only sequences calls into it.
// 2. Translate the engine's free-text error messages into typed codes, so
//    nothing outside this module ever inspects raw engine output.
// 3. Provide `ProcessEngine`, which drives a reviewer command-line tool as a
//    blocking child process.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Engine code for "referenced rule file not found". The one execution error
/// a batch run recovers from: the offending file is reported and the
/// remaining rule files still run.
pub const ERR_RULE_FILE_MISSING: u32 = 732;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine reported a numbered execution error.
    #[error("Reviewer error {code}: {message}")]
    Execute { code: u32, message: String },

    /// The engine failed without a recognizable error code.
    #[error("Reviewer process failed: {0}")]
    Process(String),

    #[error("Failed to launch reviewer command: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Entry points the external review engine must expose.
///
/// The engine owns the findings: `execute_batch_job` writes rows into the
/// review tables of `workspace`, scoped to the session named by
/// `session_id`. The session id string must be exactly
/// `Session <id> : <name>` (single space before and after the colon) or the
/// engine call fails.
pub trait ReviewerEngine {
    fn checkout_license(&self) -> Result<(), EngineError>;
    fn checkin_license(&self) -> Result<(), EngineError>;
    fn execute_batch_job(
        &self,
        workspace: &Path,
        session_id: &str,
        rule_file: &Path,
        database: &str,
    ) -> Result<(), EngineError>;
}

// ============================================================================
// LICENSE GUARD
// ============================================================================

/// Scoped extension license. Checkin runs on drop, so it happens even when
/// the rule-execution phase errors out.
pub struct LicenseGuard<'a> {
    engine: &'a dyn ReviewerEngine,
}

impl Drop for LicenseGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.checkin_license() {
            log::error!("Failed to check the reviewer license back in: {}", e);
        }
    }
}

/// Check out the review extension license, returning the guard that checks
/// it back in. Only one checkout should be outstanding per process.
pub fn checkout(engine: &dyn ReviewerEngine) -> Result<LicenseGuard<'_>, EngineError> {
    engine.checkout_license()?;
    Ok(LicenseGuard { engine })
}

// ============================================================================
// ERROR-CODE TRANSLATION
// ============================================================================

/// Extract the numeric error code from an engine message such as
/// "ERROR 000732: File not found". Returns `None` when the message carries
/// no recognizable code.
pub fn parse_error_code(message: &str) -> Option<u32> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"ERROR 0*([1-9]\d*):").expect("static error-code pattern")
    });
    re.captures(message)?.get(1)?.as_str().parse().ok()
}

/// Last `n` lines of a stderr capture, in reading order.
pub fn stderr_tail(stderr: &str, n: usize) -> String {
    let mut tail: Vec<&str> = stderr.lines().rev().take(n).collect();
    tail.reverse();
    tail.join("\n")
}

// ============================================================================
// PROCESS ENGINE
// ============================================================================

/// Drives an external reviewer CLI as a blocking child process.
///
/// Subcommand contract:
///   <cmd> checkout-license datareviewer
///   <cmd> checkin-license datareviewer
///   <cmd> execute-batch-job <workspace> <session-id> <rule-file> <database>
///
/// The tool is expected to write findings into the review tables inside the
/// workspace and to report failures on stderr as "ERROR 0<code>: <text>".
pub struct ProcessEngine {
    command: String,
}

impl ProcessEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<(), EngineError> {
        let output = Command::new(&self.command)
            .args(args)
            .output()
            .map_err(EngineError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        log::error!(
            "Reviewer command failed. Exit: {:?}\nSTDERR tail:\n{}",
            output.status.code(),
            stderr_tail(&stderr, 10)
        );

        match parse_error_code(&stderr) {
            Some(code) => Err(EngineError::Execute {
                code,
                message: stderr.trim().to_string(),
            }),
            None => Err(EngineError::Process(format!(
                "exit {:?}: {}",
                output.status.code(),
                stderr.trim()
            ))),
        }
    }
}

impl ReviewerEngine for ProcessEngine {
    fn checkout_license(&self) -> Result<(), EngineError> {
        self.run(&["checkout-license", "datareviewer"])
    }

    fn checkin_license(&self) -> Result<(), EngineError> {
        self.run(&["checkin-license", "datareviewer"])
    }

    fn execute_batch_job(
        &self,
        workspace: &Path,
        session_id: &str,
        rule_file: &Path,
        database: &str,
    ) -> Result<(), EngineError> {
        self.run(&[
            "execute-batch-job",
            &workspace.display().to_string(),
            session_id,
            &rule_file.display().to_string(),
            database,
        ])
    }
}
