// src/bot.rs
//
// =============================================================================
// DRBOT: ORCHESTRATOR
// =============================================================================
//
// Sequences one batch QA run, linear with no loops back:
//
//   license checkout -> workspace/session prep -> rule execution ->
//   summarize -> license checkin -> report (file and/or email)
//
// The license checkin is an RAII guard, so it runs even when the
// execution-and-summarize phase errors out. Phase errors are recorded in the
// report instead of propagating: a partial report reaching the recipients
// beats a clean crash.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::BotConfig;
use crate::engine::{self, ReviewerEngine};
use crate::mailer::Mailer;
use crate::rules::{self, RulesError};
use crate::store::{self, ReviewStore};
use crate::summary;
use crate::tmplog::TmpLog;
use crate::workspace::{EnsureOutcome, SessionPrep, WorkspaceManager};

/// How a run ended. Degraded runs still produce a report; the distinction
/// exists so callers and schedulers stop mistaking partial runs for clean
/// ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Something non-fatal went wrong along the way (template fallback
    /// exhausted, missing session id, an aborted rule batch); the report
    /// may be incomplete.
    Degraded,
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Degraded => 2,
            RunStatus::Failed => 1,
        }
    }
}

pub struct DrBot {
    config: BotConfig,
    engine: Box<dyn ReviewerEngine>,
    mailer: Box<dyn Mailer>,
    tmp_log: TmpLog,
}

impl DrBot {
    pub fn new(config: BotConfig, engine: Box<dyn ReviewerEngine>, mailer: Box<dyn Mailer>) -> Self {
        Self {
            config,
            engine,
            mailer,
            tmp_log: TmpLog::new(),
        }
    }

    /// The run's accumulated report lines.
    pub fn tmp_log(&self) -> &TmpLog {
        &self.tmp_log
    }

    /// Run from command-line inputs: apply overrides, run the checks, then
    /// report. A first argument of `clean` selects the exclusive clean mode.
    pub fn run_from_args(
        &mut self,
        rulefile: Option<String>,
        logfile: Option<String>,
        database: Option<String>,
        email: Option<String>,
    ) -> Result<RunStatus> {
        if rulefile.as_deref() == Some("clean") {
            return self.clean();
        }

        let rules = rulefile.unwrap_or_else(|| self.config.default_rules.clone());
        let logfile = logfile.unwrap_or_default();
        if let Some(db) = database {
            self.config.database = db;
        }
        if let Some(list) = email {
            self.config.recipients = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let session_name = session_name_from(&logfile);
        let status = self.run(&rules, &session_name);

        let subject = format!("DRBot Run, {}", basename(&rules));
        self.report_output(&logfile, &subject)?;
        Ok(status)
    }

    /// Exclusive clean mode: wipe and recreate the workspace, nothing else.
    /// No license checkout, no rule execution, no report.
    pub fn clean(&mut self) -> Result<RunStatus> {
        let mgr = self.workspace_manager();
        match mgr.clean_workspace() {
            Ok(outcome) => {
                self.tmp_log.log("Cleanup completed.");
                Ok(if outcome == EnsureOutcome::TemplateCopyFailed {
                    RunStatus::Degraded
                } else {
                    RunStatus::Completed
                })
            }
            Err(e) => {
                log::error!("Workspace cleanup failed: {:#}", anyhow::Error::from(e));
                Ok(RunStatus::Failed)
            }
        }
    }

    /// Run the checks in `rules` against the configured database, writing
    /// findings into a session named after `session_keyword`.
    pub fn run(&mut self, rules: &str, session_keyword: &str) -> RunStatus {
        self.tmp_log
            .log(format!("Start time: {}", Local::now().format("%Y-%m-%d %H:%M:%S")));
        let t0 = Local::now();

        // Split borrows: the license guard holds the engine for the whole
        // phase while the phase itself needs the log and config.
        let Self {
            config,
            engine,
            tmp_log,
            ..
        } = self;
        let eng: &dyn ReviewerEngine = engine.as_ref();

        let license = match engine::checkout(eng) {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("Couldn't check out a reviewer license: {}", e);
                tmp_log.log(format!("Couldn't check out a reviewer license: {}", e));
                return RunStatus::Failed;
            }
        };

        let status = match run_phase(config, eng, tmp_log, rules, session_keyword) {
            Ok(status) => status,
            Err(e) => {
                log::error!("Exception during DRBot run: {:#}", e);
                tmp_log.log(format!("Exception during DRBot run: {:#}", e));
                RunStatus::Degraded
            }
        };

        drop(license); // checkin

        tmp_log.log("Done");
        let duration = Local::now() - t0;
        tmp_log.log(format!(
            "\nTotal drbot duration (h:mm:ss.cc): {}",
            format_duration(duration)
        ));
        status
    }

    /// Report the run's output to the desired channels: log file when a path
    /// was given (write errors propagate), email when there is someone to
    /// mail and either always-send is on or findings were recorded.
    pub fn report_output(&self, logfile: &str, subject: &str) -> Result<()> {
        if !logfile.is_empty() {
            self.tmp_log
                .write_to_file(logfile)
                .with_context(|| format!("Couldn't write log file {}", logfile))?;
        }

        let send = self.config.always_send_mail
            || self.tmp_log.contains_line_with(&self.config.found_marker);
        if send && !self.config.recipients.is_empty() {
            self.tmp_log.send_email(
                self.mailer.as_ref(),
                &self.config.mail_sender,
                &self.config.recipients,
                subject,
                &self.config.found_marker,
            );
        }
        Ok(())
    }

    fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(
            self.config.workspace.clone(),
            self.config.template_workspace.clone(),
            self.config.srid,
        )
    }
}

/// The license-bracketed phase: resolve rules, prepare workspace/session,
/// execute, summarize.
fn run_phase(
    config: &BotConfig,
    engine: &dyn ReviewerEngine,
    tmp_log: &mut TmpLog,
    rules: &str,
    session_name: &str,
) -> Result<RunStatus> {
    let mut degraded = false;

    log::info!("Loading rule file(s) from {}...", rules);
    let rule_files = match rules::resolve_rule_files(rules) {
        Ok(files) => files,
        Err(RulesError::ManifestMissing(path)) => {
            log::error!("ERROR reading rules {}: no such file.", path.display());
            tmp_log.log(format!("ERROR reading rules {}.", path.display()));
            return Ok(RunStatus::Failed);
        }
        Err(RulesError::Read { path, source }) => {
            log::error!("ERROR reading rules {}: {:?}", path.display(), source);
            degraded = true;
            Vec::new()
        }
    };

    let mgr = WorkspaceManager::new(
        config.workspace.clone(),
        config.template_workspace.clone(),
        config.srid,
    );
    // A workspace left without (all of) its template is still usable, but
    // the run must not look clean afterwards. `prepare_session` re-runs
    // this as an idempotent no-op.
    if mgr.ensure_workspace()? == EnsureOutcome::TemplateCopyFailed {
        degraded = true;
    }
    // Falling back to a template-less session is routine (most workspaces
    // carry no template session); only a double failure degrades the run.
    let prep = mgr.prepare_session(session_name)?;
    if prep == SessionPrep::Failed {
        degraded = true;
    }

    let store = ReviewStore::open(&config.workspace);
    let Some(session_id) = store.find_session_id(session_name)? else {
        log::error!("Session '{}' not found in workspace, ending run.", session_name);
        tmp_log.log(format!(
            "Session '{}' was not created; no checks were run.",
            session_name
        ));
        return Ok(RunStatus::Degraded);
    };

    let session_id_str = store::format_session_id(session_id, session_name);
    log::info!("  Created session:\n    {}", session_id_str);
    tmp_log.log(format!("Checking {}", config.database));
    tmp_log.log(format!(
        "Errors will be written to {}",
        config.workspace.display()
    ));

    rules::execute_all(
        engine,
        &config.workspace,
        &session_id_str,
        &rule_files,
        &config.database,
        tmp_log,
    )?;

    log::info!("Checks completed, summarising output.");
    let findings = store.findings_for_session(session_id)?;
    summary::summarize(&findings, &config.found_marker, tmp_log);

    Ok(if degraded {
        RunStatus::Degraded
    } else {
        RunStatus::Completed
    })
}

/// Session name seeded from the log file's basename; `drbot` when no log
/// file was given.
fn session_name_from(logfile: &str) -> String {
    let name = basename(logfile);
    if name.is_empty() {
        "drbot".to_string()
    } else {
        name
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// h:mm:ss with centiseconds, for the total-duration report line.
fn format_duration(d: chrono::Duration) -> String {
    let total_ms = d.num_milliseconds().max(0);
    let h = total_ms / 3_600_000;
    let m = (total_ms / 60_000) % 60;
    let s = (total_ms / 1_000) % 60;
    let cs = (total_ms % 1_000) / 10;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, cs)
}
