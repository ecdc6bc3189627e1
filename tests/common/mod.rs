// Shared test doubles: a reviewer engine that writes findings straight into
// the workspace's review database, and a mailer that records messages.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use drbot::engine::{EngineError, ReviewerEngine};
use drbot::mailer::Mailer;
use drbot::store::{parse_session_id, REVIEW_DB};

#[derive(Debug, Default)]
pub struct EngineState {
    pub checkouts: usize,
    pub checkins: usize,
    pub executed: Vec<PathBuf>,
    pub session_ids: Vec<String>,
}

/// Simulated review engine. On success it inserts `findings_per_rule` rows
/// for the session named in the session id string; rule files listed in
/// `failures` raise the given engine error code instead.
pub struct MockEngine {
    pub state: Arc<Mutex<EngineState>>,
    pub failures: HashMap<String, u32>,
    pub findings_per_rule: usize,
}

impl MockEngine {
    pub fn new() -> (Self, Arc<Mutex<EngineState>>) {
        let state = Arc::new(Mutex::new(EngineState::default()));
        (
            Self {
                state: state.clone(),
                failures: HashMap::new(),
                findings_per_rule: 2,
            },
            state,
        )
    }

    pub fn failing(mut self, rule_name: &str, code: u32) -> Self {
        self.failures.insert(rule_name.to_string(), code);
        self
    }
}

impl ReviewerEngine for MockEngine {
    fn checkout_license(&self) -> Result<(), EngineError> {
        self.state.lock().unwrap().checkouts += 1;
        Ok(())
    }

    fn checkin_license(&self) -> Result<(), EngineError> {
        self.state.lock().unwrap().checkins += 1;
        Ok(())
    }

    fn execute_batch_job(
        &self,
        workspace: &Path,
        session_id: &str,
        rule_file: &Path,
        _database: &str,
    ) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            state.executed.push(rule_file.to_path_buf());
            state.session_ids.push(session_id.to_string());
        }

        let name = rule_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(code) = self.failures.get(&name) {
            return Err(EngineError::Execute {
                code: *code,
                message: format!("ERROR {:06}: simulated failure for {}", code, name),
            });
        }

        // The real engine rejects a malformed session id string.
        let Some((id, _)) = parse_session_id(session_id) else {
            return Err(EngineError::Process(format!(
                "bad session id string '{}'",
                session_id
            )));
        };

        let stem = rule_file
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let conn = Connection::open(workspace.join(REVIEW_DB))
            .map_err(|e| EngineError::Process(e.to_string()))?;
        for i in 0..self.findings_per_rule {
            conn.execute(
                "INSERT INTO REVTABLEMAIN (SESSIONID, CHECKTITLE, ORIGINTABLE, SUBTYPE, NOTES)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    format!("{} check", stem),
                    "roads",
                    "",
                    format!("simulated finding {}", i)
                ],
            )
            .map_err(|e| EngineError::Process(e.to_string()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SentMail {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Records messages instead of delivering them; optionally fails every send.
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<SentMail>>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn new() -> (Self, Arc<Mutex<Vec<SentMail>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sent: sent.clone(),
                fail: false,
            },
            sent,
        )
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, sender: &str, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("relay unreachable"));
        }
        self.sent.lock().unwrap().push(SentMail {
            sender: sender.to_string(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
