// src/config.rs
//
// =============================================================================
// DRBOT: CONFIGURATION
// =============================================================================
//
// One explicit configuration struct, handed to the orchestrator at
// construction. Every field has a documented default; a JSON file can
// override any subset, and command-line arguments override on top of that.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// The database to be checked (file workspace or connection string).
    pub database: String,

    /// The review workspace where findings are written. May or may not exist.
    pub workspace: PathBuf,

    /// Optional template workspace, copied when the workspace must be created.
    pub template_workspace: Option<PathBuf>,

    /// Spatial reference used when enabling review capability (default: WGS84).
    pub srid: i32,

    /// Rule spec used when none is given on the command line.
    pub default_rules: String,

    /// SMTP relay host for the summary email.
    pub mail_relay: String,

    /// Sender identity for the summary email.
    pub mail_sender: String,

    /// Recipient addresses; empty disables email reporting.
    pub recipients: Vec<String>,

    /// Substring marking a finding in report lines, counted into the email
    /// subject and used to decide whether a mail is worth sending.
    pub found_marker: String,

    /// Send the summary email even when no findings were recorded.
    pub always_send_mail: bool,

    /// External reviewer command driven by the process engine.
    pub reviewer_command: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            database: "testdata.gdb".into(),
            workspace: PathBuf::from("drbot_ws"),
            template_workspace: None,
            srid: 4326,
            default_rules: "rules/sample1.rbj".into(),
            mail_relay: "localhost".into(),
            mail_sender: "Batch Script <drbot@localhost>".into(),
            recipients: Vec::new(),
            found_marker: "Found".into(),
            always_send_mail: true,
            reviewer_command: "reviewer".into(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a JSON file; absent keys fall back to the
    /// defaults above.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
