// src/tmplog.rs
//
// =============================================================================
// DRBOT: TEMPORARY LOG
// =============================================================================
//
// An in-memory, ordered list of report lines accumulated during one run.
//
// This is the run's *report* channel, distinct from the process diagnostics
// that go through the `log` macros. Lines live until end of execution unless
// explicitly written to a file or handed to the mailer.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::mailer::Mailer;

#[derive(Debug, Default)]
pub struct TmpLog {
    lines: Vec<String>,
}

impl TmpLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Any displayable value is stringified.
    pub fn log(&mut self, msg: impl Display) {
        self.lines.push(msg.to_string());
    }

    /// Number of lines containing the substring.
    pub fn count_lines_with(&self, marker: &str) -> usize {
        self.lines.iter().filter(|l| l.contains(marker)).count()
    }

    /// Whether any line contains the substring.
    pub fn contains_line_with(&self, marker: &str) -> bool {
        self.lines.iter().any(|l| l.contains(marker))
    }

    /// Snapshot of the accumulated lines, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Write all lines to `path`, newline-terminated, replacing any existing
    /// file (overwrite, not append).
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for line in &self.lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }

    /// Email the log contents to `recipients`.
    ///
    /// When `count_marker` is non-empty, the number of lines containing it is
    /// appended to the subject ("... - N issues"). A transport failure is
    /// logged to the process diagnostics and swallowed: a run that otherwise
    /// succeeded must never be aborted by the mail relay.
    pub fn send_email(
        &self,
        mailer: &dyn Mailer,
        sender: &str,
        recipients: &[String],
        subject: &str,
        count_marker: &str,
    ) {
        let mut body = String::new();
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }

        let subject = if count_marker.is_empty() {
            subject.to_string()
        } else {
            format!("{} - {} issues", subject, self.count_lines_with(count_marker))
        };

        if let Err(e) = mailer.send(sender, recipients, &subject, &body) {
            log::error!("Couldn't send email: {:#}", e);
        }
    }
}
