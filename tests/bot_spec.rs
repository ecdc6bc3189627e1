mod common;

use std::fs;
use std::path::PathBuf;

use drbot::bot::{DrBot, RunStatus};
use drbot::config::BotConfig;

use common::{MockEngine, RecordingMailer};

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> BotConfig {
        BotConfig {
            database: "test.gdb".into(),
            workspace: self.dir.path().join("drbot_ws"),
            recipients: vec!["qa@example.org".into()],
            ..BotConfig::default()
        }
    }

    fn manifest(&self, lines: &str) -> String {
        let path = self.dir.path().join("rules.txt");
        fs::write(&path, lines).unwrap();
        path.display().to_string()
    }

    fn logfile(&self) -> PathBuf {
        self.dir.path().join("nulls.log")
    }
}

#[test]
fn full_run_reports_to_file_and_email() {
    let fx = Fixture::new();
    let rules = fx.manifest("ruleA.rbj\n# ruleB.rbj\nruleC.rbj\n");
    let (engine, state) = MockEngine::new();
    let (mailer, sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    assert_eq!(status, RunStatus::Completed);

    // Both non-comment rule files ran, with the exact session id format.
    {
        let state = state.lock().unwrap();
        assert_eq!(state.checkouts, 1);
        assert_eq!(state.checkins, 1);
        assert_eq!(
            state.executed,
            vec![
                fx.dir.path().join("ruleA.rbj"),
                fx.dir.path().join("ruleC.rbj")
            ]
        );
        assert_eq!(state.session_ids[0], "Session 1 : nulls.log");
    }

    // Two findings per rule file, grouped under two distinct check titles.
    let log_text = fs::read_to_string(fx.logfile()).unwrap();
    assert_eq!(log_text.matches("Found ").count(), 4);
    assert!(log_text.contains("Total 2 hits for ruleA check"));
    assert!(log_text.contains("Total 2 hits for ruleC check"));
    assert!(log_text.contains("Checking test.gdb"));
    assert!(log_text.contains("Done"));

    // Email carries the same report, with the issue count in the subject.
    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "DRBot Run, rules.txt - 4 issues");
    assert_eq!(sent[0].recipients, vec!["qa@example.org".to_string()]);
    assert!(sent[0].body.contains("Total 2 hits for ruleA check"));
}

#[cfg(unix)]
#[test]
fn failed_template_copy_degrades_the_run() {
    use std::os::unix::fs::symlink;

    let fx = Fixture::new();
    let template = fx.dir.path().join("template_ws");
    fs::create_dir_all(&template).unwrap();
    symlink(fx.dir.path().join("gone"), template.join("broken")).unwrap();

    let rules = fx.manifest("ruleA.rbj\n");
    let (engine, state) = MockEngine::new();
    let (mailer, _sent) = RecordingMailer::new();
    let mut config = fx.config();
    config.template_workspace = Some(template);
    let mut bot = DrBot::new(config, Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    // The workspace may hold only part of the template, so the run must
    // not look clean even though it carried on.
    assert_eq!(status, RunStatus::Degraded);
    assert_eq!(state.lock().unwrap().checkins, 1);
    assert!(fs::read_to_string(fx.logfile()).unwrap().contains("Done"));
}

#[test]
fn rule_file_not_found_degrades_nothing() {
    let fx = Fixture::new();
    let rules = fx.manifest("ruleA.rbj\nmissing.rbj\n");
    let (engine, state) = MockEngine::new();
    let engine = engine.failing("missing.rbj", 732);
    let (mailer, _sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    assert_eq!(status, RunStatus::Completed);
    assert_eq!(state.lock().unwrap().executed.len(), 2);

    let log_text = fs::read_to_string(fx.logfile()).unwrap();
    assert!(log_text.contains("Found execution error: File"));
    assert!(log_text.contains("Total 2 hits for ruleA check"));
}

#[test]
fn other_engine_errors_abort_the_batch_but_license_is_checked_in() {
    let fx = Fixture::new();
    let rules = fx.manifest("bad.rbj\nnever-run.rbj\n");
    let (engine, state) = MockEngine::new();
    let engine = engine.failing("bad.rbj", 999);
    let (mailer, _sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    assert_eq!(status, RunStatus::Degraded);
    {
        let state = state.lock().unwrap();
        assert_eq!(state.executed, vec![fx.dir.path().join("bad.rbj")]);
        assert_eq!(state.checkins, 1, "checkin must survive the phase error");
    }

    // The partial report still reaches the file.
    let log_text = fs::read_to_string(fx.logfile()).unwrap();
    assert!(log_text.contains("Exception during DRBot run"));
    assert!(log_text.contains("Done"));
}

#[test]
fn missing_manifest_fails_the_run_but_still_reports() {
    let fx = Fixture::new();
    let rules = fx.dir.path().join("nope.txt").display().to_string();
    let (engine, state) = MockEngine::new();
    let (mailer, _sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    assert_eq!(status, RunStatus::Failed);
    assert!(state.lock().unwrap().executed.is_empty());

    let log_text = fs::read_to_string(fx.logfile()).unwrap();
    assert!(log_text.contains("ERROR reading rules"));
}

#[test]
fn clean_mode_is_exclusive() {
    let fx = Fixture::new();
    let ws = fx.config().workspace;
    let (engine, state) = MockEngine::new();
    let (mailer, sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(Some("clean".into()), None, None, None)
        .unwrap();

    assert_eq!(status, RunStatus::Completed);
    assert!(ws.is_dir());
    assert!(bot.tmp_log().contains_line_with("Cleanup completed."));

    // No license, no rules, no report.
    assert_eq!(state.lock().unwrap().checkouts, 0);
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn cli_overrides_for_database_and_recipients() {
    let fx = Fixture::new();
    let rules = fx.manifest("ruleA.rbj\n");
    let (engine, _state) = MockEngine::new();
    let (mailer, sent) = RecordingMailer::new();
    let mut bot = DrBot::new(fx.config(), Box::new(engine), Box::new(mailer));

    bot.run_from_args(
        Some(rules),
        Some(fx.logfile().display().to_string()),
        Some("editor@ora.sde".into()),
        Some("a@example.org, b@example.org".into()),
    )
    .unwrap();

    assert!(bot.tmp_log().contains_line_with("Checking editor@ora.sde"));
    let sent = sent.lock().unwrap();
    assert_eq!(
        sent[0].recipients,
        vec!["a@example.org".to_string(), "b@example.org".to_string()]
    );
}

#[test]
fn findings_only_email_policy() {
    let fx = Fixture::new();
    let rules = fx.manifest("# nothing enabled\n");
    let (engine, _state) = MockEngine::new();
    let (mailer, sent) = RecordingMailer::new();
    let mut config = fx.config();
    config.always_send_mail = false;
    let mut bot = DrBot::new(config, Box::new(engine), Box::new(mailer));

    let status = bot
        .run_from_args(
            Some(rules),
            Some(fx.logfile().display().to_string()),
            None,
            None,
        )
        .unwrap();

    // Zero rule files, zero findings: legal, and nothing worth mailing.
    assert_eq!(status, RunStatus::Completed);
    assert!(bot.tmp_log().contains_line_with("No errors found."));
    assert!(sent.lock().unwrap().is_empty());
}
