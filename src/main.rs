// src/main.rs
//
// =============================================================================
// DRBOT: ENTRY POINT
// =============================================================================
//
// Command line:
//   drbot [rulefile [logfile [database [email]]]]
//   drbot clean
//
// rulefile may be a single rule-job file, or a .txt manifest listing one
// rule-job file per line. "clean" wipes and recreates the review workspace
// and does nothing else (useful before a weekly batch).
//
// Exit codes: 0 = completed, 2 = degraded (partial report), 1 = failed.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use drbot::bot::DrBot;
use drbot::config::BotConfig;
use drbot::engine::ProcessEngine;
use drbot::mailer::SmtpMailer;

#[derive(Parser)]
#[command(
    name = "drbot",
    version,
    about = "Batch QA runner for an external data-review engine"
)]
struct Cli {
    /// Rule-job file, .txt manifest, or the literal `clean`.
    rulefile: Option<String>,

    /// Output log file; its basename also seeds the session name.
    logfile: Option<String>,

    /// Database to be checked (overrides the configured one).
    database: Option<String>,

    /// Comma-separated recipient list.
    email: Option<String>,

    /// JSON configuration file (defaults apply for absent keys).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match BotConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{:#}", e);
                process::exit(1);
            }
        },
        None => BotConfig::default(),
    };

    let engine = ProcessEngine::new(config.reviewer_command.clone());
    let mailer = SmtpMailer::new(config.mail_relay.clone());
    let mut bot = DrBot::new(config, Box::new(engine), Box::new(mailer));

    match bot.run_from_args(cli.rulefile, cli.logfile, cli.database, cli.email) {
        Ok(status) => process::exit(status.exit_code()),
        Err(e) => {
            log::error!("drbot failed: {:#}", e);
            process::exit(1);
        }
    }
}
