// src/lib.rs
//
// =============================================================================
// DRBOT: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod bot;
pub mod config;
pub mod engine;
pub mod mailer;
pub mod rules;
pub mod store;
pub mod summary;
pub mod tmplog;
pub mod workspace;

// 2. Re-exports (The Public API)
// These allow `use drbot::DrBot` or `use drbot::TmpLog` to work elsewhere.

pub use bot::{DrBot, RunStatus};
pub use config::BotConfig;
pub use engine::{EngineError, ProcessEngine, ReviewerEngine};
pub use mailer::{Mailer, SmtpMailer};
pub use store::{Finding, ReviewStore};
pub use tmplog::TmpLog;
pub use workspace::WorkspaceManager;
