// src/workspace.rs
//
// =============================================================================
// DRBOT: WORKSPACE MANAGER
// =============================================================================
//
// Lifecycle of the review-enabled workspace directory.
//
// A workspace may not exist yet (create it, from a template if one is
// configured), may exist without review capability (enable it), or may be
// fully prepared. It is destroyed only by an explicit clean, never mid-run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::{ReviewStore, StoreError};

/// Template session used as the basis for new sessions when present.
pub const DEFAULT_TEMPLATE_SESSION: &str = "Session 1 : empty";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Couldn't create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Deletion failed, e.g. the workspace is in use by another process.
    #[error("Couldn't delete workspace {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of making the workspace available, for degraded-status
/// reporting. `TemplateCopyFailed` means the workspace exists but the
/// configured template could not be fully copied; the workspace may carry
/// only part of the template's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Ready,
    TemplateCopyFailed,
}

/// Outcome of `prepare_session`, for degraded-status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPrep {
    Created,
    /// The template session was absent; the session was created without it.
    CreatedWithoutTemplate,
    /// Session creation failed twice. Non-fatal here; the session-id lookup
    /// downstream will come up empty and the run degrades.
    Failed,
}

pub struct WorkspaceManager {
    workspace: PathBuf,
    template: Option<PathBuf>,
    srid: i32,
}

impl WorkspaceManager {
    pub fn new(workspace: PathBuf, template: Option<PathBuf>, srid: i32) -> Self {
        Self {
            workspace,
            template,
            srid,
        }
    }

    /// Make sure the workspace exists and is review-enabled.
    ///
    /// A configured template workspace is copied recursively when the
    /// workspace is missing; copy failure is logged and falls through to
    /// plain creation, but is surfaced in the outcome so the run can report
    /// itself as degraded. Failing to create the plain workspace is fatal.
    pub fn ensure_workspace(&self) -> Result<EnsureOutcome, WorkspaceError> {
        if self.workspace.is_dir() {
            return Ok(EnsureOutcome::Ready);
        }

        log::info!("Making review workspace...");
        let mut copy_failed = false;
        if let Some(template) = &self.template {
            if template.is_dir() {
                if let Err(e) = copy_dir_recursive(template, &self.workspace) {
                    log::warn!(
                        "  Couldn't copy workspace template {}: {}",
                        template.display(),
                        e
                    );
                    copy_failed = true;
                }
            }
        }

        if !self.workspace.is_dir() {
            log::info!("Creating empty review workspace at {}...", self.workspace.display());
            fs::create_dir_all(&self.workspace).map_err(|source| WorkspaceError::Create {
                path: self.workspace.clone(),
                source,
            })?;
            // Idempotent: a no-op if the template already carried the tables.
            ReviewStore::open(&self.workspace).enable(self.srid)?;
        }
        Ok(if copy_failed {
            EnsureOutcome::TemplateCopyFailed
        } else {
            EnsureOutcome::Ready
        })
    }

    /// Delete the workspace recursively and recreate it. A deletion failure
    /// (workspace in use) returns early without recreating.
    pub fn clean_workspace(&self) -> Result<EnsureOutcome, WorkspaceError> {
        log::info!("Cleaning up review workspace...");
        if self.workspace.is_dir() {
            log::info!("Deleting workspace {}...", self.workspace.display());
            fs::remove_dir_all(&self.workspace).map_err(|source| {
                log::error!("Failed to delete existing workspace: {}", source);
                WorkspaceError::Delete {
                    path: self.workspace.clone(),
                    source,
                }
            })?;
        }
        self.ensure_workspace()
    }

    /// Ensure the workspace exists, then create a review session in it.
    ///
    /// Tries the default template session first; when this workspace has no
    /// such session, retries without a template. A second failure is logged
    /// in full and reported as `SessionPrep::Failed` rather than an error.
    pub fn prepare_session(&self, session_name: &str) -> Result<SessionPrep, WorkspaceError> {
        log::info!("Preparing review session...");
        self.ensure_workspace()?;

        log::info!("    Workspace: {}", self.workspace.display());
        let store = ReviewStore::open(&self.workspace);
        match store.create_session(session_name, Some(DEFAULT_TEMPLATE_SESSION)) {
            Ok(()) => Ok(SessionPrep::Created),
            Err(StoreError::TemplateMissing(_)) => {
                log::warn!("  Couldn't create reviewer session from template, ignoring template.");
                match store.create_session(session_name, None) {
                    Ok(()) => Ok(SessionPrep::CreatedWithoutTemplate),
                    Err(e) => {
                        log::error!("Problem while creating empty reviewer session: {:?}", e);
                        Ok(SessionPrep::Failed)
                    }
                }
            }
            Err(e) => {
                log::error!("Problem while creating reviewer session: {:?}", e);
                Ok(SessionPrep::Failed)
            }
        }
    }
}

/// Recursive directory copy; `dst` is created and must not already exist
/// with conflicting content.
fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
