//! Startup sequence: boot-mode check, per-collection autocomplete rebuild,
//! monitor mail.
//!
//! Failure boundaries:
//! - task catalog load and collection listing propagate as [`StartupError`];
//! - a single task invocation failure is logged at error and the loop goes on;
//! - a monitor mail failure is logged at warn and the sequence still finishes.

use repocrawl_core::{BootMode, Collection};
use repocrawl_notify::MonitorNotifier;
use repocrawl_tasks::{TaskError, TaskLoader, TaskRegistry};

use crate::store::{CollectionStore, StoreError};

/// Task run once per enabled collection, with the setting id as argument.
pub const AUTOCOMPLETE_TASK: &str = "crawl_collections:make_autocomplete";

pub const STARTUP_MAIL_SUBJECT: &str = "Server startup";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load task definitions: {0}")]
    Tasks(#[from] TaskError),

    #[error("failed to list enabled collections: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Skipped,
    Running,
    Done,
}

impl std::fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupPhase::Skipped => write!(f, "skipped"),
            StartupPhase::Running => write!(f, "running"),
            StartupPhase::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub collection_id: i64,
    pub setting_id: Option<i64>,
    pub reason: String,
}

/// What a completed run did. Only produced when the run reached `done`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Setting ids whose task invocation succeeded, in invocation order.
    pub succeeded: Vec<i64>,
    pub failed: Vec<CollectionFailure>,
    pub mail_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Skipped { start_from: String },
    Completed(StartupReport),
}

impl StartupOutcome {
    #[must_use]
    pub fn phase(&self) -> StartupPhase {
        match self {
            StartupOutcome::Skipped { .. } => StartupPhase::Skipped,
            StartupOutcome::Completed(_) => StartupPhase::Done,
        }
    }
}

pub struct StartupSequencer<'a> {
    tasks: &'a dyn TaskLoader,
    store: &'a dyn CollectionStore,
    notifier: &'a dyn MonitorNotifier,
}

impl<'a> StartupSequencer<'a> {
    #[must_use]
    pub fn new(
        tasks: &'a dyn TaskLoader,
        store: &'a dyn CollectionStore,
        notifier: &'a dyn MonitorNotifier,
    ) -> Self {
        Self {
            tasks,
            store,
            notifier,
        }
    }

    /// Run the startup hook once.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the task definitions cannot be loaded or
    /// the enabled collections cannot be listed. Task and mail failures are
    /// logged and reported in the [`StartupReport`] instead.
    pub async fn run(&self, boot_mode: &BootMode) -> Result<StartupOutcome, StartupError> {
        if let BootMode::Warm { start_from } = boot_mode {
            tracing::info!(
                phase = %StartupPhase::Skipped,
                start_from = %start_from,
                "skip initializing"
            );
            return Ok(StartupOutcome::Skipped {
                start_from: start_from.clone(),
            });
        }

        tracing::info!(phase = %StartupPhase::Running, "initializing application started");

        let mut registry = self.tasks.load()?;
        let collections = self.store.list_enabled_collections().await?;
        tracing::debug!(count = collections.len(), "loaded enabled collections");

        let mut report = StartupReport::default();
        for collection in &collections {
            run_autocomplete(&mut registry, collection, &mut report).await;
        }

        match self.notifier.send_monitor_mail(STARTUP_MAIL_SUBJECT).await {
            Ok(()) => report.mail_sent = true,
            Err(e) => tracing::warn!(error = %e, "failed to send startup mail: {e}"),
        }

        tracing::info!(
            phase = %StartupPhase::Done,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "done"
        );
        Ok(StartupOutcome::Completed(report))
    }
}

/// Invoke the autocomplete task for one collection. Never fails: every
/// problem is logged and recorded in `report`.
async fn run_autocomplete(
    registry: &mut TaskRegistry,
    collection: &Collection,
    report: &mut StartupReport,
) {
    let Some(id) = collection.setting_id() else {
        tracing::error!(
            task = AUTOCOMPLETE_TASK,
            collection_id = collection.id,
            "failed to invoke {AUTOCOMPLETE_TASK}: collection {} has no settings",
            collection.id
        );
        report.failed.push(CollectionFailure {
            collection_id: collection.id,
            setting_id: None,
            reason: "collection has no settings".to_string(),
        });
        return;
    };

    let result = match registry.reenable(AUTOCOMPLETE_TASK) {
        Ok(()) => registry
            .invoke(AUTOCOMPLETE_TASK, &[id.to_string()])
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            tracing::info!(
                task = AUTOCOMPLETE_TASK,
                setting_id = id,
                "succeed to invoke: {AUTOCOMPLETE_TASK}, id={id}"
            );
            report.succeeded.push(id);
        }
        Err(e) => {
            tracing::error!(
                task = AUTOCOMPLETE_TASK,
                setting_id = id,
                error = %e,
                "failed to invoke: {AUTOCOMPLETE_TASK}, id={id}"
            );
            report.failed.push(CollectionFailure {
                collection_id: collection.id,
                setting_id: Some(id),
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
#[path = "sequencer_test.rs"]
mod tests;
