//! Application startup hook.
//!
//! On a cold boot, rebuilds the autocomplete index of every enabled
//! repository collection and mails the monitor list that the server started.
//! A warm boot (`APP_START_FROM` set) skips all of it.

pub mod sequencer;
pub mod store;

pub use sequencer::{
    CollectionFailure, StartupError, StartupOutcome, StartupPhase, StartupReport,
    StartupSequencer, AUTOCOMPLETE_TASK, STARTUP_MAIL_SUBJECT,
};
pub use store::{CollectionStore, StoreError};
