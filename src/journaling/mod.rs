//! Getting outline edits onto disk: when to save, the thread that saves, and
//! the per-file UI preferences kept next to the data.

pub mod autosave;
pub mod preferences;
pub mod worker;

pub use autosave::{AutoSaveScheduler, FlushKind, Resolution, SaveStatus, SaveTicket};
pub use preferences::ExpansionPreferences;
pub use worker::{SaveCompletion, SaveWorker};
