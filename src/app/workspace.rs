use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::journaling::{
    AutoSaveScheduler, ExpansionPreferences, FlushKind, Resolution, SaveCompletion, SaveStatus,
    SaveTicket, SaveWorker,
};
use crate::outline::{
    DecodePolicy, InputContext, Key, KeyInput, KeyOutcome, Modifiers, OutlineSession,
};
use crate::storage::FileStore;

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Manual save requested through the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualSave {
    Queued,
    /// Nothing to do: a save is running or everything is already saved.
    Refused(SaveStatus),
    NoFile,
}

/// The open outline file plus everything that keeps it persisted. Owns the
/// save worker; dropping the workspace stops it.
pub struct Workspace {
    store: Arc<dyn FileStore>,
    scheduler: AutoSaveScheduler,
    worker: SaveWorker,
    preferences: Option<ExpansionPreferences>,
    policy: DecodePolicy,
    history_limit: usize,
    session: Option<OutlineSession>,
}

impl Workspace {
    pub fn new(
        store: Arc<dyn FileStore>,
        config: &AppConfig,
        preferences: Option<ExpansionPreferences>,
    ) -> Result<Self> {
        let worker = SaveWorker::spawn(store.clone(), config.auto_save.simulated_failure_rate)
            .context("starting save worker")?;
        Ok(Self {
            store,
            scheduler: AutoSaveScheduler::new(config.auto_save.clone()),
            worker,
            preferences: preferences.filter(|_| config.outline.persist_expansion),
            policy: config.outline.decode_policy(),
            history_limit: config.outline.history_limit,
            session: None,
        })
    }

    pub fn session(&self) -> Option<&OutlineSession> {
        self.session.as_ref()
    }

    pub fn file_id(&self) -> Option<i64> {
        self.session.as_ref().map(|s| s.file_id())
    }

    pub fn save_status(&self) -> Option<SaveStatus> {
        self.scheduler.status()
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.scheduler.last_saved_at()
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.scheduler.last_error()
    }

    pub fn can_save_manually(&self) -> bool {
        self.scheduler.can_save_manually()
    }

    /// Opens `file_id`, closing whatever was open first. Reopening the
    /// current file is a no-op.
    pub fn open(&mut self, file_id: i64) -> Result<()> {
        if self.file_id() == Some(file_id) {
            return Ok(());
        }
        self.close()?;

        let content = self
            .store
            .load_content(file_id)
            .with_context(|| format!("loading outline file {file_id}"))?;
        let mut session = OutlineSession::open(file_id, &content, self.policy, self.history_limit);
        if let Some(prefs) = &self.preferences {
            let expanded = prefs.load(file_id);
            if !expanded.is_empty() {
                session.restore_expansion(&expanded);
            }
        }
        self.scheduler.start_session(file_id, &session.encoded());
        tracing::info!(file_id, items = session.document().len(), "opened outline");
        self.session = Some(session);
        Ok(())
    }

    /// Saves pending changes synchronously and drops the session. On a failed
    /// save the session stays open so nothing is lost.
    pub fn close(&mut self) -> Result<()> {
        let Some(file_id) = self.file_id() else {
            return Ok(());
        };
        self.apply_completions(Instant::now());
        if let Some(ticket) = self.scheduler.flush(FlushKind::Close) {
            let completion = self
                .worker
                .save_blocking(ticket, CLOSE_FLUSH_TIMEOUT)
                .context("flushing outline before close")?;
            let failed = completion.result.is_err();
            self.apply(completion, Instant::now());
            if failed {
                bail!(
                    "could not save file {file_id}: {}",
                    self.scheduler.last_error().unwrap_or("unknown error")
                );
            }
        }
        self.store_preferences();
        self.scheduler.end_session();
        self.session = None;
        tracing::info!(file_id, "closed outline");
        Ok(())
    }

    /// Routes one key to the open outline and schedules saves for content
    /// changes. Primary+S is the manual save.
    pub fn handle_key(&mut self, input: KeyInput, context: InputContext, now: Instant) -> KeyOutcome {
        if context == InputContext::OutlineItem
            && input.modifiers.contains(Modifiers::PRIMARY)
            && matches!(input.key, Key::Char('s') | Key::Char('S'))
        {
            return match self.manual_save() {
                ManualSave::NoFile => KeyOutcome::Ignored,
                _ => KeyOutcome::Handled,
            };
        }
        let Some(session) = self.session.as_mut() else {
            return KeyOutcome::Ignored;
        };
        let outcome = session.handle_key(input, context);
        if outcome.content_changed() {
            let content = session.encoded();
            self.scheduler.observe(&content, now);
        }
        outcome
    }

    /// Applies finished saves and starts the debounced save when it is due.
    pub fn tick(&mut self, now: Instant) {
        self.apply_completions(now);
        if let Some(ticket) = self.scheduler.poll(now) {
            self.submit(ticket, now);
        }
    }

    pub fn manual_save(&mut self) -> ManualSave {
        let Some(status) = self.scheduler.status() else {
            return ManualSave::NoFile;
        };
        match self.scheduler.flush(FlushKind::Manual) {
            Some(ticket) => {
                self.submit(ticket, Instant::now());
                ManualSave::Queued
            }
            None => ManualSave::Refused(status),
        }
    }

    /// Blocks until no save is in flight or `timeout` runs out.
    #[cfg(test)]
    pub fn wait_for_saves(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.scheduler.status() == Some(SaveStatus::Saving) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.worker.wait(remaining) {
                Some(completion) => self.apply(completion, Instant::now()),
                None => return false,
            }
        }
        true
    }

    pub fn toggle_expanded(&mut self, index: usize) -> Option<bool> {
        self.session.as_mut().map(|s| s.toggle_expanded(index))
    }

    pub fn set_focus(&mut self, index: usize) {
        if let Some(session) = self.session.as_mut() {
            session.set_focus(index);
        }
    }

    fn submit(&mut self, ticket: SaveTicket, now: Instant) {
        if let Err(err) = self.worker.submit(ticket.clone()) {
            tracing::error!(?err, "failed to queue save");
            self.scheduler.resolve(&ticket, Err(err.to_string()), now);
        }
    }

    fn apply_completions(&mut self, now: Instant) {
        for completion in self.worker.drain() {
            self.apply(completion, now);
        }
    }

    fn apply(&mut self, completion: SaveCompletion, now: Instant) {
        let SaveCompletion { ticket, result } = completion;
        if let Resolution::Applied(status) = self.scheduler.resolve(&ticket, result, now) {
            tracing::debug!(file_id = ticket.file_id(), %status, "save resolved");
        }
    }

    fn store_preferences(&self) {
        let (Some(prefs), Some(session)) = (&self.preferences, &self.session) else {
            return;
        };
        let expanded = session.expansion().to_indices(session.document());
        if let Err(err) = prefs.store(session.file_id(), &expanded) {
            tracing::warn!(?err, file_id = session.file_id(), "failed to store expansion preferences");
        }
    }
}
