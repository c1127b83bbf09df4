use std::time::{Duration, Instant};

use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;

use crate::config::AutoSaveConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SaveStatus {
    /// Changes exist that no save has confirmed yet.
    Idle,
    Saving,
    Saved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FlushKind {
    Debounced,
    Manual,
    Close,
}

/// One save handed to the persistence worker. The generation ties it to the
/// session that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    generation: u64,
    file_id: i64,
    content: String,
    kind: FlushKind,
}

impl SaveTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file_id(&self) -> i64 {
        self.file_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> FlushKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied(SaveStatus),
    /// Ticket belonged to a session that has since ended.
    Stale,
}

#[derive(Debug)]
pub struct AutoSaveScheduler {
    config: AutoSaveConfig,
    generation: u64,
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    file_id: i64,
    last_flushed: String,
    last_observed: String,
    last_input: Option<Instant>,
    rapid_inputs: u32,
    deadline: Option<Instant>,
    status: SaveStatus,
    in_flight: usize,
    last_saved_at: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl AutoSaveScheduler {
    pub fn new(config: AutoSaveConfig) -> Self {
        Self {
            config,
            generation: 0,
            session: None,
        }
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.config
    }

    /// Begins tracking a freshly opened file whose stored form is `content`.
    pub fn start_session(&mut self, file_id: i64, content: &str) {
        self.generation += 1;
        self.session = Some(Session {
            file_id,
            last_flushed: content.to_string(),
            last_observed: content.to_string(),
            last_input: None,
            rapid_inputs: 0,
            deadline: None,
            status: SaveStatus::Saved,
            in_flight: 0,
            last_saved_at: None,
            last_error: None,
        });
        tracing::debug!(file_id, generation = self.generation, "autosave session started");
    }

    /// Stops tracking the current file. Outstanding tickets become stale.
    pub fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.generation += 1;
            tracing::debug!(file_id = session.file_id, "autosave session ended");
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file_id(&self) -> Option<i64> {
        self.session.as_ref().map(|s| s.file_id)
    }

    pub fn status(&self) -> Option<SaveStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.deadline)
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.session.as_ref().and_then(|s| s.last_saved_at)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.last_error.as_deref())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.last_observed != s.last_flushed)
            .unwrap_or(false)
    }

    pub fn can_save_manually(&self) -> bool {
        matches!(self.status(), Some(SaveStatus::Idle | SaveStatus::Failed))
    }

    /// Records the latest serialized content and reschedules the debounced
    /// flush. Returns whether a flush is now pending.
    pub fn observe(&mut self, content: &str, now: Instant) -> bool {
        let enabled = self.config.enabled;
        let rapid_window = self.config.rapid_window;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.last_observed == content {
            return session.deadline.is_some();
        }
        session.last_observed.clear();
        session.last_observed.push_str(content);

        if session.last_flushed == content {
            session.deadline = None;
            if session.status == SaveStatus::Idle {
                session.status = SaveStatus::Saved;
            }
            session.last_input = Some(now);
            return false;
        }

        if session.status == SaveStatus::Saved {
            session.status = SaveStatus::Idle;
        }
        session.rapid_inputs = match session.last_input {
            Some(previous) if now.saturating_duration_since(previous) < rapid_window => {
                session.rapid_inputs + 1
            }
            _ => 0,
        };
        session.last_input = Some(now);

        if !enabled {
            session.deadline = None;
            return false;
        }
        let delay = self.config.delay_for(session.rapid_inputs);
        session.deadline = Some(now + delay);
        tracing::debug!(
            file_id = session.file_id,
            rapid_inputs = session.rapid_inputs,
            delay_ms = delay.as_millis() as u64,
            "autosave scheduled"
        );
        true
    }

    /// Hands out the debounced save once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SaveTicket> {
        let due = self
            .session
            .as_ref()
            .and_then(|s| s.deadline)
            .map(|deadline| deadline <= now)
            .unwrap_or(false);
        if !due {
            return None;
        }
        self.issue(FlushKind::Debounced)
    }

    /// Time left until the pending debounced save, if any.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Requests an immediate save outside the timer.
    ///
    /// Manual saves are refused while a save is in flight or the content is
    /// already saved. Close flushes only happen when content differs from the
    /// last confirmed save.
    pub fn flush(&mut self, kind: FlushKind) -> Option<SaveTicket> {
        let session = self.session.as_ref()?;
        let allowed = match kind {
            FlushKind::Manual => {
                matches!(session.status, SaveStatus::Idle | SaveStatus::Failed)
            }
            FlushKind::Close => {
                session.last_observed != session.last_flushed
                    || session.status == SaveStatus::Failed
            }
            FlushKind::Debounced => session.deadline.is_some(),
        };
        if !allowed {
            return None;
        }
        self.issue(kind)
    }

    /// Applies a worker's answer to a ticket. Content that still differs
    /// from what was just written gets a fresh debounced flush at `now`.
    pub fn resolve(
        &mut self,
        ticket: &SaveTicket,
        result: Result<(), String>,
        now: Instant,
    ) -> Resolution {
        let generation = self.generation;
        let Some(session) = self.session.as_mut() else {
            return Resolution::Stale;
        };
        if ticket.generation != generation || ticket.file_id != session.file_id {
            tracing::debug!(
                ticket_generation = ticket.generation,
                generation,
                "ignoring stale save result"
            );
            return Resolution::Stale;
        }
        session.in_flight = session.in_flight.saturating_sub(1);
        match result {
            Ok(()) => {
                session.last_flushed.clear();
                session.last_flushed.push_str(&ticket.content);
                session.last_saved_at = Some(OffsetDateTime::now_utc());
                session.last_error = None;
                session.status = if session.last_observed != session.last_flushed {
                    SaveStatus::Idle
                } else if session.in_flight > 0 {
                    SaveStatus::Saving
                } else {
                    SaveStatus::Saved
                };
                if session.status == SaveStatus::Idle
                    && session.deadline.is_none()
                    && self.config.enabled
                {
                    session.deadline = Some(now + self.config.base_delay);
                    tracing::debug!(file_id = session.file_id, "autosave rescheduled after save");
                }
            }
            Err(message) => {
                tracing::warn!(file_id = session.file_id, %message, kind = %ticket.kind, "save failed");
                session.last_error = Some(message);
                session.status = SaveStatus::Failed;
            }
        }
        Resolution::Applied(session.status)
    }

    fn issue(&mut self, kind: FlushKind) -> Option<SaveTicket> {
        let generation = self.generation;
        let session = self.session.as_mut()?;
        session.deadline = None;
        session.rapid_inputs = 0;
        session.status = SaveStatus::Saving;
        session.in_flight += 1;
        tracing::debug!(file_id = session.file_id, %kind, "issuing save");
        Some(SaveTicket {
            generation,
            file_id: session.file_id,
            content: session.last_observed.clone(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn scheduler() -> AutoSaveScheduler {
        let mut scheduler = AutoSaveScheduler::new(AutoSaveConfig::default());
        scheduler.start_session(7, "• a");
        scheduler
    }

    #[test]
    fn opens_as_saved() {
        let scheduler = scheduler();
        assert_eq!(scheduler.status(), Some(SaveStatus::Saved));
        assert!(!scheduler.can_save_manually());
        assert!(!scheduler.has_unsaved_changes());
    }

    #[test]
    fn coalesces_close_edits_into_one_flush() {
        let mut scheduler = scheduler();
        let start = Instant::now();
        scheduler.observe("• ab", start);
        scheduler.observe("• abc", start + ms(100));
        scheduler.observe("• abcd", start + ms(200));
        assert_eq!(scheduler.status(), Some(SaveStatus::Idle));

        assert!(scheduler.poll(start + ms(1100)).is_none());
        let ticket = scheduler.poll(start + ms(1200)).expect("due");
        assert_eq!(ticket.content(), "• abcd");
        assert_eq!(ticket.kind(), FlushKind::Debounced);
        assert_eq!(scheduler.status(), Some(SaveStatus::Saving));
        assert!(scheduler.poll(start + ms(5000)).is_none());

        assert_eq!(
            scheduler.resolve(&ticket, Ok(()), start + ms(1300)),
            Resolution::Applied(SaveStatus::Saved)
        );
    }

    #[test]
    fn rapid_input_escalates_delay() {
        let mut scheduler = scheduler();
        let start = Instant::now();
        let mut now = start;
        for i in 0..=6 {
            now = start + ms(100 * i);
            scheduler.observe(&format!("• {i}"), now);
        }
        assert_eq!(scheduler.time_until_due(now), Some(ms(2000)));

        for i in 7..=11 {
            now = start + ms(100 * i);
            scheduler.observe(&format!("• {i}"), now);
        }
        assert_eq!(scheduler.time_until_due(now), Some(ms(3000)));

        now += ms(600);
        scheduler.observe("• slow", now);
        assert_eq!(scheduler.time_until_due(now), Some(ms(1000)));
    }

    #[test]
    fn reverting_to_saved_content_cancels_pending_flush() {
        let mut scheduler = scheduler();
        let now = Instant::now();
        assert!(scheduler.observe("• changed", now));
        assert!(!scheduler.observe("• a", now + ms(50)));
        assert_eq!(scheduler.deadline(), None);
        assert_eq!(scheduler.status(), Some(SaveStatus::Saved));
        assert!(scheduler.poll(now + ms(5000)).is_none());
    }

    #[test]
    fn manual_save_is_gated_by_status() {
        let mut scheduler = scheduler();
        assert!(scheduler.flush(FlushKind::Manual).is_none());

        scheduler.observe("• b", Instant::now());
        let ticket = scheduler.flush(FlushKind::Manual).expect("manual save");
        assert_eq!(scheduler.deadline(), None, "manual save bypasses the timer");
        assert!(scheduler.flush(FlushKind::Manual).is_none(), "refused while saving");

        scheduler.resolve(&ticket, Err("disk full".into()), Instant::now());
        assert_eq!(scheduler.status(), Some(SaveStatus::Failed));
        assert_eq!(scheduler.last_error(), Some("disk full"));

        let retry = scheduler.flush(FlushKind::Manual).expect("retry after failure");
        scheduler.resolve(&retry, Ok(()), Instant::now());
        assert_eq!(scheduler.status(), Some(SaveStatus::Saved));
        assert!(scheduler.flush(FlushKind::Manual).is_none());
    }

    #[test]
    fn edits_during_save_leave_status_idle() {
        let mut scheduler = scheduler();
        let now = Instant::now();
        scheduler.observe("• b", now);
        let ticket = scheduler.poll(now + ms(1000)).expect("due");
        scheduler.observe("• bc", now + ms(1100));
        assert_eq!(
            scheduler.resolve(&ticket, Ok(()), now + ms(1200)),
            Resolution::Applied(SaveStatus::Idle)
        );
        assert!(scheduler.has_unsaved_changes());
        assert!(scheduler.deadline().is_some());
    }

    #[test]
    fn reverting_during_save_schedules_the_revert() {
        let mut scheduler = scheduler();
        let now = Instant::now();
        scheduler.observe("• b", now);
        let ticket = scheduler.poll(now + ms(1000)).expect("due");
        assert!(!scheduler.observe("• a", now + ms(1100)));

        assert_eq!(
            scheduler.resolve(&ticket, Ok(()), now + ms(1200)),
            Resolution::Applied(SaveStatus::Idle)
        );
        assert!(scheduler.has_unsaved_changes());
        assert_eq!(scheduler.time_until_due(now + ms(1200)), Some(ms(1000)));

        let revert = scheduler.poll(now + ms(2200)).expect("revert flushed");
        assert_eq!(revert.content(), "• a");
        scheduler.resolve(&revert, Ok(()), now + ms(2300));
        assert_eq!(scheduler.status(), Some(SaveStatus::Saved));
        assert!(!scheduler.has_unsaved_changes());
    }

    #[test]
    fn stale_ticket_does_not_touch_new_session() {
        let mut scheduler = scheduler();
        let now = Instant::now();
        scheduler.observe("• b", now);
        let old = scheduler.poll(now + ms(1000)).expect("due");

        scheduler.end_session();
        scheduler.start_session(8, "• other");
        assert_matches!(
            scheduler.resolve(&old, Err("late".into()), now + ms(1100)),
            Resolution::Stale
        );
        assert_eq!(scheduler.status(), Some(SaveStatus::Saved));
        assert_eq!(scheduler.last_error(), None);
    }

    #[test]
    fn close_flush_only_when_content_differs() {
        let mut scheduler = scheduler();
        assert!(scheduler.flush(FlushKind::Close).is_none());
        scheduler.observe("• b", Instant::now());
        let ticket = scheduler.flush(FlushKind::Close).expect("close flush");
        assert_eq!(ticket.content(), "• b");
        assert_eq!(ticket.file_id(), 7);
    }

    #[test]
    fn disabled_autosave_never_schedules() {
        let config = AutoSaveConfig {
            enabled: false,
            ..AutoSaveConfig::default()
        };
        let mut scheduler = AutoSaveScheduler::new(config);
        scheduler.start_session(1, "");
        let now = Instant::now();
        assert!(!scheduler.observe("• x", now));
        assert!(scheduler.poll(now + ms(60_000)).is_none());
        assert!(scheduler.flush(FlushKind::Manual).is_some());
    }

    #[test]
    fn status_names_render_lowercase() {
        assert_eq!(SaveStatus::Saving.to_string(), "saving");
        assert_eq!("failed".parse::<SaveStatus>().ok(), Some(SaveStatus::Failed));
    }
}
