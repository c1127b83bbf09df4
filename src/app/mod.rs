use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::{AppConfig, ConfigPaths};
use crate::journaling::{ExpansionPreferences, SaveStatus};
use crate::outline::{InputContext, Key, KeyInput, Modifiers};
use crate::storage::FileStore;
use crate::ui;

pub mod state;
pub mod workspace;

pub use state::{AppState, FileSummary, FocusPane, NewFileOverlay, OverlayState};
pub use workspace::{ManualSave, Workspace};

const PREVIEW_LINES: usize = 2;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ToggleFocus,
    Refresh,
    NewFile,
    OpenSelected,
    ManualSave,
    ShowHelp,
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: Arc<dyn FileStore>,
    state: AppState,
    list_state: ListState,
    workspace: Workspace,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn FileStore>, paths: &ConfigPaths) -> Result<Self> {
        let state = AppState::load(store.as_ref(), PREVIEW_LINES)
            .context("loading file summaries for initial state")?;
        let mut list_state = ListState::default();
        if !state.is_empty() {
            list_state.select(Some(state.selected));
        }
        let preferences = ExpansionPreferences::new(paths.expansion_dir());
        let workspace = Workspace::new(store.clone(), &config, Some(preferences))
            .context("initialising outline workspace")?;
        Ok(Self {
            config,
            store,
            state,
            list_state,
            workspace,
            should_quit: false,
            tick_rate: Duration::from_millis(100),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state, &self.workspace);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.workspace.tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.state.focus == FocusPane::Outline && self.workspace.session().is_some() {
            if let Some(input) = map_key(key) {
                let context = if self.state.overlay().is_some() {
                    InputContext::TextField
                } else {
                    InputContext::OutlineItem
                };
                let outcome = self.workspace.handle_key(input, context, Instant::now());
                if outcome.is_handled() {
                    self.after_outline_key(input);
                    return;
                }
            }
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.focus == FocusPane::Outline && key.code == KeyCode::Esc {
            self.state.focus = FocusPane::Files;
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Tab => Some(Action::ToggleFocus),
            KeyCode::Enter => Some(Action::OpenSelected),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::ManualSave)
            }
            KeyCode::Char('a') if plain => Some(Action::NewFile),
            KeyCode::Char('?') => Some(Action::ShowHelp),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn after_outline_key(&mut self, input: KeyInput) {
        if input.is_undo() || input.is_redo() {
            let remaining = self
                .workspace
                .session()
                .map(|s| s.history().undo_depth())
                .unwrap_or(0);
            self.state
                .set_status_message(Some(format!("{remaining} structural step(s) left to undo")));
        } else if input.modifiers.contains(Modifiers::PRIMARY)
            && matches!(input.key, Key::Char('s') | Key::Char('S'))
        {
            self.report_manual_save_request();
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                if let Err(err) = self.workspace.close() {
                    tracing::error!(?err, "failed to save before quitting");
                    self.state.set_status_message(Some(
                        "Could not save the open file; press Ctrl-s to retry before quitting",
                    ));
                    return;
                }
                self.should_quit = true;
            }
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ToggleFocus => {
                if self.workspace.session().is_some() {
                    self.state.toggle_focus();
                }
            }
            Action::Refresh => {
                if let Err(err) = self.state.refresh(self.store.as_ref()) {
                    tracing::error!(?err, "failed to refresh files from storage");
                }
            }
            Action::NewFile => {
                self.state.open_new_file();
                self.state.set_status_message(Some("Enter a name and press Enter"));
            }
            Action::OpenSelected => self.handle_open_selected(),
            Action::ManualSave => {
                self.workspace.manual_save();
                self.report_manual_save_request();
            }
            Action::ShowHelp => self.state.overlay = Some(OverlayState::Help),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::NewFile(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled new file"));
                    }
                    KeyCode::Enter => self.submit_new_file(),
                    KeyCode::Backspace => {
                        if let Some(draft) = self.state.new_file_overlay_mut() {
                            draft.name.pop();
                        }
                    }
                    KeyCode::Char(ch)
                        if !key.modifiers.intersects(
                            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                        ) =>
                    {
                        if let Some(draft) = self.state.new_file_overlay_mut() {
                            draft.push(ch);
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::Help) => {
                self.state.close_overlay();
                true
            }
            None => false,
        }
    }

    fn handle_open_selected(&mut self) {
        let Some(file_id) = self.state.selected_file_id() else {
            self.state.set_status_message(Some("No file selected"));
            return;
        };
        match self.workspace.open(file_id) {
            Ok(()) => {
                self.state.focus = FocusPane::Outline;
                self.state.set_status_message(Some(
                    "Editing outline: Enter new line • Tab/Shift-Tab level • Esc back to files",
                ));
                if let Err(err) = self.state.refresh(self.store.as_ref()) {
                    tracing::warn!(?err, "failed to refresh after switching files");
                }
            }
            Err(err) => {
                tracing::error!(?err, file_id, "failed to open outline");
                self.state
                    .set_status_message(Some(format!("Failed to open file: {err:#}")));
            }
        }
    }

    fn submit_new_file(&mut self) {
        let Some(draft) = self.state.new_file_overlay() else {
            return;
        };
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            self.state.set_status_message(Some("Name cannot be empty"));
            return;
        }
        match self.store.create_file(&name, "") {
            Ok(file_id) => {
                self.state.close_overlay();
                if let Err(err) = self.state.refresh(self.store.as_ref()) {
                    tracing::error!(?err, "failed to refresh after file creation");
                }
                self.state.select_file_by_id(file_id);
                self.handle_open_selected();
            }
            Err(err) => {
                tracing::error!(?err, "failed to create file");
                self.state.set_status_message(Some("Failed to create file"));
            }
        }
    }

    fn report_manual_save_request(&mut self) {
        let message = match self.workspace.save_status() {
            None => "Open a file to save it",
            Some(SaveStatus::Saving) => "Saving…",
            Some(_) => "Nothing to save",
        };
        self.state.set_status_message(Some(message));
    }
}

/// Translates a terminal key event into the editor's logical key. Ctrl and
/// Super both act as the primary modifier.
pub fn map_key(key: KeyEvent) -> Option<KeyInput> {
    let code = match key.code {
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Esc => Key::Esc,
        _ => return None,
    };
    let mut modifiers = Modifiers::empty();
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER)
    {
        modifiers |= Modifiers::PRIMARY;
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        modifiers |= Modifiers::SHIFT;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        modifiers |= Modifiers::ALT;
    }
    Some(KeyInput::new(code, modifiers))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
