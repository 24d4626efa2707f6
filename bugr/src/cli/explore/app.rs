use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use bugtriage::prelude::*;
use crossterm::{
    event::{self, Event, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, widgets::TableState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keys::{KeyAction, map_key_with_input_mode};
use super::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    None,
    Filter,
    ConfirmDelete,
}

/// Work the event loop performs after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch(RefreshTrigger),
    Export,
    Delete(RecordId),
}

pub struct App {
    pub explorer: RecordExplorer,
    pub table_state: TableState,
    pub should_quit: bool,
    pub show_help: bool,
    pub input_mode: InputMode,
    pub input_buffer: String,
    /// Byte offset of the cursor within `input_buffer`.
    pub input_cursor: usize,
    pub pending_delete: Option<RecordId>,
    pub status_message: Option<String>,
    pub export_path: PathBuf,
    login_required: Arc<AtomicBool>,
}

impl App {
    pub fn new(explorer: RecordExplorer, export_path: PathBuf) -> Self {
        let login_required = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&login_required);
        let navigator: Arc<dyn Navigator> = Arc::new(move || flag.store(true, Ordering::Relaxed));
        let input_buffer = explorer.query().filter_text().to_string();
        Self {
            explorer: explorer.with_navigator(navigator),
            table_state: TableState::default(),
            should_quit: false,
            show_help: false,
            input_mode: InputMode::None,
            input_cursor: input_buffer.len(),
            input_buffer,
            pending_delete: None,
            status_message: None,
            export_path,
            login_required,
        }
    }

    /// True once a fetch was refused for lack of a valid session. The explorer
    /// stays open on the login-required screen until the user quits.
    pub fn login_required(&self) -> bool {
        self.login_required.load(Ordering::Relaxed)
    }

    pub async fn run(explorer: RecordExplorer, refresh_every: Option<Duration>) -> Result<()> {
        let mut app = Self::new(explorer, PathBuf::from(EXPORT_FILE_NAME));

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(info);
        }));

        let result = app.event_loop(&mut terminal, refresh_every).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

        result?;
        if app.login_required() {
            return Err(TriageError::Unauthorized.into());
        }
        Ok(())
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        refresh_every: Option<Duration>,
    ) -> Result<()> {
        let mut keys = spawn_key_reader();
        let (fetch_tx, mut fetches) = mpsc::unbounded_channel::<FetchResult>();
        let mut ticker = refresh_every.map(|period| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker
        });

        self.issue(RefreshTrigger::Manual, &fetch_tx);

        loop {
            terminal.draw(|frame| ui::draw(frame, self))?;
            if self.should_quit {
                return Ok(());
            }

            let deadline = self.explorer.next_deadline();
            tokio::select! {
                key = keys.recv() => {
                    let Some(key) = key else {
                        return Ok(());
                    };
                    if let Some(command) = self.handle_key(key, Instant::now()) {
                        self.execute(command, &fetch_tx).await;
                    }
                }
                Some(fetched) = fetches.recv() => self.apply_fetch(fetched),
                () = debounce_elapsed(deadline) => {
                    if self.explorer.poll(Instant::now()) {
                        self.issue(RefreshTrigger::QueryChange, &fetch_tx);
                    }
                }
                () = next_tick(ticker.as_mut()) => self.issue(RefreshTrigger::Interval, &fetch_tx),
            }
        }
    }

    /// Starts a fetch in the background; the result comes back on `fetch_tx`.
    fn issue(&mut self, trigger: RefreshTrigger, fetch_tx: &mpsc::UnboundedSender<FetchResult>) {
        if trigger == RefreshTrigger::Interval && self.login_required() {
            return;
        }
        let Some(request) = self.explorer.begin_fetch(trigger) else {
            self.clamp_selection();
            return;
        };
        let tx = fetch_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.run().await);
        });
    }

    async fn execute(&mut self, command: Command, fetch_tx: &mpsc::UnboundedSender<FetchResult>) {
        match command {
            Command::Fetch(trigger) => self.issue(trigger, fetch_tx),
            Command::Export => {
                self.status_message = Some(match self.explorer.export(&self.export_path).await {
                    Ok(bytes) => {
                        info!(path=?self.export_path, bytes, "exported");
                        format!("Exported {bytes} bytes to {}", self.export_path.display())
                    }
                    Err(err) => format!("Export failed: {err}"),
                });
            }
            Command::Delete(id) => {
                self.status_message = Some(match self.explorer.delete(id.clone()).await {
                    Ok(outcome) => {
                        self.note_outcome(&outcome);
                        format!("Deleted #{id}")
                    }
                    Err(err) if err.is_unauthenticated() => {
                        self.login_required.store(true, Ordering::Relaxed);
                        format!("Delete failed: {err}")
                    }
                    Err(err) => format!("Delete failed: {err}"),
                });
                self.clamp_selection();
            }
        }
    }

    pub(crate) fn apply_fetch(&mut self, fetched: FetchResult) {
        let outcome = self.explorer.apply(fetched);
        self.note_outcome(&outcome);
        self.clamp_selection();
    }

    fn note_outcome(&self, outcome: &RefreshOutcome) {
        match outcome {
            RefreshOutcome::Failed(message) => debug!(%message, "refresh failed"),
            RefreshOutcome::Superseded => debug!("stale fetch dropped"),
            RefreshOutcome::Unauthenticated => warn!("login required"),
            RefreshOutcome::Applied | RefreshOutcome::Local => {}
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<Command> {
        let action = map_key_with_input_mode(key, self.input_mode != InputMode::None);
        self.handle_action(action, now)
    }

    pub(crate) fn handle_action(&mut self, action: KeyAction, now: Instant) -> Option<Command> {
        if self.input_mode != InputMode::None {
            return self.handle_input_action(action, now);
        }

        if self.show_help {
            match action {
                KeyAction::ToggleHelp | KeyAction::Dismiss => self.show_help = false,
                KeyAction::Quit => {
                    self.show_help = false;
                    self.should_quit = true;
                }
                _ => {}
            }
            return None;
        }

        match action {
            KeyAction::Quit => self.should_quit = true,
            KeyAction::ToggleHelp => self.show_help = true,
            KeyAction::StartFilter => {
                self.input_mode = InputMode::Filter;
                self.input_buffer = self.explorer.query().filter_text().to_string();
                self.input_cursor = self.input_buffer.len();
            }
            KeyAction::MoveDown => self.move_selection(1),
            KeyAction::MoveUp => self.move_selection(-1),
            KeyAction::JumpFirst => self.select_row(0),
            KeyAction::JumpLast => self.select_row(usize::MAX),
            KeyAction::NextPage => {
                if self.explorer.next_page() {
                    self.table_state.select(Some(0));
                    return Some(Command::Fetch(RefreshTrigger::QueryChange));
                }
            }
            KeyAction::PrevPage => {
                if self.explorer.prev_page() {
                    self.table_state.select(Some(0));
                    return Some(Command::Fetch(RefreshTrigger::QueryChange));
                }
            }
            KeyAction::Sort(key) => {
                self.explorer.request_sort(key);
                self.table_state.select(Some(0));
                return Some(Command::Fetch(RefreshTrigger::QueryChange));
            }
            KeyAction::Refresh => {
                self.status_message = None;
                return Some(Command::Fetch(RefreshTrigger::Manual));
            }
            KeyAction::Export => {
                self.status_message = Some(format!("Exporting to {}", self.export_path.display()));
                return Some(Command::Export);
            }
            KeyAction::Delete => {
                if let Some(row) = self.selected_row() {
                    self.status_message = Some(format!("Delete #{}? (y/n)", row.id));
                    self.pending_delete = Some(row.id);
                    self.input_mode = InputMode::ConfirmDelete;
                }
            }
            KeyAction::Dismiss => self.status_message = None,
            _ => {}
        }
        None
    }

    fn handle_input_action(&mut self, action: KeyAction, now: Instant) -> Option<Command> {
        if self.input_mode == InputMode::ConfirmDelete {
            self.input_mode = InputMode::None;
            let id = self.pending_delete.take()?;
            return match action {
                KeyAction::InputChar('y' | 'Y') | KeyAction::Submit => {
                    self.status_message = Some(format!("Deleting #{id}"));
                    Some(Command::Delete(id))
                }
                _ => {
                    self.status_message = None;
                    None
                }
            };
        }

        match action {
            KeyAction::Quit => {
                self.input_mode = InputMode::None;
                self.should_quit = true;
            }
            KeyAction::Dismiss => {
                // Esc clears the filter
                self.input_mode = InputMode::None;
                self.input_buffer.clear();
                self.input_cursor = 0;
                self.explorer.set_filter_text("", now);
                return self.commit_filter();
            }
            KeyAction::Submit => {
                self.input_mode = InputMode::None;
                return self.commit_filter();
            }
            KeyAction::Backspace => {
                if self.input_cursor > 0 {
                    let prev = self.input_buffer[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map_or(0, |(i, _)| i);
                    self.input_buffer.drain(prev..self.input_cursor);
                    self.input_cursor = prev;
                    self.explorer.set_filter_text(self.input_buffer.clone(), now);
                }
            }
            KeyAction::InputChar(c) => {
                self.input_buffer.insert(self.input_cursor, c);
                self.input_cursor += c.len_utf8();
                self.explorer.set_filter_text(self.input_buffer.clone(), now);
            }
            KeyAction::KillToEnd => {
                self.input_buffer.truncate(self.input_cursor);
                self.explorer.set_filter_text(self.input_buffer.clone(), now);
            }
            KeyAction::CursorLeft => {
                if self.input_cursor > 0 {
                    self.input_cursor = self.input_buffer[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map_or(0, |(i, _)| i);
                }
            }
            KeyAction::CursorRight => {
                if self.input_cursor < self.input_buffer.len() {
                    self.input_cursor += self.input_buffer[self.input_cursor..]
                        .chars()
                        .next()
                        .map_or(0, char::len_utf8);
                }
            }
            KeyAction::CursorStart => self.input_cursor = 0,
            KeyAction::CursorEnd => self.input_cursor = self.input_buffer.len(),
            _ => {}
        }
        None
    }

    /// Applies the typed filter now instead of waiting for the debounce.
    fn commit_filter(&mut self) -> Option<Command> {
        if self.explorer.flush_filter() {
            self.table_state.select(Some(0));
            Some(Command::Fetch(RefreshTrigger::QueryChange))
        } else {
            None
        }
    }

    pub(crate) fn selected_row(&self) -> Option<BugRow> {
        let index = self.table_state.selected()?;
        self.explorer.view().rows.into_iter().nth(index)
    }

    fn move_selection(&mut self, delta: isize) {
        let current = self.table_state.selected().unwrap_or(0);
        self.select_row(current.saturating_add_signed(delta));
    }

    fn select_row(&mut self, index: usize) {
        let len = self.explorer.view().rows.len();
        if len == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(index.min(len - 1)));
        }
    }

    /// Keeps the selection on a row after the page contents change.
    fn clamp_selection(&mut self) {
        self.select_row(self.table_state.selected().unwrap_or(0));
    }
}

/// Terminal key events, read on a blocking thread.
fn spawn_key_reader() -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error=%err, "terminal input closed");
                    break;
                }
            }
        }
    });
    rx
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
