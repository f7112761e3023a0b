//! Interactive console
//!
//! Raw-mode line editor around the command shell. Terminal events are polled
//! with a short timeout so the prompt can be redrawn when the monitor reports
//! a device change.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use tracing::debug;

use folkadb_core::{RefreshNotifier, SessionSnapshot, APP_NAME, VERSION};
use folkadb_device_bridge::ProcessRunner;

use crate::commands::{Operator, Shell};
use crate::router::{dropped_apk_count, Flow};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const HISTORY_LIMIT: usize = 100;

/// Prompt for the current session state
pub fn prompt(snapshot: &SessionSnapshot) -> String {
    let device = match snapshot.selected {
        Some(ref device) => device.display_name(),
        None if snapshot.counts.get(snapshot.active) > 0 => "not selected".to_string(),
        None => "no device".to_string(),
    };
    format!("-> {} device:({}) >>> ", snapshot.active, device)
}

/// Text shown after the prompt; a line of dropped APKs collapses to a count
pub fn echo(line: &str) -> String {
    match dropped_apk_count(line) {
        0 => line.to_string(),
        n => format!("{} APKs selected. Press Enter to install.", n),
    }
}

/// Editing operation produced by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Insert(char),
    Backspace,
    Submit,
    HistoryPrev,
    HistoryNext,
    /// Ctrl+C: drop the current line
    Interrupt,
    /// Ctrl+D on an empty line
    Eof,
}

/// Convert a crossterm key event into an edit
pub fn key_to_edit(key: KeyEvent) -> Option<Edit> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Edit::Interrupt),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Edit::Eof),
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => None,
        KeyCode::Char(c) => Some(Edit::Insert(c)),
        KeyCode::Backspace => Some(Edit::Backspace),
        KeyCode::Enter => Some(Edit::Submit),
        KeyCode::Up => Some(Edit::HistoryPrev),
        KeyCode::Down => Some(Edit::HistoryNext),
        _ => None,
    }
}

/// Input line with command history
#[derive(Debug, Default)]
pub struct LineBuffer {
    text: String,
    history: Vec<String>,
    /// Position while browsing history
    browsing: Option<usize>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn insert(&mut self, c: char) {
        self.text.push(c);
    }

    /// Remove the last character; false when the line was already empty
    pub fn backspace(&mut self) -> bool {
        self.text.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.browsing = None;
    }

    /// Take the line, recording it in history
    pub fn submit(&mut self) -> String {
        self.browsing = None;
        let line = std::mem::take(&mut self.text);
        let trimmed = line.trim();
        if !trimmed.is_empty() && self.history.last().map(String::as_str) != Some(trimmed) {
            if self.history.len() == HISTORY_LIMIT {
                self.history.remove(0);
            }
            self.history.push(trimmed.to_string());
        }
        line
    }

    pub fn history_prev(&mut self) {
        let pos = match self.browsing {
            Some(0) => 0,
            Some(pos) => pos - 1,
            None if self.history.is_empty() => return,
            None => self.history.len() - 1,
        };
        self.browsing = Some(pos);
        self.text = self.history[pos].clone();
    }

    pub fn history_next(&mut self) {
        let Some(pos) = self.browsing else {
            return;
        };
        if pos + 1 < self.history.len() {
            self.browsing = Some(pos + 1);
            self.text = self.history[pos + 1].clone();
        } else {
            self.browsing = None;
            self.text.clear();
        }
    }
}

/// Keeps raw mode on while alive and restores the terminal on drop
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        Ok(Self { enabled: true })
    }

    /// Hand the terminal back while a command runs
    fn suspend(&mut self) {
        if self.enabled && terminal::disable_raw_mode().is_ok() {
            self.enabled = false;
        }
    }

    fn resume(&mut self) -> Result<()> {
        if !self.enabled {
            terminal::enable_raw_mode().context("enable raw mode")?;
            self.enabled = true;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Operator backed by the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOperator;

impl TerminalOperator {
    fn read_key() -> io::Result<Option<char>> {
        terminal::enable_raw_mode()?;
        let key = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    break Ok(match key.code {
                        KeyCode::Char(c) => Some(c),
                        _ => None,
                    });
                }
                Ok(_) => continue,
                Err(e) => break Err(e),
            }
        };
        terminal::disable_raw_mode()?;
        key
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{}", prompt);
        let _ = io::stdout().flush();

        let key = tokio::task::block_in_place(Self::read_key);
        match key {
            Ok(key) => {
                println!("{}", key.map(String::from).unwrap_or_default());
                matches!(key, Some('y' | 'Y'))
            }
            Err(e) => {
                println!();
                debug!("confirmation read failed: {}", e);
                false
            }
        }
    }

    fn clear_screen(&self) {
        let _ = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0));
    }
}

fn poll_event() -> io::Result<Option<Event>> {
    if event::poll(POLL_INTERVAL)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

fn draw(out: &mut impl Write, prompt: &str, line: &LineBuffer) -> io::Result<()> {
    write!(out, "\r")?;
    execute!(out, Clear(ClearType::CurrentLine))?;
    write!(out, "{}{}", prompt, echo(line.as_str()))?;
    out.flush()
}

/// Run the console until `exit` or Ctrl+D
pub async fn run<R: ProcessRunner, O: Operator>(
    shell: &Shell<R, O>,
    notifier: &RefreshNotifier,
) -> Result<()> {
    let dirty = Arc::new(AtomicBool::new(false));
    {
        let dirty = Arc::clone(&dirty);
        notifier.set(move || dirty.store(true, Ordering::SeqCst));
    }

    // Ctrl+C while a command owns the terminal goes to the child, not to us
    let interrupts = tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt");
        }
    });

    let result = console_loop(shell, &dirty).await;

    notifier.clear();
    interrupts.abort();
    result
}

async fn console_loop<R: ProcessRunner, O: Operator>(
    shell: &Shell<R, O>,
    dirty: &AtomicBool,
) -> Result<()> {
    println!("{} {} - type 'help' for commands", APP_NAME, VERSION);

    let mut stdout = io::stdout();
    let mut guard = RawModeGuard::enable()?;
    let mut line = LineBuffer::new();
    let mut current = prompt(&shell.session().snapshot());
    draw(&mut stdout, &current, &line)?;

    loop {
        if dirty.swap(false, Ordering::SeqCst) {
            current = prompt(&shell.session().snapshot());
            draw(&mut stdout, &current, &line)?;
        }

        let Some(Event::Key(key)) = tokio::task::block_in_place(poll_event)? else {
            continue;
        };
        let Some(edit) = key_to_edit(key) else {
            continue;
        };

        match edit {
            Edit::Insert(c) => {
                let collapsed = dropped_apk_count(line.as_str()) > 0;
                line.insert(c);
                if collapsed || dropped_apk_count(line.as_str()) > 0 {
                    draw(&mut stdout, &current, &line)?;
                } else {
                    write!(stdout, "{}", c)?;
                    stdout.flush()?;
                }
            }
            Edit::Backspace => {
                if line.backspace() {
                    draw(&mut stdout, &current, &line)?;
                }
            }
            Edit::HistoryPrev => {
                line.history_prev();
                draw(&mut stdout, &current, &line)?;
            }
            Edit::HistoryNext => {
                line.history_next();
                draw(&mut stdout, &current, &line)?;
            }
            Edit::Interrupt => {
                write!(stdout, "^C\r\n")?;
                line.clear();
                draw(&mut stdout, &current, &line)?;
            }
            Edit::Eof if line.is_empty() => {
                write!(stdout, "\r\n")?;
                break;
            }
            Edit::Eof => {}
            Edit::Submit => {
                write!(stdout, "\r\n")?;
                stdout.flush()?;
                let input = line.submit();

                guard.suspend();
                let flow = match shell.execute_line(&input).await {
                    Ok(flow) => flow,
                    Err(e) => {
                        debug!("{:?}", e);
                        eprintln!("{}", e.user_message());
                        Flow::Continue
                    }
                };
                guard.resume()?;

                if flow == Flow::Exit {
                    break;
                }
                dirty.store(false, Ordering::SeqCst);
                current = prompt(&shell.session().snapshot());
                write!(stdout, "\r\n")?;
                draw(&mut stdout, &current, &line)?;
            }
        }
    }

    drop(guard);
    println!("Goodbye!");
    Ok(())
}
