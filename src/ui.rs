//! Terminal surface: an input line, two status lines, and a cooperative
//! event loop that interleaves key handling with the periodic board refresh.
//! crossterm's `poll` doubles as the timer: when no key arrives before the
//! next tick deadline, the refresh runs.

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::controller::{Controller, VoiceOutcome};

const HELP: &str =
    "voicemate - type a move + Enter | Ctrl+L: voice | Ctrl+B: black to move | Esc: quit";

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Restores the terminal even when the loop errors out.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        execute!(io::stdout(), EnterAlternateScreen, crossterm::cursor::Hide)
            .context("Failed to enter alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), crossterm::cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Runs the interface until the user quits (Esc, Ctrl+C, or a spoken
/// "quit"/"exit").
pub fn run(controller: &mut Controller, poll_interval: Duration) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    event_loop(controller, poll_interval)
}

fn event_loop(controller: &mut Controller, poll_interval: Duration) -> Result<()> {
    let mut stdout = io::stdout();
    let mut input = String::new();
    let mut next_tick = Instant::now();

    loop {
        draw(&mut stdout, controller, &input)?;

        let now = Instant::now();
        if now >= next_tick {
            controller.refresh();
            next_tick = now + poll_interval;
            continue;
        }

        if event::poll(next_tick - now).context("Failed to poll terminal events")? {
            match event::read().context("Failed to read terminal event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(controller, &mut input, key) == Flow::Quit {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}

fn handle_key(controller: &mut Controller, input: &mut String, key: KeyEvent) -> Flow {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Flow::Quit,
            KeyCode::Char('b') => {
                controller.force_turn(shakmaty::Color::Black);
                Flow::Continue
            }
            KeyCode::Char('l') => match controller.voice_command() {
                VoiceOutcome::Quit => Flow::Quit,
                _ => Flow::Continue,
            },
            _ => Flow::Continue,
        };
    }

    match key.code {
        KeyCode::Esc => Flow::Quit,
        KeyCode::Enter => {
            if !input.trim().is_empty() {
                controller.submit(input.trim());
            }
            input.clear();
            Flow::Continue
        }
        KeyCode::Backspace => {
            input.pop();
            Flow::Continue
        }
        KeyCode::Char(c) => {
            input.push(c);
            Flow::Continue
        }
        _ => Flow::Continue,
    }
}

fn draw(stdout: &mut io::Stdout, controller: &Controller, input: &str) -> Result<()> {
    queue!(
        stdout,
        MoveTo(0, 0),
        Clear(ClearType::All),
        Print(HELP),
        MoveTo(0, 2),
        Print(format!("board: {}", controller.board_status())),
        MoveTo(0, 3),
        Print(format!("move:  {}", controller.move_status())),
        MoveTo(0, 5),
        Print(format!("> {input}")),
    )
    .context("Failed to draw interface")?;
    stdout.flush().context("Failed to flush interface")?;
    Ok(())
}
