//! Full-screen terminal frontend on crossterm.
//!
//! Owns the alternate screen while running. Keyboard input is read on a
//! blocking thread and forwarded to the async loop, which redraws after
//! every batch of status events.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::{ExecutableCommand, QueueableCommand, cursor, terminal};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use cellguard_core::{DashboardConfig, LogLevel, StatusEvent};

use crate::render::{Line, SignalTier, Tone, render};
use crate::state::DashboardState;

const INPUT_POLL: Duration = Duration::from_millis(200);

/// Foreground, background, bold.
type Style = (Option<Color>, Option<Color>, bool);

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Plain => (None, None, false),
        Tone::Title => (None, None, true),
        Tone::Ok => (Some(Color::AnsiValue(82)), None, false),
        Tone::Alert => (Some(Color::AnsiValue(211)), None, false),
        Tone::Tier(SignalTier::Poor) => (Some(Color::Rgb { r: 0xff, g: 0x38, b: 0xc7 }), None, false),
        Tone::Tier(SignalTier::Fair) => (Some(Color::Rgb { r: 0xff, g: 0xd4, b: 0x38 }), None, false),
        Tone::Tier(SignalTier::Good) => (Some(Color::Rgb { r: 0x68, g: 0xe1, b: 0xfc }), None, false),
        Tone::Tier(SignalTier::Excellent) => {
            (Some(Color::Rgb { r: 0x80, g: 0xfc, b: 0x68 }), None, false)
        }
        Tone::Level(LogLevel::Error) => (None, Some(Color::Red), true),
        Tone::Level(LogLevel::Warn) => (Some(Color::Yellow), None, true),
        Tone::Level(LogLevel::Info) => (Some(Color::Green), None, true),
        Tone::Level(LogLevel::Debug) => (Some(Color::Cyan), None, true),
    }
}

/// Raw mode + alternate screen, restored on drop.
struct Screen {
    stdout: Stdout,
}

impl Screen {
    fn enter() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn draw(&mut self, lines: &[Line]) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout.queue(terminal::Clear(terminal::ClearType::All))?;
        for line in lines {
            for span in &line.spans {
                let (fg, bg, bold) = tone_style(span.tone);
                if let Some(fg) = fg {
                    self.stdout.queue(SetForegroundColor(fg))?;
                }
                if let Some(bg) = bg {
                    self.stdout.queue(SetBackgroundColor(bg))?;
                }
                if bold {
                    self.stdout.queue(SetAttribute(Attribute::Bold))?;
                }
                self.stdout.queue(Print(&span.text))?;
                self.stdout.queue(SetAttribute(Attribute::Reset))?;
                self.stdout.queue(ResetColor)?;
            }
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        self.stdout.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Quit,
    Redraw,
}

fn classify(event: Event) -> Option<Input> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Input::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Input::Quit)
            }
            _ => None,
        },
        Event::Resize(..) => Some(Input::Redraw),
        _ => None,
    }
}

/// Read terminal input on a blocking thread until `stop` is set.
fn spawn_input(stop: Arc<AtomicBool>) -> mpsc::UnboundedReceiver<Input> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if let Some(input) = classify(ev) {
                            if tx.send(input).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "terminal input read failed");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "terminal input poll failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Run the dashboard until the user quits, `shutdown` flips, or the
/// watchdog side of the event channel goes away. Quitting from the
/// keyboard sets the shutdown flag for every other task.
pub async fn run_dashboard(
    mut events: mpsc::Receiver<StatusEvent>,
    config: DashboardConfig,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut screen = Screen::enter()?;
    let stop = Arc::new(AtomicBool::new(false));
    let mut input = spawn_input(stop.clone());
    let mut state = DashboardState::new(config.max_log_lines);

    let result = loop {
        if let Err(e) = screen.draw(&render(&state, config.settling_uptime)) {
            break Err(e);
        }

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    state.apply(event);
                    while let Ok(event) = events.try_recv() {
                        state.apply(event);
                    }
                }
                None => {
                    debug!("status channel closed");
                    break Ok(());
                }
            },
            action = input.recv() => match action {
                Some(Input::Quit) => {
                    debug!("quit requested from dashboard");
                    let _ = shutdown_tx.send(true);
                    break Ok(());
                }
                Some(Input::Redraw) => {}
                None => {
                    // Raw mode swallows SIGINT, so without input there is no way out.
                    warn!("terminal input closed, shutting down");
                    let _ = shutdown_tx.send(true);
                    break Ok(());
                }
            },
            _ = shutdown_rx.changed() => break Ok(()),
        }
    };

    stop.store(true, Ordering::Relaxed);
    drop(screen);
    result
}
