//! GCIQS CLI - terminal client for genomic question answering.
//!
//! This is the entry point for the `gciqs` binary.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use gciqs_core::QuerySessionController;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use gciqs_cli::app::{App, StreamEvent};
use gciqs_cli::{console, ui, Args, ClientConfig, ConsoleSink, QueryClient};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("gciqs_cli=debug,gciqs_core=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let config = ClientConfig::from(&args);
    let client = QueryClient::new(&config.server);

    if let Some(query) = args.query.as_deref() {
        return run_one_shot(client, &config, query).await;
    }

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(client, &config);

    // Run the event loop
    let result = run_event_loop(&mut terminal, &mut app, &config).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result.map(|()| ExitCode::SUCCESS)
}

/// Answer a single query on stdout.
async fn run_one_shot(
    client: QueryClient,
    config: &ClientConfig,
    query: &str,
) -> anyhow::Result<ExitCode> {
    let mut controller = QuerySessionController::new(client, ConsoleSink::stdio())
        .with_top_k(config.effective_top_k());

    if console::answer_once(&mut controller, query).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Main event loop.
///
/// Redraws immediately on every stream event so tokens appear as they arrive.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    // Channel for stream events
    let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent>(128);

    // Health timer; the first tick fires immediately
    let mut health_interval = tokio::time::interval(config.health_interval());

    loop {
        app.tick_animation();

        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.needs_immediate_redraw() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            // Terminal events - poll with short timeout
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt, &stream_tx);
                    }
                }
            }

            // Stream events - immediate redraw
            Some(event) = stream_rx.recv() => {
                app.handle_stream_event(event);
                terminal.draw(|f| ui::render(f, app))?;
            }

            // Periodic health check (only when no query is in flight)
            _ = health_interval.tick() => {
                if !app.is_busy() {
                    app.refresh_health().await;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.clear_results();

    Ok(())
}

/// Handle input events.
fn handle_input(app: &mut App, event: Event, stream_tx: &mpsc::Sender<StreamEvent>) {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key, stream_tx),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_answer_up(3),
            MouseEventKind::ScrollDown => app.scroll_answer_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle a key press.
fn handle_key(app: &mut App, key: KeyEvent, stream_tx: &mpsc::Sender<StreamEvent>) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Char('l') if ctrl => app.clear_results(),
        KeyCode::PageUp => app.scroll_answer_up(10),
        KeyCode::PageDown => app.scroll_answer_down(10),

        // The input is disabled while a query is in flight
        _ if app.is_busy() => {}

        KeyCode::Enter => app.submit(stream_tx),
        KeyCode::Tab => app.fill_next_example(),
        KeyCode::Char('a') if ctrl => app.move_cursor_start(),
        KeyCode::Char('e') if ctrl => app.move_cursor_end(),
        KeyCode::Char('u') if ctrl => app.clear_input(),
        KeyCode::Char('w') if ctrl => app.delete_word(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}
