use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use folio_cli::animation::{AnimationLoop, HostEvent, TerminalHost};
use folio_cli::cursor::CursorTrail;
use folio_cli::links::{self, Segment};
use folio_cli::particles::{FieldConfig, ParticleField};
use folio_cli::{ChatSession, ClientConfig, RelayClient, Sender, TurnEvent};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points},
        Block, Borders, Clear, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Surface units per terminal cell.
const CELL_WIDTH: f32 = 8.0;
const CELL_HEIGHT: f32 = 16.0;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct ActiveTurn {
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<TurnEvent>,
}

struct App {
    session: ChatSession,
    input: String,
    cursor_position: usize,
    turn: Option<ActiveTurn>,
    host: TerminalHost,
    animation: Option<AnimationLoop>,
    input_area: Rect,
    music_mode: bool,
}

impl App {
    fn new(config: &ClientConfig, width: u16, height: u16) -> Self {
        let mut host = TerminalHost::new();
        let (w, h) = surface_size(width, height);
        let field = ParticleField::new(FieldConfig::default(), w, h);
        let animation = AnimationLoop::mount(&mut host, field, CursorTrail::default());

        Self {
            session: ChatSession::new(config.persona.clone(), config.history_window),
            input: String::new(),
            cursor_position: 0,
            turn: None,
            host,
            animation: Some(animation),
            input_area: Rect::default(),
            music_mode: false,
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    fn insert_char(&mut self, c: char) {
        let index = self.byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.byte_index();
            self.input.remove(index);
        }
    }

    fn submit(&mut self, client: &RelayClient) {
        let Some(request) = self.session.begin_turn(&self.input) else {
            return;
        };
        self.input.clear();
        self.cursor_position = 0;

        let cancel = CancellationToken::new();
        let events = client.stream_turn(request, cancel.clone());
        self.turn = Some(ActiveTurn { cancel, events });
    }

    fn cancel_turn(&mut self) {
        if let Some(turn) = &self.turn {
            info!("Cancelling in-flight turn");
            turn.cancel.cancel();
        }
    }

    fn on_turn_event(&mut self, event: Option<TurnEvent>) {
        match event {
            Some(event) => {
                let terminal = event.is_terminal();
                self.session.apply(event);
                if terminal {
                    self.turn = None;
                }
            }
            None => {
                warn!("Turn channel closed without a terminal event");
                self.session.apply(TurnEvent::Failed("turn channel closed".to_string()));
                self.turn = None;
            }
        }
    }

    fn forward(&mut self, event: HostEvent) {
        if !self.host.wants(event.kind()) {
            return;
        }
        if let Some(animation) = self.animation.as_mut() {
            animation.on_event(event);
        }
    }

    fn tick(&mut self, dt: f32) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        for frame in self.host.take_due_frames() {
            animation.on_frame(&mut self.host, frame, dt);
        }
    }

    fn toggle_music_mode(&mut self) {
        self.music_mode = !self.music_mode;
        if let Some(animation) = self.animation.as_mut() {
            animation.set_music_mode(self.music_mode);
        }
    }

    fn shutdown(&mut self) {
        self.cancel_turn();
        if let Some(animation) = self.animation.take() {
            animation.unmount(&mut self.host);
        }
        debug!(
            "Host released: {} frames, {} listeners outstanding",
            self.host.pending_frames(),
            self.host.listener_count()
        );
    }
}

fn surface_size(width: u16, height: u16) -> (f32, f32) {
    (width as f32 * CELL_WIDTH, height as f32 * CELL_HEIGHT)
}

fn cell_center(column: u16, row: u16) -> (f32, f32) {
    (
        column as f32 * CELL_WIDTH + CELL_WIDTH / 2.0,
        row as f32 * CELL_HEIGHT + CELL_HEIGHT / 2.0,
    )
}

/// Column for the input caret, kept inside the box border even when the
/// box is narrower than the border itself.
fn input_cursor_x(area: Rect, position: usize) -> u16 {
    let offset = u16::try_from(position).unwrap_or(u16::MAX);
    let x = area.x.saturating_add(offset).saturating_add(1);
    x.min(area.x + area.width.saturating_sub(2))
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Log to a file; stdout belongs to the TUI.
    let log_file = std::fs::File::create("folio-cli.log").ok();
    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "folio_cli=info,folio=info".into()),
            )
            .with_writer(file)
            .with_ansi(false)
            .init();
    }

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    info!("Using relay at {}", config.relay_url);
    let client = RelayClient::new(config.relay_url.clone());

    enable_raw_mode()?;
    let res = run_tui(&config, &client).await;

    // Restore the terminal whether or not setup got as far as the event loop.
    disable_raw_mode()?;
    execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange,
        cursor::Show
    )?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_tui(config: &ClientConfig, client: &RelayClient) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let mut app = App::new(config, size.width, size.height);

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        while let Ok(event) = event::read() {
            if ui_tx.send(event).is_err() {
                break;
            }
        }
    });

    let res = run_app(&mut terminal, &mut app, client, &mut ui_rx).await;
    app.shutdown();
    res
}

async fn next_turn_event(turn: &mut Option<ActiveTurn>) -> Option<TurnEvent> {
    match turn {
        Some(turn) => turn.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: &RelayClient,
    ui_rx: &mut mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            Some(event) = ui_rx.recv() => {
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return Ok(()),
                            KeyCode::Esc => app.cancel_turn(),
                            KeyCode::F(2) => app.toggle_music_mode(),
                            KeyCode::Char(c) if app.session.input_enabled() => app.insert_char(c),
                            KeyCode::Backspace if app.session.input_enabled() => app.delete_char(),
                            KeyCode::Left => app.move_cursor_left(),
                            KeyCode::Right => app.move_cursor_right(),
                            KeyCode::Home => app.cursor_position = 0,
                            KeyCode::End => app.cursor_position = app.input.chars().count(),
                            KeyCode::Enter => app.submit(client),
                            KeyCode::Up => app.session.scroll_up(1),
                            KeyCode::Down => app.session.scroll_down(1),
                            KeyCode::PageUp => app.session.scroll_up(10),
                            KeyCode::PageDown => app.session.scroll_down(10),
                            _ => {}
                        }
                    }
                    Event::Mouse(mouse) => {
                        let (x, y) = cell_center(mouse.column, mouse.row);
                        match mouse.kind {
                            MouseEventKind::ScrollUp => app.session.scroll_up(3),
                            MouseEventKind::ScrollDown => app.session.scroll_down(3),
                            MouseEventKind::Down(MouseButton::Left) => {
                                app.forward(HostEvent::PointerDown)
                            }
                            MouseEventKind::Up(MouseButton::Left) => {
                                app.forward(HostEvent::PointerUp)
                            }
                            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                                let hovering = contains(app.input_area, mouse.column, mouse.row);
                                app.forward(HostEvent::PointerMove { x, y, hovering });
                            }
                            _ => {}
                        }
                    }
                    Event::Resize(width, height) => {
                        let (width, height) = surface_size(width, height);
                        app.forward(HostEvent::Resize { width, height });
                    }
                    Event::FocusLost => app.forward(HostEvent::PointerLeave),
                    _ => {}
                }
            }
            event = next_turn_event(&mut app.turn) => {
                app.on_turn_event(event);
            }
            _ = frames.tick() => {
                let now = Instant::now();
                app.tick(now.duration_since(last_frame).as_secs_f32());
                last_frame = now;
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);
    app.input_area = chunks[1];

    render_backdrop(f, app, area);
    render_chat(f, app, chunks[0]);
    render_input(f, app, chunks[1]);
}

fn render_backdrop(f: &mut Frame, app: &App, area: Rect) {
    let Some(animation) = app.animation.as_ref() else {
        return;
    };
    let field = animation.field();
    let (width, height) = field.size();
    let (width, height) = (width as f64, height as f64);
    let (r, g, b) = field.config().color;
    let flip = |y: f32| height - y as f64;

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            for link in field.links().iter().chain(field.pointer_links().iter()) {
                let fade = |c: u8| (c as f32 * link.alpha * 0.5) as u8;
                ctx.draw(&CanvasLine {
                    x1: link.from.0 as f64,
                    y1: flip(link.from.1),
                    x2: link.to.0 as f64,
                    y2: flip(link.to.1),
                    color: Color::Rgb(fade(r), fade(g), fade(b)),
                });
            }
            ctx.layer();

            let coords: Vec<(f64, f64)> = field
                .particles()
                .iter()
                .map(|p| (p.x as f64, flip(p.y)))
                .collect();
            ctx.draw(&Points {
                coords: &coords,
                color: Color::Rgb(r, g, b),
            });

            let cursor = animation.cursor();
            if cursor.is_visible() {
                let (x, y) = cursor.ring();
                ctx.draw(&Circle {
                    x: x as f64,
                    y: flip(y),
                    radius: (cursor.variant().ring_diameter() / 2.0) as f64,
                    color: Color::White,
                });
                let (x, y) = cursor.dot();
                ctx.draw(&Points {
                    coords: &[(x as f64, flip(y))],
                    color: Color::White,
                });
            }
        });

    f.render_widget(canvas, area);
}

fn render_chat(f: &mut Frame, app: &App, area: Rect) {
    let mut all_lines: Vec<Line> = Vec::new();
    let entries = app.session.entries();
    let waiting = app.session.is_waiting();

    for (i, entry) in entries.iter().enumerate() {
        let (prefix, style) = match entry.sender {
            Sender::User => ("You", Style::default().fg(Color::Cyan)),
            Sender::Bot => ("Folio", Style::default().fg(Color::Green)),
        };

        all_lines.push(Line::from(Span::styled(
            format!("{}:", prefix),
            style.add_modifier(Modifier::BOLD),
        )));

        if waiting && i + 1 == entries.len() {
            all_lines.push(Line::from(Span::styled("●●●", style)));
        } else {
            for line in entry.text.lines() {
                all_lines.push(styled_line(line, style, entry.sender));
            }
        }

        all_lines.push(Line::from(""));
    }

    let total_lines = all_lines.len();
    let visible_height = area.height as usize;

    let start_line = if total_lines > visible_height {
        let max_scroll = total_lines.saturating_sub(visible_height);
        let actual_scroll = app.session.scroll_offset().min(max_scroll);
        max_scroll.saturating_sub(actual_scroll)
    } else {
        0
    };

    let end_line = (start_line + visible_height).min(total_lines);
    let visible_lines: Vec<Line> = all_lines[start_line..end_line].to_vec();

    let chat = Paragraph::new(visible_lines)
        .block(Block::default().borders(Borders::NONE))
        .wrap(Wrap { trim: false });

    f.render_widget(chat, area);
}

fn styled_line(text: &str, style: Style, sender: Sender) -> Line<'_> {
    if sender == Sender::User {
        return Line::from(Span::styled(text, style));
    }
    let spans: Vec<Span> = links::segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => Span::styled(text, style),
            Segment::Link { label, url } => Span::styled(
                format!("{} <{}>", label, url),
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        })
        .collect();
    Line::from(spans)
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let enabled = app.session.input_enabled();
    let input_text = if !enabled {
        "Waiting for reply... (Esc to cancel)"
    } else if app.input.is_empty() {
        "Ask me about my projects..."
    } else {
        &app.input
    };

    let style = if !enabled || app.input.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    let border = if enabled { Color::White } else { Color::DarkGray };

    let input = Paragraph::new(input_text)
        .style(style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Input (Ctrl-Q to quit, ↑↓ to scroll, F2 music mode)")
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(input, area);

    if enabled && !app.input.is_empty() {
        let cursor_y = area.y + 1;
        f.set_cursor_position((input_cursor_x(area, app.cursor_position), cursor_y));
    }
}
