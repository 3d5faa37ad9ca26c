//! Terminal activity console.
//!
//! Renders the derived activity timeline with its tallies and the poll
//! health of each backend collection. The input line accepts a task name
//! (creates a task) or a slash command.
//!
//! Launch with `lanfinitas-console watch`.

use std::io::{self, Stdout};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};

use lanfinitas_activity::{ActivityFeed, ActivityFilter, ActivityKind};
use lanfinitas_protocol::{CreateTaskRequest, TaskPriority};

use crate::config::DisplayConfig;
use crate::poller::{Poller, ResourceKind, ResourceStatus};
use crate::view::{kind_label, truncate, TimelineBody, TimelineView};

const MAX_CONSOLE_MESSAGES: usize = 500;

/// A parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Filter(String),
    CreateTask { priority: TaskPriority, name: String },
    Revoke(String),
    Refresh,
    Status,
    Quit,
    Usage(&'static str),
    Unknown(String),
}

impl ConsoleCommand {
    /// Plain text creates a MEDIUM priority task named after the text.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if !input.starts_with('/') {
            return Some(ConsoleCommand::CreateTask {
                priority: TaskPriority::Medium,
                name: input.to_string(),
            });
        }

        let mut parts = input.splitn(2, ' ');
        let command = parts.next().unwrap_or_default();
        let args = parts.next().unwrap_or("").trim();

        let parsed = match command {
            "/help" | "/?" => ConsoleCommand::Help,
            "/filter" => ConsoleCommand::Filter(args.to_string()),
            "/task" => parse_task_args(args),
            "/revoke" if args.is_empty() => ConsoleCommand::Usage("/revoke <delegation_id>"),
            "/revoke" => ConsoleCommand::Revoke(args.to_string()),
            "/refresh" => ConsoleCommand::Refresh,
            "/status" => ConsoleCommand::Status,
            "/quit" | "/exit" | "/q" => ConsoleCommand::Quit,
            other => ConsoleCommand::Unknown(other.to_string()),
        };
        Some(parsed)
    }
}

fn parse_task_args(args: &str) -> ConsoleCommand {
    if args.is_empty() {
        return ConsoleCommand::Usage("/task [priority] <name>");
    }
    let mut words = args.splitn(2, ' ');
    let first = words.next().unwrap_or_default();
    match (first.parse::<TaskPriority>(), words.next()) {
        (Ok(priority), Some(rest)) if !rest.trim().is_empty() => ConsoleCommand::CreateTask {
            priority,
            name: rest.trim().to_string(),
        },
        (Ok(_), _) => ConsoleCommand::Usage("/task [priority] <name>"),
        (Err(_), _) => ConsoleCommand::CreateTask {
            priority: TaskPriority::Medium,
            name: args.to_string(),
        },
    }
}

/// Console header data that does not come from the timeline.
struct ConsoleSnapshot {
    base_url: String,
    session: String,
    view: TimelineView,
}

/// The activity console TUI state.
pub struct ActivityConsole {
    poller: Poller,
    feed: ActivityFeed,
    filter: ActivityFilter,
    max_events: usize,
    /// Current text in the input field.
    input: String,
    /// Cursor position within the input field, in chars.
    cursor_pos: usize,
    /// Command history for up/down arrow navigation.
    history: Vec<String>,
    history_pos: Option<usize>,
    timeline_scroll: u16,
    console_messages: Vec<(DateTime<Utc>, String, Color)>,
}

impl ActivityConsole {
    pub fn new(poller: Poller, max_events: usize) -> Self {
        let mut console = Self {
            poller,
            feed: ActivityFeed::new(),
            filter: ActivityFilter::all(),
            max_events,
            input: String::new(),
            cursor_pos: 0,
            history: Vec::new(),
            history_pos: None,
            timeline_scroll: 0,
            console_messages: Vec::new(),
        };
        console.add_message(
            "Lanfinitas activity console ready. Type a task name and press Enter to create it.",
            Color::Cyan,
        );
        console.add_message(
            "Commands: /help, /filter, /task, /revoke, /refresh, /status, /quit",
            Color::DarkGray,
        );
        console
    }

    async fn snapshot(&mut self) -> ConsoleSnapshot {
        let state = self.poller.state().read().await;
        let view = TimelineView::build(&state, &mut self.feed, &self.filter, self.max_events);
        ConsoleSnapshot {
            base_url: self.poller.client().base_url().to_string(),
            session: self.poller.client().session().to_string(),
            view,
        }
    }

    /// Process the current input line. Returns `true` if the console should exit.
    async fn process_input(&mut self) -> bool {
        let raw = self.input.trim().to_string();
        self.input.clear();
        self.cursor_pos = 0;

        let Some(command) = ConsoleCommand::parse(&raw) else {
            return false;
        };
        self.history.push(raw);
        self.history_pos = None;
        self.execute(command).await
    }

    /// Run a parsed command. Returns `true` for quit.
    pub async fn execute(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Help => {
                self.add_message("Available commands:", Color::Cyan);
                for line in [
                    "  <text>                 - Create a MEDIUM priority task named <text>",
                    "  /task [priority] <name> - Create a task (CRITICAL|HIGH|MEDIUM|LOW|BACKGROUND)",
                    "  /revoke <delegation_id> - Revoke a delegation",
                    "  /filter <kinds>|all     - Show only some event kinds (tasks, delegations, task_failed, ...)",
                    "  /refresh                - Poll all collections now",
                    "  /status                 - Show poll health",
                    "  /quit                   - Exit the console",
                ] {
                    self.add_message(line, Color::White);
                }
            }
            ConsoleCommand::Filter(spec) => match ActivityFilter::parse(&spec) {
                Ok(filter) => {
                    self.filter = filter;
                    self.timeline_scroll = 0;
                    let shown = self.filter.describe();
                    self.add_message(&format!("Filter: {shown}"), Color::Green);
                }
                Err(e) => {
                    let kinds: Vec<&str> = ActivityKind::ALL.iter().map(|k| k.as_str()).collect();
                    self.add_message(&e, Color::Red);
                    self.add_message(&format!("  Known kinds: {}", kinds.join(", ")), Color::DarkGray);
                }
            },
            ConsoleCommand::CreateTask { priority, name } => self.create_task(priority, &name).await,
            ConsoleCommand::Revoke(id) => self.revoke_delegation(&id).await,
            ConsoleCommand::Refresh => {
                let failures = self.poller.refresh_all().await;
                if failures.is_empty() {
                    self.add_message("Refreshed tasks, delegations and agents.", Color::Green);
                } else {
                    for (kind, err) in failures {
                        self.add_message(&format!("Refresh of {kind} failed: {err}"), Color::Red);
                    }
                }
            }
            ConsoleCommand::Status => {
                let lines: Vec<(String, Color)> = {
                    let state = self.poller.state().read().await;
                    ResourceKind::ALL
                        .into_iter()
                        .map(|kind| {
                            let status = state.status(kind);
                            let color = match status {
                                ResourceStatus::Ready => Color::Green,
                                ResourceStatus::Pending => Color::Yellow,
                                ResourceStatus::Failed(_) => Color::Red,
                            };
                            (
                                format!(
                                    "  {:<12} items={} every {}s status={:?}",
                                    kind.as_str(),
                                    state.len(kind),
                                    self.poller.interval(kind).as_secs(),
                                    status
                                ),
                                color,
                            )
                        })
                        .collect()
                };
                self.add_message("Poll status:", Color::Cyan);
                for (line, color) in lines {
                    self.add_message(&line, color);
                }
            }
            ConsoleCommand::Quit => return true,
            ConsoleCommand::Usage(usage) => {
                self.add_message(&format!("Usage: {usage}"), Color::Yellow);
            }
            ConsoleCommand::Unknown(cmd) => {
                self.add_message(
                    &format!("Unknown command: {cmd}. Type /help for available commands."),
                    Color::Red,
                );
            }
        }
        false
    }

    async fn create_task(&mut self, priority: TaskPriority, name: &str) {
        let request = match CreateTaskRequest::new(name, priority) {
            Ok(request) => request,
            Err(e) => {
                self.add_message(&e.to_string(), Color::Red);
                return;
            }
        };
        match self.poller.client().create_task(&request).await {
            Ok(task) => {
                self.add_message(&format!("Task created: {} ({})", task.name, task.id), Color::Green);
                if let Err(e) = self.poller.refresh(ResourceKind::Tasks).await {
                    tracing::debug!(error = %e, "Task refresh after create failed");
                }
            }
            Err(e) => self.add_message(&format!("Create task failed: {e}"), Color::Red),
        }
    }

    async fn revoke_delegation(&mut self, delegation_id: &str) {
        match self.poller.client().revoke_delegation(delegation_id).await {
            Ok(()) => {
                self.add_message(&format!("Delegation revoked: {delegation_id}"), Color::Green);
                if let Err(e) = self.poller.refresh(ResourceKind::Delegations).await {
                    tracing::debug!(error = %e, "Delegation refresh after revoke failed");
                }
            }
            Err(e) => self.add_message(&format!("Revoke failed: {e}"), Color::Red),
        }
    }

    fn add_message(&mut self, msg: &str, color: Color) {
        self.console_messages.push((Utc::now(), msg.to_string(), color));
        if self.console_messages.len() > MAX_CONSOLE_MESSAGES {
            self.console_messages.remove(0);
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.console_messages.iter().map(|(_, m, _)| m.as_str())
    }

    pub fn filter(&self) -> &ActivityFilter {
        &self.filter
    }

    /// Render the full console layout.
    fn render(&self, frame: &mut Frame, snap: &ConsoleSnapshot) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Min(8),    // Counts + timeline
                Constraint::Length(8), // Console output
                Constraint::Length(4), // Input
            ])
            .split(frame.area());

        self.render_status_bar(frame, outer[0], snap);
        self.render_main_area(frame, outer[1], &snap.view);
        self.render_console_output(frame, outer[2]);
        self.render_input(frame, outer[3]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .title(" Lanfinitas Activity Console ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let mut spans = vec![
            Span::styled("  Backend: ", Style::default().fg(Color::Gray)),
            Span::styled(snap.base_url.clone(), Style::default().fg(Color::White)),
            Span::styled("  |  Session: ", Style::default().fg(Color::Gray)),
            Span::styled(snap.session.clone(), Style::default().fg(Color::LightCyan)),
        ];
        for health in &snap.view.health {
            let color = match health.label {
                "ok" => Color::Green,
                "loading" => Color::Yellow,
                _ => Color::Red,
            };
            spans.push(Span::styled(
                format!("  |  {}: ", health.kind),
                Style::default().fg(Color::Gray),
            ));
            spans.push(Span::styled(
                format!("{} {}", health.count, health.label),
                Style::default().fg(color),
            ));
        }
        spans.push(Span::styled("  |  Gen: ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            snap.view.generation.to_string(),
            Style::default().fg(Color::Magenta),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn render_main_area(&self, frame: &mut Frame, area: Rect, view: &TimelineView) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Min(40)])
            .split(area);

        self.render_counts(frame, columns[0], view);
        self.render_timeline(frame, columns[1], view);
    }

    fn render_counts(&self, frame: &mut Frame, area: Rect, view: &TimelineView) {
        let block = Block::default()
            .title(" Activity ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue));

        let colors = [Color::Cyan, Color::Green, Color::Magenta, Color::Red];
        let mut lines: Vec<Line> = view
            .count_items()
            .iter()
            .zip(colors)
            .map(|((label, n), color)| {
                Line::from(vec![
                    Span::styled(format!("  {label:<14}"), Style::default().fg(Color::Gray)),
                    Span::styled(
                        n.to_string(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Filter: ", Style::default().fg(Color::Gray)),
            Span::styled(truncate(&view.filter, 16), Style::default().fg(Color::Yellow)),
        ]));

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_timeline(&self, frame: &mut Frame, area: Rect, view: &TimelineView) {
        let shown = view.rows().len();
        let block = Block::default()
            .title(format!(" Timeline ({shown}/{}) ", view.total_events))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        let placeholder = match &view.body {
            TimelineBody::Loading => Some(("  Loading activity...", Color::Yellow)),
            TimelineBody::Empty => Some((
                "  No activity yet. Tasks and delegations will appear here.",
                Color::DarkGray,
            )),
            TimelineBody::Filtered => Some(("  No events match the current filter.", Color::DarkGray)),
            TimelineBody::Events(_) => None,
        };
        if let Some((text, color)) = placeholder {
            let paragraph = Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let rows: Vec<Row> = view
            .rows()
            .iter()
            .skip(self.timeline_scroll as usize)
            .map(|row| {
                Row::new(vec![
                    Cell::from(Span::styled(
                        format!("  {}", row.time),
                        Style::default().fg(Color::DarkGray),
                    )),
                    Cell::from(Span::styled(
                        kind_label(row.kind),
                        Style::default().fg(kind_color(row.kind)),
                    )),
                    Cell::from(Span::styled(
                        row.description.clone(),
                        Style::default().fg(Color::White),
                    )),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(20),
                Constraint::Length(11),
                Constraint::Min(20),
            ],
        )
        .block(block)
        .header(
            Row::new(vec!["  Time", "Event", "Description"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        );

        frame.render_widget(table, area);
    }

    fn render_console_output(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Console Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        let inner_height = area.height.saturating_sub(2) as usize;
        let start = self.console_messages.len().saturating_sub(inner_height);
        let lines: Vec<Line> = self.console_messages[start..]
            .iter()
            .map(|(ts, msg, color)| {
                Line::from(vec![
                    Span::styled(
                        format!("  [{}] ", ts.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(msg.as_str(), Style::default().fg(*color)),
                ])
            })
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Input (Enter = create task, /help = commands, PgUp/PgDn = scroll) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));

        let input_display = if self.input.is_empty() {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(
                    "Type a task name or /command...",
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        } else {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(self.input.as_str(), Style::default().fg(Color::White)),
            ])
        };

        frame.render_widget(Paragraph::new(vec![input_display]).block(block), area);

        let cursor_x = area.x + 5 + self.cursor_pos as u16;
        let cursor_y = area.y + 1;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    /// Handle a non-Enter key. Returns `true` if the console should exit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match (code, modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Char(c), _) => {
                let at = self.byte_index(self.cursor_pos);
                self.input.insert(at, c);
                self.cursor_pos += 1;
            }
            (KeyCode::Backspace, _) => {
                if self.cursor_pos > 0 {
                    let at = self.byte_index(self.cursor_pos - 1);
                    self.input.remove(at);
                    self.cursor_pos -= 1;
                }
            }
            (KeyCode::Delete, _) => {
                if self.cursor_pos < self.input.chars().count() {
                    let at = self.byte_index(self.cursor_pos);
                    self.input.remove(at);
                }
            }
            (KeyCode::Left, _) => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
            }
            (KeyCode::Right, _) => {
                if self.cursor_pos < self.input.chars().count() {
                    self.cursor_pos += 1;
                }
            }
            (KeyCode::Home, _) => self.cursor_pos = 0,
            (KeyCode::End, _) => self.cursor_pos = self.input.chars().count(),
            (KeyCode::Up, _) => {
                if !self.history.is_empty() {
                    let pos = match self.history_pos {
                        Some(p) => p.saturating_sub(1),
                        None => self.history.len() - 1,
                    };
                    self.history_pos = Some(pos);
                    self.input = self.history[pos].clone();
                    self.cursor_pos = self.input.chars().count();
                }
            }
            (KeyCode::Down, _) => {
                if let Some(pos) = self.history_pos {
                    if pos + 1 < self.history.len() {
                        self.history_pos = Some(pos + 1);
                        self.input = self.history[pos + 1].clone();
                    } else {
                        self.history_pos = None;
                        self.input.clear();
                    }
                    self.cursor_pos = self.input.chars().count();
                }
            }
            (KeyCode::PageUp, _) => {
                self.timeline_scroll = self.timeline_scroll.saturating_sub(10);
            }
            (KeyCode::PageDown, _) => {
                self.timeline_scroll = self.timeline_scroll.saturating_add(10);
            }
            _ => {}
        }
        false
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    /// Draw one frame to any backend.
    pub async fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let snapshot = self.snapshot().await;
        terminal.draw(|frame| self.render(frame, &snapshot))?;
        Ok(())
    }
}

fn kind_color(kind: ActivityKind) -> Color {
    match kind {
        ActivityKind::TaskCreated => Color::Cyan,
        ActivityKind::TaskAssigned => Color::LightBlue,
        ActivityKind::TaskStarted => Color::Blue,
        ActivityKind::TaskCompleted => Color::Green,
        ActivityKind::TaskFailed => Color::Red,
        ActivityKind::TaskCancelled => Color::DarkGray,
        ActivityKind::DelegationCreated => Color::Magenta,
        ActivityKind::DelegationRevoked => Color::Yellow,
        ActivityKind::DelegationExpired => Color::LightYellow,
    }
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the console event loop until the operator quits.
pub async fn run_activity_console(poller: Poller, display: &DisplayConfig) -> anyhow::Result<()> {
    use std::io::IsTerminal;
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return Err(anyhow::anyhow!(
            "The activity console requires a terminal (TTY); use `dump` instead."
        ));
    }

    // Restore the terminal before the default hook prints the panic.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut console = ActivityConsole::new(poller, display.max_events);
    let tick_rate = Duration::from_millis(display.tick_ms.max(1));

    let result = event_loop(&mut terminal, &mut console, tick_rate).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    console: &mut ActivityConsole,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    loop {
        console.draw(terminal).await?;

        if event::poll(tick_rate)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                let quit = if key_event.code == KeyCode::Enter {
                    console.process_input().await
                } else {
                    console.handle_key(key_event.code, key_event.modifiers)
                };
                if quit {
                    return Ok(());
                }
            }
        }
    }
}
