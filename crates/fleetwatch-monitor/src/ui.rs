use crate::feed::{LevelFilter, LogFilter, LogWindow, Viewport};
use crate::monitor::DashboardSnapshot;
use crate::sink::DashboardEvent;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use fleetwatch_core::{AgentState, AgentStatus, FleetStats, LogEntry, LogLevel};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

const COMPACT_WIDTH: u16 = 100;
const HEADER_HEIGHT: u16 = 3;
const STATS_HEIGHT: u16 = 3;
const PROGRESS_BAR_WIDTH: usize = 20;

/// What the event loop must do on behalf of a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiRequest {
    Quit,
    Reconnect,
    ClearLogs,
    SetFilter(LogFilter),
    SetViewport(Viewport),
    ShowDetails(String),
}

#[derive(Clone, Copy)]
struct DashboardTheme {
    bg: Color,
    surface: Color,
    border: Color,
    title: Color,
    text: Color,
    muted: Color,
    accent: Color,
    ok: Color,
    warn: Color,
    critical: Color,
    info: Color,
}

fn dashboard_theme() -> DashboardTheme {
    DashboardTheme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
        info: Color::Rgb(59, 130, 246),
    }
}

/// Render-side mirror of the monitor, fed by [`DashboardEvent`]s.
pub struct App {
    pub agents: Vec<AgentState>,
    pub stats: FleetStats,
    pub connected: bool,
    pub window: LogWindow,
    pub filter: LogFilter,
    /// `Some` while the search prompt is open.
    pub search_input: Option<String>,
    pub selected: usize,
    pub scroll_offset: u64,
    pub log_rows: usize,
    pub details: Option<LogEntry>,
    pub help_open: bool,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(snapshot: DashboardSnapshot) -> Self {
        Self {
            agents: snapshot.agents,
            stats: snapshot.stats,
            connected: snapshot.connected,
            log_rows: Viewport::default().viewport_count,
            window: snapshot.window,
            filter: snapshot.filter,
            search_input: None,
            selected: 0,
            scroll_offset: 0,
            details: None,
            help_open: false,
            status_note: None,
        }
    }

    pub fn apply_dashboard_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::AgentChanged(agent) => {
                match self.agents.iter_mut().find(|known| known.id == agent.id) {
                    Some(slot) => *slot = agent,
                    None => self.agents.push(agent),
                }
            }
            DashboardEvent::StatsChanged(stats) => self.stats = stats,
            DashboardEvent::LogAppended(_) => {}
            DashboardEvent::LogWindowChanged(window) => {
                self.window = window;
                if self.window.total == 0 {
                    self.selected = 0;
                } else if self.selected >= self.window.total {
                    self.selected = self.window.total - 1;
                }
            }
            DashboardEvent::ConnectivityChanged(connected) => {
                self.connected = connected;
                self.status_note = Some(if connected {
                    "live server connected".to_string()
                } else {
                    "live server lost".to_string()
                });
            }
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            scroll_offset: self.scroll_offset,
            viewport_count: self.log_rows,
            item_extent: 1,
        }
    }

    /// Recomputes the log panel height for a terminal size. Returns a new
    /// viewport when it changed.
    pub fn resize(&mut self, area: Rect) -> Option<Viewport> {
        let rows = log_panel_rows(area);
        if rows == self.log_rows {
            return None;
        }
        self.log_rows = rows;
        Some(self.viewport())
    }

    pub fn selected_entry(&self) -> Option<&LogEntry> {
        let index = self.selected.checked_sub(self.window.range.start)?;
        self.window.entries.get(index)
    }

    fn move_selection(&mut self, delta: i64) -> Option<UiRequest> {
        if self.window.total == 0 {
            return None;
        }
        let last = self.window.total as i64 - 1;
        self.selected = (self.selected as i64 + delta).clamp(0, last) as usize;
        let top = self.scroll_offset as usize;
        let rows = self.log_rows.max(1);
        let new_top = if self.selected < top {
            self.selected
        } else if self.selected >= top + rows {
            self.selected + 1 - rows
        } else {
            top
        };
        if new_top == top {
            return None;
        }
        self.scroll_offset = new_top as u64;
        Some(UiRequest::SetViewport(self.viewport()))
    }

    fn reset_scroll(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }
}

fn log_panel_rows(area: Rect) -> usize {
    let body = area.height.saturating_sub(HEADER_HEIGHT + STATS_HEIGHT);
    let inner = if is_compact(area.width) {
        body.saturating_sub(body / 2)
    } else {
        body
    };
    usize::from(inner.saturating_sub(2)).max(1)
}

pub fn render_ui(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let theme = dashboard_theme();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(STATS_HEIGHT),
            Constraint::Min(0),
        ])
        .split(size);
    frame.render_widget(render_header(app, theme, size.width), layout[0]);
    frame.render_widget(render_stats(app, theme, size.width), layout[1]);

    let body = if is_compact(size.width) {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(layout[2])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[2])
    };
    frame.render_widget(render_agents(app, theme, body[0].width), body[0]);
    frame.render_widget(render_logs(app, theme, body[1].width), body[1]);

    if let Some(entry) = app.details.as_ref() {
        render_details_overlay(frame, entry, theme);
    }
    if app.help_open {
        render_help_overlay(frame, theme);
    }
}

fn panel(title: impl Into<String>, theme: DashboardTheme, bg: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(bg))
        .title(Span::styled(
            title.into(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_header(app: &App, theme: DashboardTheme, width: u16) -> Paragraph<'static> {
    let inner_width = width.saturating_sub(4) as usize;
    let (source, source_color) = if app.connected {
        ("Live", theme.ok)
    } else {
        ("Demo", theme.warn)
    };
    let search = match app.search_input.as_deref() {
        Some(input) => format!("Search: {input}_"),
        None if app.filter.search.is_empty() => "Search: -".to_string(),
        None => format!("Search: {}", app.filter.search),
    };
    let fields = vec![
        format!("Agents: {}/{} active", app.stats.active_agents, app.agents.len()),
        format!("Filter: {}", app.filter.level.label()),
        search,
        app.status_note
            .clone()
            .unwrap_or_else(|| "? help".to_string()),
    ];
    let line = fit_fields(&fields, inner_width.saturating_sub(source.len() + 3).max(12));

    Paragraph::new(Line::from(vec![
        Span::styled(
            source,
            Style::default()
                .fg(source_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(line, Style::default().fg(theme.text)),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel("Fleet", theme, theme.bg))
}

fn render_stats(app: &App, theme: DashboardTheme, width: u16) -> Paragraph<'static> {
    let inner_width = width.saturating_sub(4) as usize;
    let stats = app.stats;
    let mut fields = vec![
        format!("Tasks: {}", stats.total_tasks),
        format!("Completed: {}", stats.completed_tasks),
        format!("Success: {}%", stats.success_percent()),
        format!("Files: {}", stats.files_modified),
    ];
    if !is_compact(width) {
        let names: Vec<&str> = app
            .agents
            .iter()
            .filter(|agent| agent.is_active())
            .map(|agent| agent.name.as_str())
            .collect();
        let active = if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        };
        fields.push(format!("Working: {active}"));
    }
    Paragraph::new(Line::from(Span::styled(
        fit_fields(&fields, inner_width.max(12)),
        Style::default().fg(theme.text),
    )))
    .style(Style::default().fg(theme.text).bg(theme.surface))
    .block(panel("Stats", theme, theme.surface))
}

fn render_agents(app: &App, theme: DashboardTheme, width: u16) -> Paragraph<'static> {
    let inner_width = width.saturating_sub(2) as usize;
    let mut lines = Vec::with_capacity(app.agents.len() * 3);
    for agent in &app.agents {
        lines.extend(agent_card_lines(agent, theme, inner_width));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "no agents configured",
            Style::default().fg(theme.muted),
        )));
    }
    Paragraph::new(Text::from(lines))
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel("Agents", theme, theme.surface))
}

fn agent_card_lines(agent: &AgentState, theme: DashboardTheme, width: usize) -> Vec<Line<'static>> {
    let status_color = status_color(agent.status, theme);
    let mut meta = vec![format!("{} files", agent.files.len())];
    if let Some(lines) = agent.lines_changed {
        meta.push(format!("{lines} lines"));
    }
    if let Some(time) = agent.time_active.as_deref() {
        meta.push(time.to_string());
    }
    let title_budget = width.saturating_sub(agent.name.len() + 12);
    vec![
        Line::from(vec![
            Span::styled(
                agent.name.clone(),
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                format!("[{}]", agent.status.as_str()),
                Style::default().fg(status_color),
            ),
            Span::raw(" "),
            Span::styled(
                fit_fields(&meta, title_budget),
                Style::default().fg(theme.muted),
            ),
        ]),
        Line::from(vec![
            Span::styled(
                progress_bar(agent.progress, PROGRESS_BAR_WIDTH),
                Style::default().fg(status_color),
            ),
            Span::styled(
                format!(" {:>3}% ", agent.progress),
                Style::default().fg(theme.text),
            ),
            Span::styled(
                ellipsize(agent.task_label(), width.saturating_sub(PROGRESS_BAR_WIDTH + 8)),
                Style::default().fg(if agent.task.is_some() {
                    theme.text
                } else {
                    theme.muted
                }),
            ),
        ]),
        Line::from(""),
    ]
}

fn render_logs(app: &App, theme: DashboardTheme, width: u16) -> List<'static> {
    let inner_width = width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .window
        .entries
        .iter()
        .enumerate()
        .skip((app.scroll_offset as usize).saturating_sub(app.window.range.start))
        .take(app.log_rows)
        .map(|(offset, entry)| {
            let absolute = app.window.range.start + offset;
            let mut style = Style::default().fg(level_color(entry.level, theme));
            if absolute == app.selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(Line::from(Span::styled(
                ellipsize(&log_line(entry), inner_width),
                style,
            )))
        })
        .collect();
    let title = format!(
        "Activity {}/{}",
        if app.window.total == 0 {
            0
        } else {
            app.selected + 1
        },
        app.window.total
    );
    List::new(items)
        .style(Style::default().fg(theme.text).bg(theme.surface))
        .block(panel(title, theme, theme.surface))
}

fn log_line(entry: &LogEntry) -> String {
    match entry.agent.as_deref() {
        Some(agent) => format!(
            "{} {:<7} {agent}: {}",
            entry.timestamp,
            entry.level.as_str(),
            entry.message
        ),
        None => format!("{} {:<7} {}", entry.timestamp, entry.level.as_str(), entry.message),
    }
}

fn render_details_overlay(frame: &mut Frame, entry: &LogEntry, theme: DashboardTheme) {
    let area = centered_rect(70, 50, frame.size());
    let label = Style::default().fg(theme.accent).add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![Span::styled("Time     ", label), Span::raw(entry.timestamp.clone())]),
        Line::from(vec![
            Span::styled("Level    ", label),
            Span::styled(
                entry.level.as_str(),
                Style::default().fg(level_color(entry.level, theme)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Agent    ", label),
            Span::raw(entry.agent.clone().unwrap_or_else(|| "-".to_string())),
        ]),
        Line::from(vec![Span::styled("Id       ", label), Span::raw(entry.id.clone())]),
        Line::from(""),
        Line::from(entry.message.clone()),
        Line::from(""),
        Line::from(Span::styled(
            entry
                .details
                .clone()
                .unwrap_or_else(|| "no further details".to_string()),
            Style::default().fg(theme.muted),
        )),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel("Log Entry (Esc to close)", theme, theme.surface))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_help_overlay(frame: &mut Frame, theme: DashboardTheme) {
    let area = centered_rect(60, 60, frame.size());
    let section = Style::default().fg(theme.accent).add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(Span::styled("Activity Log", section)),
        Line::from("  j/k      move selection"),
        Line::from("  Enter    show entry details"),
        Line::from("  /        search messages and agents"),
        Line::from("  t        cycle type filter"),
        Line::from("  c        clear the log"),
        Line::from(""),
        Line::from(Span::styled("Connection", section)),
        Line::from("  r        reconnect to live server"),
        Line::from(""),
        Line::from(Span::styled("Session", section)),
        Line::from("  ?        toggle this help"),
        Line::from("  Esc      close overlay"),
        Line::from("  q        quit"),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel("Help", theme, theme.surface)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}

fn status_color(status: AgentStatus, theme: DashboardTheme) -> Color {
    match status {
        AgentStatus::Active => theme.ok,
        AgentStatus::Error => theme.critical,
        AgentStatus::Idle => theme.muted,
    }
}

fn level_color(level: LogLevel, theme: DashboardTheme) -> Color {
    match level {
        LogLevel::Success => theme.ok,
        LogLevel::Warning => theme.warn,
        LogLevel::Error => theme.critical,
        LogLevel::Info => theme.info,
    }
}

pub fn progress_bar(progress: u8, width: usize) -> String {
    let filled = (usize::from(progress.min(100)) * width + 50) / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return "...".chars().take(max).collect();
    }
    let prefix: String = input.chars().take(max - 3).collect();
    format!("{prefix}...")
}

fn fit_fields(fields: &[String], max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut output = String::new();
    for field in fields {
        if field.trim().is_empty() {
            continue;
        }
        let candidate = if output.is_empty() {
            field.clone()
        } else {
            format!("{output} | {field}")
        };
        if candidate.chars().count() <= max {
            output = candidate;
            continue;
        }
        if output.is_empty() {
            return ellipsize(field, max);
        }
        break;
    }
    output
}

fn is_compact(width: u16) -> bool {
    width < COMPACT_WIDTH
}

pub fn handle_input(event: Event, app: &mut App) -> Option<UiRequest> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app),
        _ => None,
    }
}

pub fn handle_key(key: KeyEvent, app: &mut App) -> Option<UiRequest> {
    if let Some(input) = app.search_input.as_mut() {
        match key.code {
            KeyCode::Esc => {
                app.search_input = None;
            }
            KeyCode::Enter => {
                let search = app.search_input.take().unwrap_or_default();
                app.filter.search = search.trim().to_string();
                app.reset_scroll();
                return Some(UiRequest::SetFilter(app.filter.clone()));
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) => input.push(ch),
            _ => {}
        }
        return None;
    }

    if key.code == KeyCode::Char('?') {
        app.help_open = !app.help_open;
        return None;
    }
    if key.code == KeyCode::Esc {
        app.help_open = false;
        app.details = None;
        return None;
    }
    if app.help_open || app.details.is_some() {
        return None;
    }

    match key.code {
        KeyCode::Char('q') => Some(UiRequest::Quit),
        KeyCode::Char('r') => {
            app.status_note = Some("reconnect requested".to_string());
            Some(UiRequest::Reconnect)
        }
        KeyCode::Char('c') => {
            app.reset_scroll();
            Some(UiRequest::ClearLogs)
        }
        KeyCode::Char('/') => {
            app.search_input = Some(app.filter.search.clone());
            None
        }
        KeyCode::Char('t') => {
            app.filter.level = app.filter.level.next();
            app.reset_scroll();
            Some(UiRequest::SetFilter(app.filter.clone()))
        }
        KeyCode::Char('a') => {
            if app.filter == LogFilter::default() {
                return None;
            }
            app.filter = LogFilter {
                level: LevelFilter::All,
                search: String::new(),
            };
            app.reset_scroll();
            Some(UiRequest::SetFilter(app.filter.clone()))
        }
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::PageDown => app.move_selection(app.log_rows as i64),
        KeyCode::PageUp => app.move_selection(-(app.log_rows as i64)),
        KeyCode::Enter => app
            .selected_entry()
            .map(|entry| UiRequest::ShowDetails(entry.id.clone())),
        _ => None,
    }
}
