use crate::config::SUGGESTED_COINS;
use crate::notify::alert_log::LOG_VIEW_LINES;
use crate::notify::EmailOutcome;
use crate::tracker::{CycleReport, PriceRow, Tracker};
use crate::ui::core::alerts::parse_bound;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use num_format::{Locale, ToFormattedString};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Sparkline, Table},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::error::Error;
use std::io;
use std::time::{Duration, Instant};
use ta::{indicators::SimpleMovingAverage, Next};

type DynError = Box<dyn Error + Send + Sync>;

const SMA_PERIOD: usize = 20;
const RECENT_ALERTS: usize = 8;
const STATUS_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Prices,
    Trends,
    Alerts,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Lower(String),
    Upper(String),
    AddCoin,
}

/// Work the key handler asks the run loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RefreshNow,
    SendTestEmail,
}

#[derive(Debug, Clone)]
struct Status {
    text: String,
    color: Color,
    set_at: Instant,
}

// Snapshot of the alert log tail, refreshed when the Log view is shown.
type LogTail = Result<Option<Vec<String>>, String>;

pub struct Dashboard {
    current_view: DashboardView,
    selected: usize,
    input: Option<(InputMode, String)>,
    status: Option<Status>,
    log_tail: LogTail,
    rows: Vec<PriceRow>,
    recent_alerts: VecDeque<String>,
    last_update: Option<DateTime<Local>>,
    fetch_error: Option<String>,
    interval: Duration,
    running: bool,
}

impl Dashboard {
    pub fn new(interval: Duration) -> Self {
        Self {
            current_view: DashboardView::Prices,
            selected: 0,
            input: None,
            status: None,
            log_tail: Ok(None),
            rows: Vec::new(),
            recent_alerts: VecDeque::with_capacity(RECENT_ALERTS),
            last_update: None,
            fetch_error: None,
            interval,
            running: true,
        }
    }

    pub async fn run(&mut self, tracker: &mut Tracker) -> Result<(), DynError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal, tracker).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        tracker: &mut Tracker,
    ) -> Result<(), DynError> {
        let mut next_cycle = Instant::now();

        while self.running {
            if Instant::now() >= next_cycle {
                let report = tracker.run_cycle().await;
                self.apply_report(report, tracker.notifier().can_email());
                if self.current_view == DashboardView::Log {
                    self.refresh_log(tracker);
                }
                next_cycle = Instant::now() + self.interval;
            }

            terminal.draw(|f| self.render(f, tracker))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    match self.handle_key_input(key, tracker) {
                        Some(Command::RefreshNow) => next_cycle = Instant::now(),
                        Some(Command::SendTestEmail) => {
                            match tracker.send_test_email().await {
                                Ok(()) => self.set_status("Test email sent!", Color::Green),
                                Err(e) => {
                                    self.set_status(format!("Failed to send test email: {}", e), Color::Red)
                                }
                            }
                        }
                        None => {}
                    }
                }
            }
        }

        Ok(())
    }

    pub fn apply_report(&mut self, report: CycleReport, can_email: bool) {
        self.rows = report.rows;
        self.last_update = Some(Local::now());
        self.fetch_error = report.fetch_error;

        for alert in &report.alerts {
            if self.recent_alerts.len() == RECENT_ALERTS {
                self.recent_alerts.pop_front();
            }
            self.recent_alerts.push_back(alert.message.clone());
        }

        let failures: Vec<String> = report
            .deliveries
            .iter()
            .filter_map(|d| match &d.email {
                EmailOutcome::Failed(e) => Some(format!("Email failed for {}: {}", d.asset_id, e)),
                _ => None,
            })
            .chain(
                report
                    .deliveries
                    .iter()
                    .filter_map(|d| d.logged.as_ref().err().map(|e| format!("Alert log error: {}", e))),
            )
            .collect();

        if !failures.is_empty() {
            self.set_status(failures.join(" | "), Color::Red);
        } else if !report.alerts.is_empty() {
            let sent: Vec<&str> = report
                .deliveries
                .iter()
                .filter(|d| matches!(d.email, EmailOutcome::Sent))
                .map(|d| d.asset_id.as_str())
                .collect();
            if can_email {
                self.set_status(format!("Email sent for {}", sent.join(", ")), Color::Green);
            } else {
                self.set_status("Email not sent (missing SMTP configuration).", Color::Yellow);
            }
        }
    }

    fn set_status(&mut self, text: impl Into<String>, color: Color) {
        self.status = Some(Status {
            text: text.into(),
            color,
            set_at: Instant::now(),
        });
    }

    fn active_status(&self) -> Option<&Status> {
        self.status
            .as_ref()
            .filter(|s| s.set_at.elapsed() < STATUS_TTL)
    }

    fn refresh_log(&mut self, tracker: &Tracker) {
        self.log_tail = tracker
            .notifier()
            .alert_log()
            .tail(LOG_VIEW_LINES)
            .map_err(|e| e.to_string());
    }

    pub fn handle_key_input(&mut self, key: KeyEvent, tracker: &mut Tracker) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        if self.input.is_some() {
            return self.handle_input_key(key, tracker);
        }

        let selected_asset = tracker.assets.get(self.selected).cloned();
        // any command key dismisses the previous message
        self.status = None;

        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('v') => self.current_view = DashboardView::Prices,
            KeyCode::Char('c') => self.current_view = DashboardView::Trends,
            KeyCode::Char('a') => self.current_view = DashboardView::Alerts,
            KeyCode::Char('g') => {
                self.current_view = DashboardView::Log;
                self.refresh_log(tracker);
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < tracker.assets.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('l') => {
                if let Some(asset) = selected_asset {
                    self.current_view = DashboardView::Alerts;
                    self.input = Some((InputMode::Lower(asset), String::new()));
                }
            }
            KeyCode::Char('u') => {
                if let Some(asset) = selected_asset {
                    self.current_view = DashboardView::Alerts;
                    self.input = Some((InputMode::Upper(asset), String::new()));
                }
            }
            KeyCode::Char('n') => self.input = Some((InputMode::AddCoin, String::new())),
            KeyCode::Char('r') => return Some(Command::RefreshNow),
            KeyCode::Char('m') => {
                if !tracker.notifier().can_email() {
                    self.set_status("Please fill in all email fields before testing.", Color::Red);
                    return None;
                }
                return Some(Command::SendTestEmail);
            }
            _ => (),
        }
        None
    }

    fn handle_input_key(&mut self, key: KeyEvent, tracker: &mut Tracker) -> Option<Command> {
        let (mode, buffer) = self.input.as_mut()?;

        match key.code {
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Enter => {
                let mode = mode.clone();
                let value = buffer.clone();
                self.input = None;
                return self.apply_input(mode, &value, tracker);
            }
            _ => (),
        }
        None
    }

    fn apply_input(&mut self, mode: InputMode, value: &str, tracker: &mut Tracker) -> Option<Command> {
        match mode {
            InputMode::Lower(asset) | InputMode::Upper(asset) if parse_bound(value).is_err() => {
                self.set_status(format!("{}: '{}' is not a valid price", asset, value.trim()), Color::Red);
            }
            InputMode::Lower(asset) => {
                let bound = parse_bound(value).ok().flatten();
                tracker.state.thresholds.set_lower(&asset, bound);
                self.set_status(describe_bound(&asset, "lower", bound), Color::Cyan);
            }
            InputMode::Upper(asset) => {
                let bound = parse_bound(value).ok().flatten();
                tracker.state.thresholds.set_upper(&asset, bound);
                self.set_status(describe_bound(&asset, "upper", bound), Color::Cyan);
            }
            InputMode::AddCoin => {
                let id = value.trim().to_lowercase();
                if tracker.add_asset(&id) {
                    self.set_status(format!("Tracking {}", id), Color::Cyan);
                    return Some(Command::RefreshNow);
                }
                self.set_status(format!("'{}' is empty or already tracked", id), Color::Yellow);
            }
        }
        None
    }

    pub fn render<B: Backend>(&self, f: &mut Frame<B>, tracker: &Tracker) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.render_header(f, chunks[0], tracker);
        self.render_main_content(f, chunks[1], tracker);
        self.render_footer(f, chunks[2]);
    }

    fn render_header<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        let updated = self
            .last_update
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let fetch_status = match &self.fetch_error {
            Some(e) => Span::styled(
                format!("Failed to fetch prices: {}", e),
                Style::default().fg(Color::Red),
            ),
            None => Span::styled("OK", Style::default().fg(Color::Green)),
        };

        let header = Paragraph::new(Text::from(vec![
            Line::from(vec![
                Span::styled(
                    "PRICEWATCH ",
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                fetch_status,
            ]),
            Line::from(Span::styled(
                format!(
                    "Last update: {} | Currency: {} | Refresh: {}s | Email: {}",
                    updated,
                    tracker.currency,
                    self.interval.as_secs(),
                    if tracker.notifier().can_email() { "on" } else { "off" },
                ),
                Style::default().fg(Color::Gray),
            )),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));

        f.render_widget(header, area);
    }

    fn render_main_content<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        match self.current_view {
            DashboardView::Prices => self.render_prices_view(f, area, tracker),
            DashboardView::Trends => self.render_trends_view(f, area, tracker),
            DashboardView::Alerts => self.render_alerts_view(f, area, tracker),
            DashboardView::Log => self.render_log_view(f, area),
        }
    }

    fn selected_style(is_selected: bool) -> Style {
        if is_selected {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    fn render_prices_view<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        let block = Block::default().borders(Borders::ALL).title("Live Prices");

        if tracker.assets.is_empty() {
            let message = Paragraph::new("Add at least one coin with 'n'.").block(block);
            f.render_widget(message, area);
            return;
        }

        let rows = tracker.assets.iter().enumerate().map(|(i, asset)| {
            let row = self.rows.iter().find(|r| &r.asset_id == asset);
            let price = row.and_then(|r| r.price);
            let change = row.and_then(|r| r.change_24h);
            let updated = row.map(|r| r.updated.as_str()).unwrap_or("-");

            let change_color = match change {
                Some(c) if c < 0.0 => Color::Red,
                Some(_) => Color::Green,
                None => Color::Gray,
            };

            Row::new(vec![
                Cell::from(asset.as_str()),
                Cell::from(Self::format_price(price)),
                Cell::from(Span::styled(
                    Self::format_change(change),
                    Style::default().fg(change_color),
                )),
                Cell::from(updated.to_string()),
            ])
            .style(Self::selected_style(i == self.selected))
        });

        let price_header = format!("Price ({})", tracker.currency);
        let table = Table::new(rows)
            .header(
                Row::new(vec!["Coin", price_header.as_str(), "24h Change", "Updated"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(block)
            .widths(&[
                Constraint::Length(16),
                Constraint::Length(18),
                Constraint::Length(12),
                Constraint::Length(10),
            ]);

        f.render_widget(table, area);
    }

    fn render_trends_view<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        self.render_sparklines(f, chunks[0], tracker);

        match tracker.assets.get(self.selected) {
            Some(asset) => self.render_line_chart(f, chunks[1], tracker, asset),
            None => {
                let message = Paragraph::new("Select at least one coin.")
                    .block(Block::default().borders(Borders::ALL).title("Trend"));
                f.render_widget(message, chunks[1]);
            }
        }
    }

    fn render_sparklines<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        let block = Block::default().borders(Borders::ALL).title("Trends (session)");
        let inner_area = block.inner(area);
        f.render_widget(block, area);

        let charted: Vec<(usize, &String)> = tracker
            .assets
            .iter()
            .enumerate()
            .filter(|(_, asset)| tracker.state.history.len(asset) >= 2)
            .collect();

        if charted.is_empty() {
            f.render_widget(Paragraph::new("Waiting for at least two prices..."), inner_area);
            return;
        }

        let slots = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(3); charted.len()])
            .split(inner_area);

        for ((i, asset), slot) in charted.iter().zip(slots.iter()) {
            let samples = tracker.state.history.get(asset);
            let data = scale_for_sparkline(&samples);
            let sparkline = Sparkline::default()
                .block(
                    Block::default()
                        .title(format!("{} (last {} pts)", asset, samples.len()))
                        .style(Self::selected_style(*i == self.selected)),
                )
                .data(&data)
                .max(100)
                .style(Style::default().fg(Color::LightBlue))
                .bar_set(symbols::bar::NINE_LEVELS);
            f.render_widget(sparkline, *slot);
        }
    }

    fn render_line_chart<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker, asset: &str) {
        let samples = tracker.state.history.get(asset);
        if samples.len() < 2 {
            let message = Paragraph::new("Insufficient data for chart")
                .block(Block::default().borders(Borders::ALL).title(asset.to_string()));
            f.render_widget(message, area);
            return;
        }

        let min_price = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let pad = ((max_price - min_price) * 0.05).max(max_price.abs() * 1e-6).max(1e-9);
        let (low, high) = (min_price - pad, max_price + pad);

        let points: Vec<(f64, f64)> = samples
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, *p))
            .collect();
        let sma = moving_average(&samples, SMA_PERIOD);

        let mut datasets = vec![Dataset::default()
            .name("price")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::LightBlue))
            .data(&points)];
        if !sma.is_empty() {
            datasets.push(
                Dataset::default()
                    .name(format!("SMA {}", SMA_PERIOD))
                    .marker(symbols::Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Yellow))
                    .data(&sma),
            );
        }

        let last_x = (samples.len() - 1) as f64;
        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} - last {} pts", asset, samples.len())),
            )
            .x_axis(
                Axis::default()
                    .title("Time steps")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, last_x.max(1.0)])
                    .labels(vec![Span::raw("0"), Span::raw(format!("{}", last_x as usize))]),
            )
            .y_axis(
                Axis::default()
                    .title(format!("Price ({})", tracker.currency))
                    .style(Style::default().fg(Color::Gray))
                    .bounds([low, high])
                    .labels(vec![
                        Span::raw(Self::format_price(Some(min_price))),
                        Span::raw(Self::format_price(Some(max_price))),
                    ]),
            );

        f.render_widget(chart, area);
    }

    fn render_alerts_view<B: Backend>(&self, f: &mut Frame<B>, area: Rect, tracker: &Tracker) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(RECENT_ALERTS as u16 + 2)])
            .split(area);

        let rows = tracker.assets.iter().enumerate().map(|(i, asset)| {
            let threshold = tracker.state.thresholds.get(asset).copied().unwrap_or_default();
            let edge = tracker.state.detector.edge_state(asset);
            let price = self.rows.iter().find(|r| &r.asset_id == asset).and_then(|r| r.price);

            let latch = |active: bool| {
                if active {
                    Span::styled("TRIGGERED", Style::default().fg(Color::Red))
                } else {
                    Span::styled("armed", Style::default().fg(Color::Green))
                }
            };

            let note = if threshold.is_inverted() {
                Span::styled("lower >= upper", Style::default().fg(Color::Yellow))
            } else {
                Span::raw("")
            };

            Row::new(vec![
                Cell::from(asset.as_str()),
                Cell::from(Self::format_bound(threshold.lower)),
                Cell::from(Self::format_bound(threshold.upper)),
                Cell::from(Self::format_price(price)),
                Cell::from(latch(edge.below_active)),
                Cell::from(latch(edge.above_active)),
                Cell::from(note),
            ])
            .style(Self::selected_style(i == self.selected))
        });

        let table = Table::new(rows)
            .header(
                Row::new(vec!["Coin", "Lower", "Upper", "Current", "Below", "Above", ""])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(Block::default().borders(Borders::ALL).title("Alert Thresholds"))
            .widths(&[
                Constraint::Length(16),
                Constraint::Length(14),
                Constraint::Length(14),
                Constraint::Length(16),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(16),
            ]);

        f.render_widget(table, chunks[0]);

        let recent: Vec<Line> = if self.recent_alerts.is_empty() {
            vec![Line::from(Span::styled(
                "No alerts this session.",
                Style::default().fg(Color::Gray),
            ))]
        } else {
            self.recent_alerts
                .iter()
                .rev()
                .map(|m| Line::from(Span::styled(m.as_str(), Style::default().fg(Color::Yellow))))
                .collect()
        };
        let recent = Paragraph::new(recent)
            .block(Block::default().borders(Borders::ALL).title("Triggered"));
        f.render_widget(recent, chunks[1]);
    }

    fn render_log_view<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let title = format!("Alert Log (latest {} lines)", LOG_VIEW_LINES);

        let text: Vec<Line> = match &self.log_tail {
            Ok(Some(lines)) if lines.is_empty() => vec![Line::from("<empty>")],
            Ok(Some(lines)) => {
                // newest at the bottom, keep the bottom in view
                let visible = area.height.saturating_sub(2) as usize;
                let start = lines.len().saturating_sub(visible);
                lines[start..].iter().map(|l| Line::from(l.as_str())).collect()
            }
            Ok(None) => vec![Line::from(Span::styled(
                "No alerts logged yet.",
                Style::default().fg(Color::Gray),
            ))],
            Err(e) => vec![Line::from(Span::styled(
                format!("Failed to read log: {}", e),
                Style::default().fg(Color::Red),
            ))],
        };

        let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, area);
    }

    fn render_footer<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));

        let line = if let Some((mode, buffer)) = &self.input {
            let prompt = match mode {
                InputMode::Lower(asset) => format!("Lower bound for {} (empty clears): ", asset),
                InputMode::Upper(asset) => format!("Upper bound for {} (empty clears): ", asset),
                InputMode::AddCoin => format!("Coin id (e.g. {}): ", SUGGESTED_COINS.join(", ")),
            };
            Line::from(vec![
                Span::styled(prompt, Style::default().fg(Color::Cyan)),
                Span::raw(buffer.clone()),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
                Span::raw("   "),
                key("Enter"),
                Span::raw(" Apply  "),
                key("Esc"),
                Span::raw(" Cancel"),
            ])
        } else if let Some(status) = self.active_status() {
            Line::from(Span::styled(status.text.clone(), Style::default().fg(status.color)))
        } else {
            let mut controls = vec![
                Span::raw("Controls: "),
                key("↑/↓"),
                Span::raw(" Navigate  "),
                key("v"),
                Span::raw(" Prices  "),
                key("c"),
                Span::raw(" Trends  "),
                key("a"),
                Span::raw(" Alerts  "),
                key("g"),
                Span::raw(" Log  "),
            ];
            if self.current_view == DashboardView::Alerts {
                controls.extend([key("l"), Span::raw(" Lower  "), key("u"), Span::raw(" Upper  ")]);
            }
            controls.extend([
                key("n"),
                Span::raw(" Add coin  "),
                key("r"),
                Span::raw(" Refresh  "),
                key("m"),
                Span::raw(" Test email  "),
                key("q"),
                Span::raw(" Quit"),
            ]);
            Line::from(controls)
        };

        let footer = Paragraph::new(line)
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }

    fn format_price(price: Option<f64>) -> String {
        match price {
            None => "-".to_string(),
            Some(num) if num.abs() >= 1000.0 => {
                let fixed = format!("{:.2}", num);
                match fixed.split_once('.') {
                    Some((whole, frac)) => whole
                        .parse::<i64>()
                        .map(|w| format!("{}.{}", w.to_formatted_string(&Locale::en), frac))
                        .unwrap_or(fixed.clone()),
                    None => fixed,
                }
            }
            Some(num) => format!("{:.4}", num),
        }
    }

    fn format_change(change: Option<f64>) -> String {
        change.map_or_else(|| "-".to_string(), |c| format!("{:+.3}%", c))
    }

    fn format_bound(bound: Option<f64>) -> String {
        bound.map_or_else(|| "none".to_string(), |b| b.to_string())
    }
}

fn describe_bound(asset: &str, side: &str, bound: Option<f64>) -> String {
    match bound {
        Some(v) => format!("{} {} threshold set to {}", asset, side, v),
        None => format!("{} {} threshold cleared", asset, side),
    }
}

/// Maps prices onto 0..=100 for the sparkline widget.
fn scale_for_sparkline(samples: &[f64]) -> Vec<u64> {
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    samples
        .iter()
        .map(|p| {
            if range > 0.0 {
                (((p - min) / range) * 99.0).round() as u64 + 1
            } else {
                50
            }
        })
        .collect()
}

/// Simple moving average points, starting once the window is full.
fn moving_average(samples: &[f64], period: usize) -> Vec<(f64, f64)> {
    let Ok(mut sma) = SimpleMovingAverage::new(period) else {
        return Vec::new();
    };

    samples
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, sma.next(*p)))
        .skip(period.saturating_sub(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Currency;
    use crate::notify::tests::scratch_log;
    use crate::notify::Notifier;
    use crate::tracker::tests::ScriptedSource;
    use crate::tracker::TrackerState;
    use crate::ui::core::alerts::{Threshold, ThresholdTable};
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    fn tracker(name: &str) -> Tracker {
        Tracker::new(
            TrackerState::new(50, ThresholdTable::new()),
            vec!["bitcoin".into(), "ethereum".into()],
            Currency::Usd,
            Box::new(ScriptedSource::empty()),
            Notifier::new(scratch_log(name), None),
        )
    }

    fn press(dashboard: &mut Dashboard, tracker: &mut Tracker, code: KeyCode) -> Option<Command> {
        dashboard.handle_key_input(KeyEvent::new(code, KeyModifiers::NONE), tracker)
    }

    fn type_text(dashboard: &mut Dashboard, tracker: &mut Tracker, text: &str) -> Option<Command> {
        for c in text.chars() {
            press(dashboard, tracker, KeyCode::Char(c));
        }
        press(dashboard, tracker, KeyCode::Enter)
    }

    fn screen(dashboard: &Dashboard, tracker: &Tracker) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| dashboard.render(f, tracker)).unwrap();
        format!("{:?}", terminal.backend().buffer())
    }

    #[test]
    fn edits_lower_bound_of_selected_coin() {
        let mut tracker = tracker("edit-lower");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));

        press(&mut dashboard, &mut tracker, KeyCode::Down);
        press(&mut dashboard, &mut tracker, KeyCode::Char('l'));
        assert_eq!(dashboard.current_view, DashboardView::Alerts);
        type_text(&mut dashboard, &mut tracker, "1500.5");

        assert_eq!(
            tracker.state.thresholds.get("ethereum"),
            Some(&Threshold::new(Some(1500.5), None))
        );

        // empty input clears the bound
        press(&mut dashboard, &mut tracker, KeyCode::Char('l'));
        type_text(&mut dashboard, &mut tracker, "");
        assert_eq!(tracker.state.thresholds.get("ethereum"), Some(&Threshold::default()));
    }

    #[test]
    fn invalid_bound_leaves_threshold_alone() {
        let mut tracker = tracker("edit-invalid");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        tracker.state.thresholds.set("bitcoin", Threshold::new(None, Some(70000.0)));

        press(&mut dashboard, &mut tracker, KeyCode::Char('u'));
        type_text(&mut dashboard, &mut tracker, "lots");

        assert_eq!(
            tracker.state.thresholds.get("bitcoin"),
            Some(&Threshold::new(None, Some(70000.0)))
        );
        assert!(dashboard.status.as_ref().unwrap().text.contains("not a valid price"));
    }

    #[test]
    fn escape_cancels_and_q_is_typed_while_editing() {
        let mut tracker = tracker("edit-escape");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));

        press(&mut dashboard, &mut tracker, KeyCode::Char('n'));
        press(&mut dashboard, &mut tracker, KeyCode::Char('q'));
        assert!(dashboard.running);
        press(&mut dashboard, &mut tracker, KeyCode::Esc);
        assert!(dashboard.input.is_none());

        press(&mut dashboard, &mut tracker, KeyCode::Char('q'));
        assert!(!dashboard.running);
    }

    #[test]
    fn adding_a_coin_requests_refresh() {
        let mut tracker = tracker("add-coin");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));

        press(&mut dashboard, &mut tracker, KeyCode::Char('n'));
        let command = type_text(&mut dashboard, &mut tracker, "Cardano");

        assert_eq!(command, Some(Command::RefreshNow));
        assert_eq!(tracker.assets, vec!["bitcoin", "ethereum", "cardano"]);

        press(&mut dashboard, &mut tracker, KeyCode::Char('n'));
        assert_eq!(type_text(&mut dashboard, &mut tracker, "bitcoin"), None);
    }

    #[test]
    fn selection_stays_in_range() {
        let mut tracker = tracker("selection");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        for _ in 0..5 {
            press(&mut dashboard, &mut tracker, KeyCode::Down);
        }
        assert_eq!(dashboard.selected, 1);
        for _ in 0..5 {
            press(&mut dashboard, &mut tracker, KeyCode::Up);
        }
        assert_eq!(dashboard.selected, 0);
    }

    #[test]
    fn test_email_needs_smtp_settings() {
        let mut tracker = tracker("test-email-key");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        assert_eq!(press(&mut dashboard, &mut tracker, KeyCode::Char('m')), None);
        assert_eq!(press(&mut dashboard, &mut tracker, KeyCode::Char('r')), Some(Command::RefreshNow));
    }

    #[tokio::test]
    async fn renders_every_view() {
        let mut tracker = tracker("render");
        tracker.state.thresholds.set("bitcoin", Threshold::new(Some(50.0), Some(40.0)));
        for p in [100.0, 101.5, 99.0] {
            tracker.state.history.append("bitcoin", Some(p));
        }
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        let report = tracker.run_cycle().await;
        dashboard.apply_report(report, false);

        let prices = screen(&dashboard, &tracker);
        assert!(prices.contains("Live Prices"));
        assert!(prices.contains("ethereum"));

        dashboard.current_view = DashboardView::Trends;
        assert!(screen(&dashboard, &tracker).contains("bitcoin - last 3 pts"));

        dashboard.current_view = DashboardView::Alerts;
        assert!(screen(&dashboard, &tracker).contains("lower >= upper"));

        press(&mut dashboard, &mut tracker, KeyCode::Char('g'));
        assert!(screen(&dashboard, &tracker).contains("No alerts logged yet."));
    }

    #[test]
    fn status_gives_way_to_controls() {
        let mut tracker = tracker("status-clears");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));

        press(&mut dashboard, &mut tracker, KeyCode::Char('m'));
        let shown = screen(&dashboard, &tracker);
        assert!(shown.contains("Please fill in all email fields"));
        assert!(!shown.contains("Controls:"));

        for code in ['v', 'c', 'a', 'g', 'v'] {
            press(&mut dashboard, &mut tracker, KeyCode::Char(code));
        }
        assert!(screen(&dashboard, &tracker).contains("Controls:"));
    }

    #[test]
    fn status_expires_without_key_presses() {
        let tracker = tracker("status-expires");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        dashboard.set_status("Email sent for bitcoin", Color::Green);
        assert!(screen(&dashboard, &tracker).contains("Email sent for bitcoin"));

        if let Some(status) = dashboard.status.as_mut() {
            status.set_at = Instant::now() - (STATUS_TTL + Duration::from_secs(1));
        }
        let shown = screen(&dashboard, &tracker);
        assert!(!shown.contains("Email sent for bitcoin"));
        assert!(shown.contains("Controls:"));
    }

    #[test]
    fn log_view_reads_file_on_entry_only() {
        let mut tracker = tracker("log-snapshot");
        let mut dashboard = Dashboard::new(Duration::from_secs(20));
        let log = tracker.notifier().alert_log().clone();

        log.append("bitcoin at 99 USD is <= lower threshold 100", Local::now()).unwrap();
        press(&mut dashboard, &mut tracker, KeyCode::Char('g'));
        assert!(screen(&dashboard, &tracker).contains("lower threshold 100"));

        // rendering alone does not pick up new lines
        log.append("bitcoin at 201 USD is >= upper threshold 200", Local::now()).unwrap();
        assert!(!screen(&dashboard, &tracker).contains("upper threshold 200"));

        press(&mut dashboard, &mut tracker, KeyCode::Char('g'));
        assert!(screen(&dashboard, &tracker).contains("upper threshold 200"));
    }

    #[test]
    fn price_formatting() {
        assert_eq!(Dashboard::format_price(Some(64250.5)), "64,250.50");
        assert_eq!(Dashboard::format_price(Some(0.12)), "0.1200");
        assert_eq!(Dashboard::format_price(None), "-");
        assert_eq!(Dashboard::format_change(Some(-1.2346)), "-1.235%");
        assert_eq!(Dashboard::format_change(Some(2.0)), "+2.000%");
    }

    #[test]
    fn sparkline_scaling() {
        assert_eq!(scale_for_sparkline(&[10.0, 20.0, 15.0]), vec![1, 100, 51]);
        assert_eq!(scale_for_sparkline(&[5.0, 5.0]), vec![50, 50]);
    }

    #[test]
    fn moving_average_starts_when_window_is_full() {
        assert_eq!(
            moving_average(&[1.0, 2.0, 3.0, 4.0], 2),
            vec![(1.0, 1.5), (2.0, 2.5), (3.0, 3.5)]
        );
        assert!(moving_average(&[1.0], 3).is_empty());
        assert!(moving_average(&[1.0, 2.0], 0).is_empty());
    }
}
