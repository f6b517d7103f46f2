//! Full-screen bar chart of running instances per cell.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::prelude::*;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph};
use tokio::sync::mpsc;
use tracing::debug;

use crate::app_examiner::{AppExaminer, CellInfo, MetricsSource};
use crate::error::Result;
use crate::exit_handler::ExitHandler;
use crate::receptor::ReceptorClient;

/// Smallest refresh interval reachable with `-`.
pub const MIN_RATE: Duration = Duration::from_millis(100);

const RATE_STEP: Duration = Duration::from_millis(100);
const KEY_POLL: Duration = Duration::from_millis(50);

/// What the chart shows and how often it refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartState {
    /// `(cell id, running instances)`, in display order.
    pub bars: Vec<(String, u64)>,
    /// Refresh interval.
    pub rate: Duration,
    /// Last refresh error, shown under the chart.
    pub error: Option<String>,
    /// Cleared when the user quits.
    pub running: bool,
}

impl ChartState {
    /// Creates an empty chart refreshing every `rate`.
    #[must_use]
    pub fn new(rate: Duration) -> Self {
        Self {
            bars: Vec::new(),
            rate: rate.max(MIN_RATE),
            error: None,
            running: true,
        }
    }

    /// Replaces the bars with the running instances of `cells`.
    pub fn update(&mut self, cells: &[CellInfo]) {
        self.bars = cell_bars(cells);
        self.error = None;
    }

    /// Applies a key press: `+`/`-` change the rate, `q` or Ctrl-C quit.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q' | 'Q') => self.running = false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false;
            }
            KeyCode::Char('+' | '=') => self.rate += RATE_STEP,
            KeyCode::Char('-') => {
                self.rate = self.rate.saturating_sub(RATE_STEP).max(MIN_RATE);
            }
            _ => {}
        }
    }
}

fn numeric_suffix(cell_id: &str) -> Option<u64> {
    let digits = cell_id.len() - cell_id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    cell_id[cell_id.len() - digits..].parse().ok()
}

/// One bar per cell, ordered by the number at the end of the cell id.
#[must_use]
pub fn cell_bars(cells: &[CellInfo]) -> Vec<(String, u64)> {
    let mut bars: Vec<(String, u64)> = cells
        .iter()
        .map(|cell| (cell.cell_id.clone(), u64::from(cell.running_instances)))
        .collect();
    bars.sort_by(|(a, _), (b, _)| {
        numeric_suffix(a)
            .cmp(&numeric_suffix(b))
            .then_with(|| a.cmp(b))
    });
    bars
}

/// Renders `state` into `frame`.
pub fn draw(frame: &mut Frame, state: &ChartState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let bars: Vec<Bar> = state
        .bars
        .iter()
        .map(|(cell, running)| {
            Bar::default()
                .value(*running)
                .label(Line::from(cell.clone()))
                .style(Style::default().fg(Color::Green))
        })
        .collect();
    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Running Instances ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(9)
        .bar_gap(2);
    frame.render_widget(chart, chunks[0]);

    let footer = match &state.error {
        Some(err) => Line::from(Span::styled(format!("Error visualizing: {err}"), Style::default().fg(Color::Red))),
        None => Line::from(format!(
            "rate: {}ms   +/- to change   q to quit",
            state.rate.as_millis()
        )),
    };
    frame.render_widget(Paragraph::new(footer), chunks[1]);
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

fn spawn_key_reader() -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            if event::poll(KEY_POLL).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Shows the chart until the user quits.
///
/// # Errors
///
/// Fails if the terminal cannot be switched to or from the alternate screen.
pub async fn print_distribution_chart<R, M>(
    examiner: &AppExaminer<R, M>,
    exit_handler: &ExitHandler,
    rate: Duration,
) -> Result<()>
where
    R: ReceptorClient,
    M: MetricsSource,
{
    enable_raw_mode()?;
    exit_handler.on_exit(restore_terminal);
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_chart(&mut terminal, examiner, rate).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn run_chart<R, M>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    examiner: &AppExaminer<R, M>,
    rate: Duration,
) -> Result<()>
where
    R: ReceptorClient,
    M: MetricsSource,
{
    let mut state = ChartState::new(rate);
    let mut keys = spawn_key_reader();
    let mut refresh_due = true;

    while state.running {
        if refresh_due {
            match examiner.list_cells().await {
                Ok(cells) => state.update(&cells),
                Err(e) => {
                    debug!(error = %e, "failed to list cells");
                    state.error = Some(e.to_string());
                }
            }
            refresh_due = false;
        }
        terminal.draw(|frame| draw(frame, &state))?;

        tokio::select! {
            key = keys.recv() => match key {
                Some(key) => state.handle_key(key),
                None => state.running = false,
            },
            () = tokio::time::sleep(state.rate) => refresh_due = true,
        }
    }
    Ok(())
}
