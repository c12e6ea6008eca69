//! Ratatui-based bias-field viewer.
//!
//! Shows one channel at a time as a heatmap next to a Plotters chart of its
//! centre-line profiles. `←/→` switch channels, `q` quits.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::domain::BiasField;
use crate::error::AppError;
use crate::math::summarize;
use crate::report::{ChannelStats, channel_stats};

mod heatmap;
mod plotters_chart;

use heatmap::Heatmap;
use plotters_chart::{HORIZONTAL_COLOR, ProfileChart, VERTICAL_COLOR, centre_profiles, profile_bounds};

/// Open the viewer on `field`; `title` is shown in the header (usually the file name).
pub fn run(field: &BiasField, title: &str, tiles: &[usize]) -> Result<(), AppError> {
    if field.channel_count() == 0 {
        return Err(AppError::new(3, "Flat field has no channels to show."));
    }

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = Viewer::new(field, title, tiles);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct Viewer<'a> {
    field: &'a BiasField,
    title: &'a str,
    stats: Vec<ChannelStats>,
    channel: usize,
}

impl<'a> Viewer<'a> {
    fn new(field: &'a BiasField, title: &'a str, tiles: &[usize]) -> Self {
        Self {
            field,
            title,
            stats: channel_stats(field, tiles),
            channel: 0,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the viewer should close.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let n = self.field.channel_count();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Right | KeyCode::Char('l') => self.channel = (self.channel + 1) % n,
            KeyCode::Left | KeyCode::Char('h') => self.channel = (self.channel + n - 1) % n,
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("ffc", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" flat field: {}", self.title)),
        ]));

        if let Some(s) = self.stats.get(self.channel) {
            lines.push(Line::from(Span::styled(
                format!(
                    "channel {}/{} | {}x{} px | tiles={} | min={:.3e} max={:.3e} center={:.3e} | corner/center={:.3}",
                    self.channel + 1,
                    self.field.channel_count(),
                    self.field.width(),
                    self.field.height(),
                    s.tiles,
                    s.min,
                    s.max,
                    s.center,
                    s.corner_falloff,
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        self.draw_heatmap(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
    }

    fn draw_heatmap(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(format!("Channel {}", self.channel))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let plane = &self.field.channels[self.channel];
        let range = summarize(plane.iter().map(|&v| f64::from(v)));
        frame.render_widget(
            Heatmap {
                plane,
                lo: range.min as f32,
                hi: range.max as f32,
            },
            inner,
        );
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Centre profiles").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let (horizontal, vertical) = centre_profiles(&self.field.channels[self.channel]);
        let y_bounds = profile_bounds(&[horizontal.as_slice(), vertical.as_slice()]);

        let (chart_rect, insets) = chart_layout(inner);
        let widget = ProfileChart {
            horizontal: &horizontal,
            vertical: &vertical,
            y_bounds,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, y_bounds);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let line = Line::from(vec![
            Span::styled("←/→ channel  q quit", Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled("── horizontal", Style::default().fg(HORIZONTAL_COLOR)),
            Span::raw("  "),
            Span::styled("── vertical", Style::default().fg(VERTICAL_COLOR)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.1e}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, y_bounds: [f64; 2]) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{u:.2}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_y(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("position along centre line")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("bias").style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
