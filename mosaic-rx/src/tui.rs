//! Live terminal view of the feed slots.
//!
//! Sessions report through [`ChannelObserver`]; the UI loop in `main`
//! drains those events into [`App`] and redraws from a fresh dashboard
//! snapshot.

use std::collections::{BTreeMap, VecDeque};

use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use tokio::sync::mpsc;

use mosaic_core::{
    Dashboard, DecodedImage, FailureReason, Progress, SlotView, TransferObserver, TransferRecord,
};

const LOG_LINES: usize = 200;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Progress {
        identity: String,
        received: usize,
        expected: Option<u16>,
    },
    Complete {
        identity: String,
        filename: String,
        bytes: usize,
    },
    Failed {
        identity: Option<String>,
        reason: String,
    },
}

/// Forwards session events to the UI task.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl TransferObserver for ChannelObserver {
    fn on_frame_progress(&self, identity: &str, progress: &Progress) {
        let _ = self.tx.send(UiEvent::Progress {
            identity: identity.to_string(),
            received: progress.received,
            expected: progress.expected,
        });
    }

    fn on_transfer_complete(&self, identity: &str, _image: &DecodedImage, record: &TransferRecord) {
        let _ = self.tx.send(UiEvent::Complete {
            identity: identity.to_string(),
            filename: record.filename.clone(),
            bytes: record.bytes,
        });
    }

    fn on_transfer_failed(&self, identity: Option<&str>, reason: &FailureReason) {
        let _ = self.tx.send(UiEvent::Failed {
            identity: identity.map(str::to_string),
            reason: reason.to_string(),
        });
    }
}

#[derive(Debug)]
pub struct App {
    pub listen: String,
    pub slots: Vec<SlotView>,
    pub completed: usize,
    /// Identity to (received, expected) for transfers still running.
    pub in_flight: BTreeMap<String, (usize, Option<u16>)>,
    pub log: VecDeque<String>,
    pub exit: bool,
}

impl App {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            slots: Vec::new(),
            completed: 0,
            in_flight: BTreeMap::new(),
            log: VecDeque::new(),
            exit: false,
        }
    }

    pub fn update(&mut self, event: UiEvent) {
        match event {
            UiEvent::Progress {
                identity,
                received,
                expected,
            } => {
                self.in_flight.insert(identity, (received, expected));
            }
            UiEvent::Complete {
                identity,
                filename,
                bytes,
            } => {
                self.in_flight.remove(&identity);
                self.push_log(format!("{identity}: {filename} ({bytes} bytes)"));
            }
            UiEvent::Failed { identity, reason } => {
                if let Some(id) = &identity {
                    self.in_flight.remove(id);
                }
                let who = identity.as_deref().unwrap_or("?");
                self.push_log(format!("{who}: FAILED {reason}"));
            }
        }
    }

    pub fn refresh(&mut self, dashboard: &Dashboard) {
        self.slots = dashboard.snapshot();
        self.completed = dashboard.completed_count();
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log
            .push_back(format!("{} {line}", Local::now().format("%H:%M:%S")));
    }

    pub fn draw(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(8),
                Constraint::Length(8),
            ])
            .split(f.area());

        let header = Line::from(vec![
            Span::styled(" mosaic-rx ", Style::default().fg(Color::Black).bg(Color::Cyan)),
            Span::raw(format!(
                "  listening on {}  |  completed: {}  |  q to quit",
                self.listen, self.completed
            )),
        ]);
        f.render_widget(Paragraph::new(header), rows[0]);

        self.draw_slots(f, rows[1]);

        let items: Vec<ListItem> = self
            .log
            .iter()
            .rev()
            .take(rows[2].height.saturating_sub(2) as usize)
            .map(|l| ListItem::new(l.as_str()))
            .collect();
        let log = List::new(items).block(Block::default().borders(Borders::ALL).title(" Transfers "));
        f.render_widget(log, rows[2]);
    }

    fn draw_slots(&self, f: &mut Frame, area: Rect) {
        if self.slots.is_empty() {
            return;
        }
        let per_row = 2;
        let row_count = self.slots.len().div_ceil(per_row);
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Ratio(1, row_count as u32); row_count])
            .split(area);

        for (r, chunk) in self.slots.chunks(per_row).enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, per_row as u32); per_row])
                .split(row_areas[r]);
            for (c, slot) in chunk.iter().enumerate() {
                f.render_widget(self.slot_widget(slot), cells[c]);
            }
        }
    }

    fn slot_widget(&self, slot: &SlotView) -> Paragraph<'static> {
        let title = format!(" Feed {} ", slot.index + 1);
        let mut lines = Vec::new();
        match &slot.identity {
            None => lines.push(Line::styled("unassigned", Style::default().fg(Color::DarkGray))),
            Some(identity) => {
                lines.push(Line::styled(
                    identity.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                if let Some(image) = slot.image {
                    lines.push(Line::raw(format!(
                        "{}x{} {:?}, {} bytes",
                        image.width, image.height, image.kind, image.bytes
                    )));
                }
                if let Some((received, expected)) = self.in_flight.get(identity) {
                    let expected = expected.map_or("?".to_string(), |e| e.to_string());
                    lines.push(Line::styled(
                        format!("receiving {received}/{expected}"),
                        Style::default().fg(Color::Yellow),
                    ));
                }
            }
        }
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title))
    }
}

// ── Tests ────────────────────────────────────────────────────────
