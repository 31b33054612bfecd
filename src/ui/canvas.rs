//! [`Canvas`] over a ratatui frame.

use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use crate::task::{BarData, Canvas, Decor, PairedBarData, RenderError, TableData};

use super::style::{accent, block, color, text_style};

pub struct FrameCanvas<'a, 'f> {
    frame: &'a mut Frame<'f>,
}

impl<'a, 'f> FrameCanvas<'a, 'f> {
    pub fn new(frame: &'a mut Frame<'f>) -> Self {
        Self { frame }
    }
}

fn malformed(decor: &Decor, reason: String) -> RenderError {
    RenderError::Draw {
        widget: decor.title.clone(),
        reason,
    }
}

impl Canvas for FrameCanvas<'_, '_> {
    fn text(&mut self, slot: Rect, decor: &Decor, text: &str) -> Result<(), RenderError> {
        let paragraph = Paragraph::new(text.to_string())
            .style(text_style(decor))
            .block(block(decor))
            .wrap(Wrap { trim: false });
        self.frame.render_widget(paragraph, slot);
        Ok(())
    }

    fn bar(&mut self, slot: Rect, decor: &Decor, data: &BarData) -> Result<(), RenderError> {
        data.check().map_err(|reason| malformed(decor, reason))?;
        let style = accent(decor, Color::Cyan);
        let bars: Vec<Bar<'_>> = data
            .labels
            .iter()
            .zip(&data.values)
            .map(|(label, value)| {
                Bar::default()
                    .value(*value)
                    .label(Line::from(label.as_str()))
                    .style(style)
            })
            .collect();

        let chart = BarChart::default()
            .block(block(decor))
            .data(BarGroup::default().bars(&bars))
            .bar_width(data.bar_width.max(1))
            .bar_gap(data.bar_gap)
            .bar_style(style)
            .value_style(Style::default().fg(Color::Black).bg(style.fg.unwrap_or(Color::Cyan)))
            .label_style(text_style(decor));
        self.frame.render_widget(chart, slot);
        Ok(())
    }

    fn paired_bar(&mut self, slot: Rect, decor: &Decor, data: &PairedBarData) -> Result<(), RenderError> {
        data.check().map_err(|reason| malformed(decor, reason))?;
        let first = accent(decor, Color::Cyan);
        let second = Style::default().fg(color(data.second_color.as_deref()).unwrap_or(Color::Magenta));

        let mut titled = decor.clone();
        titled.title = format!("{} ({} / {})", decor.title, data.legend[0], data.legend[1]);

        let mut chart = BarChart::default()
            .block(block(&titled))
            .bar_width(data.bar_width.max(1))
            .bar_gap(0)
            .group_gap(2)
            .label_style(text_style(decor));
        for ((label, a), b) in data.labels.iter().zip(&data.first).zip(&data.second) {
            let bars = [
                Bar::default().value(*a).style(first),
                Bar::default().value(*b).style(second),
            ];
            chart = chart.data(BarGroup::default().label(Line::from(label.as_str())).bars(&bars));
        }
        self.frame.render_widget(chart, slot);
        Ok(())
    }

    fn table(&mut self, slot: Rect, decor: &Decor, data: &TableData) -> Result<(), RenderError> {
        let columns = data
            .headers
            .len()
            .max(data.rows.iter().map(Vec::len).max().unwrap_or(0))
            .max(1);
        let widths = vec![Constraint::Ratio(1, columns as u32); columns];

        let rows = data
            .rows
            .iter()
            .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell.as_str()))));
        let mut table = Table::new(rows, widths)
            .block(block(decor))
            .style(text_style(decor));
        if !data.headers.is_empty() {
            let header = Row::new(data.headers.iter().map(|h| Cell::from(h.as_str())))
                .style(accent(decor, Color::Yellow).add_modifier(Modifier::BOLD));
            table = table.header(header);
        }
        self.frame.render_widget(table, slot);
        Ok(())
    }

    fn gauge(&mut self, slot: Rect, decor: &Decor, percent: u16, label: &str) -> Result<(), RenderError> {
        let fallback = match percent {
            0..=59 => Color::Green,
            60..=84 => Color::Yellow,
            _ => Color::Red,
        };
        let gauge = Gauge::default()
            .block(block(decor))
            .gauge_style(accent(decor, fallback).bg(Color::Black))
            .percent(percent.min(100))
            .label(label.to_string());
        self.frame.render_widget(gauge, slot);
        Ok(())
    }

    fn error(&mut self, slot: Rect, decor: &Decor, message: &str) -> Result<(), RenderError> {
        let paragraph = Paragraph::new(message.to_string())
            .style(Style::default().fg(Color::Red))
            .block(block(decor))
            .wrap(Wrap { trim: true });
        self.frame.render_widget(paragraph, slot);
        Ok(())
    }
}
