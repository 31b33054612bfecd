//! Render tasks: everything one widget needs to be drawn, captured at
//! dispatch time so drawing does no further lookups.

use std::fmt;

use ratatui::layout::Rect;

use crate::services::ServiceError;
use crate::types::Options;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
    #[error("widget {widget} cannot be drawn: {reason}")]
    Draw { widget: String, reason: String },
}

pub const TEXT_HEIGHT: u16 = 3;
pub const GAUGE_HEIGHT: u16 = 3;
pub const BAR_HEIGHT: u16 = 12;
pub const TABLE_HEIGHT: u16 = 10;

/// Title, colors and height shared by every kind of widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decor {
    pub title: String,
    pub title_color: Option<String>,
    pub border_color: Option<String>,
    pub text_color: Option<String>,
    pub color: Option<String>,
    pub border: bool,
    pub height: u16,
}

impl Default for Decor {
    fn default() -> Self {
        Decor {
            title: String::new(),
            title_color: None,
            border_color: None,
            text_color: None,
            color: None,
            border: true,
            height: TEXT_HEIGHT,
        }
    }
}

impl Decor {
    /// Read the generic display options, falling back to the given title and height.
    pub fn from_options(options: &Options, title: &str, height: u16) -> Result<Self, ServiceError> {
        let owned = |key: &str| options.get(key).map(str::to_string);
        Ok(Decor {
            title: options.get_or("title", title).to_string(),
            title_color: owned("title_color"),
            border_color: owned("border_color"),
            text_color: owned("text_color"),
            color: owned("color"),
            border: options.parse_or(&["border"], true)?,
            height: options.parse_or(&["height"], height)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarData {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    pub bar_width: u16,
    pub bar_gap: u16,
}

impl BarData {
    /// Labels and values must pair up one to one.
    pub fn check(&self) -> Result<(), String> {
        if self.labels.len() == self.values.len() {
            Ok(())
        } else {
            Err(format!("{} labels but {} values", self.labels.len(), self.values.len()))
        }
    }
}

/// Two values per label, drawn side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedBarData {
    pub labels: Vec<String>,
    pub first: Vec<u64>,
    pub second: Vec<u64>,
    pub legend: [String; 2],
    pub second_color: Option<String>,
    pub bar_width: u16,
}

impl PairedBarData {
    pub fn check(&self) -> Result<(), String> {
        let labels = self.labels.len();
        if self.first.len() == labels && self.second.len() == labels {
            Ok(())
        } else {
            Err(format!(
                "{} labels but {} and {} values",
                labels,
                self.first.len(),
                self.second.len()
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draw {
    Text(String),
    Bar(BarData),
    PairedBar(PairedBarData),
    Table(TableData),
    Gauge { percent: u16, label: String },
    Error(String),
}

/// The drawing surface tasks execute against.
pub trait Canvas {
    fn text(&mut self, slot: Rect, decor: &Decor, text: &str) -> Result<(), RenderError>;
    fn bar(&mut self, slot: Rect, decor: &Decor, data: &BarData) -> Result<(), RenderError>;
    fn paired_bar(&mut self, slot: Rect, decor: &Decor, data: &PairedBarData) -> Result<(), RenderError>;
    fn table(&mut self, slot: Rect, decor: &Decor, data: &TableData) -> Result<(), RenderError>;
    fn gauge(&mut self, slot: Rect, decor: &Decor, percent: u16, label: &str) -> Result<(), RenderError>;
    fn error(&mut self, slot: Rect, decor: &Decor, message: &str) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTask {
    pub widget: String,
    pub decor: Decor,
    pub draw: Draw,
}

impl RenderTask {
    pub fn new(widget: impl Into<String>, decor: Decor, draw: Draw) -> Self {
        Self {
            widget: widget.into(),
            decor,
            draw,
        }
    }

    /// Inline error box standing in for a widget that could not be built.
    pub fn error(widget: impl Into<String>, height: u16, message: impl Into<String>) -> Self {
        let widget = widget.into();
        let decor = Decor {
            title: format!("Error: {}", widget),
            title_color: Some("red".to_string()),
            border_color: Some("red".to_string()),
            text_color: Some("red".to_string()),
            height: height.max(TEXT_HEIGHT),
            ..Decor::default()
        };
        RenderTask::new(widget, decor, Draw::Error(message.into()))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.draw, Draw::Error(_))
    }

    pub fn height(&self) -> u16 {
        self.decor.height
    }

    /// Draw into `slot`. Draw errors carry this task's widget name.
    pub fn execute(&self, canvas: &mut dyn Canvas, slot: Rect) -> Result<(), RenderError> {
        let drawn = match &self.draw {
            Draw::Text(text) => canvas.text(slot, &self.decor, text),
            Draw::Bar(data) => canvas.bar(slot, &self.decor, data),
            Draw::PairedBar(data) => canvas.paired_bar(slot, &self.decor, data),
            Draw::Table(data) => canvas.table(slot, &self.decor, data),
            Draw::Gauge { percent, label } => canvas.gauge(slot, &self.decor, *percent, label),
            Draw::Error(message) => canvas.error(slot, &self.decor, message),
        };
        drawn.map_err(|err| match err {
            RenderError::Draw { reason, .. } => RenderError::Draw {
                widget: self.widget.clone(),
                reason,
            },
            other => other,
        })
    }
}

impl fmt::Display for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.draw {
            Draw::Text(text) => write!(f, "{} box {:?}: {}", self.widget, self.decor.title, text),
            Draw::Bar(data) => write!(
                f,
                "{} bar {:?}: {:?} {:?}",
                self.widget, self.decor.title, data.labels, data.values
            ),
            Draw::PairedBar(data) => write!(
                f,
                "{} paired bar {:?}: {:?} {:?} {:?}",
                self.widget, self.decor.title, data.labels, data.first, data.second
            ),
            Draw::Table(data) => write!(
                f,
                "{} table {:?}: {} rows",
                self.widget,
                self.decor.title,
                data.rows.len()
            ),
            Draw::Gauge { percent, label } => {
                write!(f, "{} gauge {:?}: {}% {}", self.widget, self.decor.title, percent, label)
            }
            Draw::Error(message) => write!(f, "{} error: {}", self.widget, message),
        }
    }
}

/// Negative counts cannot be drawn as bars.
pub fn bar_values(values: &[i64]) -> Vec<u64> {
    values.iter().map(|v| (*v).max(0) as u64).collect()
}
