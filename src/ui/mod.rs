//! Drawing dispatched projects onto the terminal.
//!
//! Projects stack top to bottom, each with a title bar. Rows take the height
//! of their tallest column, columns take `size / 12` of the width and tasks
//! stack inside their column at their own height.

pub mod canvas;
pub mod input;
pub mod style;
pub mod terminal;

use std::rc::Rc;

use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Paragraph},
};
use tracing::{info, warn};

use crate::dispatch::{RenderRow, RenderedProject};
use crate::task::{Decor, RenderError, RenderTask, TEXT_HEIGHT};
use crate::types::SizeLabel;

use canvas::FrameCanvas;

pub use terminal::{CrosstermTerminal, restore_terminal, setup_terminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Normal,
    /// Log every task instead of drawing it.
    Debug,
}

/// How much of the screen a pass wipes before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Redraw widget content over the previous frame.
    Soft,
    /// Clear the whole terminal first.
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderContext {
    pub mode: RenderMode,
}

impl RenderContext {
    pub fn new(mode: RenderMode) -> Self {
        Self { mode }
    }
}

/// Where a pass ends up. The terminal in normal use, a recorder in tests.
pub trait Screen {
    fn present(
        &mut self,
        projects: &[RenderedProject],
        refresh: Refresh,
        ctx: &RenderContext,
    ) -> Result<(), RenderError>;
}

impl<B: Backend> Screen for Terminal<B> {
    fn present(
        &mut self,
        projects: &[RenderedProject],
        refresh: Refresh,
        ctx: &RenderContext,
    ) -> Result<(), RenderError> {
        render(self, projects, refresh, ctx)
    }
}

/// Logs every task instead of drawing. Used by `--debug`, which never
/// takes over the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogScreen;

impl Screen for LogScreen {
    fn present(
        &mut self,
        projects: &[RenderedProject],
        _refresh: Refresh,
        _ctx: &RenderContext,
    ) -> Result<(), RenderError> {
        log_tasks(projects);
        Ok(())
    }
}

pub fn render<B: Backend>(
    terminal: &mut Terminal<B>,
    projects: &[RenderedProject],
    refresh: Refresh,
    ctx: &RenderContext,
) -> Result<(), RenderError> {
    if ctx.mode == RenderMode::Debug {
        log_tasks(projects);
        return Ok(());
    }

    if refresh == Refresh::Hard {
        terminal.clear()?;
    }

    let mut failures = Vec::new();
    terminal.draw(|f| failures = draw_projects(f, projects))?;
    for err in &failures {
        warn!(error = %err, "widget could not be drawn");
    }
    Ok(())
}

fn log_tasks(projects: &[RenderedProject]) {
    for project in projects {
        info!(project = %project.name, rows = project.rows.len(), "project");
        for task in project.tasks() {
            info!(task = %task, "render task");
        }
    }
}

/// Draw every project and return the draw errors of individual tasks.
pub fn draw_projects(f: &mut Frame, projects: &[RenderedProject]) -> Vec<RenderError> {
    let area = f.size();
    let heights: Vec<Constraint> = projects
        .iter()
        .map(|p| Constraint::Length(project_height(p)))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(heights)
        .split(area);

    let mut failures = Vec::new();
    for (project, chunk) in projects.iter().zip(chunks.iter()) {
        failures.extend(draw_project(f, project, *chunk));
    }
    failures
}

/// Title bar look from `name_options`. Bad option values fall back to a
/// plain bar.
fn title_decor(project: &RenderedProject) -> Decor {
    Decor::from_options(&project.name_options, &project.name, TEXT_HEIGHT).unwrap_or_else(|err| {
        warn!(project = %project.name, error = %err, "invalid name_options");
        Decor {
            title: project.name.clone(),
            ..Decor::default()
        }
    })
}

fn title_alignment(project: &RenderedProject) -> Alignment {
    match project.name_options.get("align").map(str::to_lowercase).as_deref() {
        Some("center") | Some("centre") => Alignment::Center,
        Some("right") => Alignment::Right,
        _ => Alignment::Left,
    }
}

fn title_height(project: &RenderedProject) -> u16 {
    if project.name.is_empty() {
        0
    } else {
        title_decor(project).height
    }
}

pub fn project_height(project: &RenderedProject) -> u16 {
    project
        .rows
        .iter()
        .map(RenderRow::height)
        .fold(title_height(project), u16::saturating_add)
}

fn draw_project(f: &mut Frame, project: &RenderedProject, area: Rect) -> Vec<RenderError> {
    let constraints: Vec<Constraint> = std::iter::once(Constraint::Length(title_height(project)))
        .chain(project.rows.iter().map(|r| Constraint::Length(r.height())))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    if title_height(project) > 0 {
        let decor = title_decor(project);
        let title = Paragraph::new(decor.title.clone())
            .alignment(title_alignment(project))
            .style(style::text_style(&decor))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style::fg(decor.border_color.as_deref())),
            );
        f.render_widget(title, chunks[0]);
    }

    let mut failures = Vec::new();
    for (row, area) in project.rows.iter().zip(chunks.iter().skip(1)) {
        let sizes: Vec<SizeLabel> = row.columns.iter().map(|c| c.size).collect();
        let columns = column_areas(*area, &sizes);
        for (column, area) in row.columns.iter().zip(columns.iter()) {
            let slots = Layout::default()
                .direction(Direction::Vertical)
                .constraints(
                    column
                        .tasks
                        .iter()
                        .map(|t| Constraint::Length(t.height()))
                        .chain(std::iter::once(Constraint::Min(0))),
                )
                .split(*area);
            let mut canvas = FrameCanvas::new(f);
            for (task, slot) in column.tasks.iter().zip(slots.iter()) {
                if slot.height == 0 || slot.width == 0 {
                    continue;
                }
                if let Err(err) = task.execute(&mut canvas, *slot) {
                    let fallback = RenderTask::error(task.widget.as_str(), slot.height, err.to_string());
                    if let Err(e) = fallback.execute(&mut canvas, *slot) {
                        failures.push(e);
                    }
                    failures.push(err);
                }
            }
        }
    }
    failures
}

/// Split a row into columns of `size / 12` of its width, left to right.
/// Whatever the sizes leave free stays empty on the right.
pub fn column_areas(area: Rect, sizes: &[SizeLabel]) -> Rc<[Rect]> {
    let grid = u32::from(SizeLabel::GRID_UNITS);
    let used: u32 = sizes.iter().map(|s| u32::from(s.units())).sum();
    let mut constraints: Vec<Constraint> = sizes
        .iter()
        .map(|s| Constraint::Ratio(u32::from(s.units()), grid.max(used)))
        .collect();
    if used < grid {
        constraints.push(Constraint::Ratio(grid - used, grid));
    }
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
}
