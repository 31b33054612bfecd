//! Turning a project's widget tree into render tasks.
//!
//! Every widget goes through the same steps: its name is routed to a
//! service, its options are resolved against the project themes and the
//! service builds a task. Any failure along the way becomes an inline error
//! task in the widget's slot so the rest of the project still renders.

use tracing::{debug, warn};

use crate::config::Config;
use crate::layout;
use crate::services::{Backends, ServiceError, ServiceRegistry, Slot, WidgetContext};
use crate::task::{RenderTask, TEXT_HEIGHT};
use crate::theme;
use crate::types::{NameError, Options, Project, SizeLabel, Widget};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("service {0:?} is not configured for this project")]
    NotConfigured(&'static str),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Tasks of one column, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderColumn {
    pub size: SizeLabel,
    pub tasks: Vec<RenderTask>,
}

impl RenderColumn {
    pub fn height(&self) -> u16 {
        self.tasks.iter().map(RenderTask::height).fold(0, u16::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderRow {
    pub columns: Vec<RenderColumn>,
}

impl RenderRow {
    /// The tallest column decides the row height.
    pub fn height(&self) -> u16 {
        self.columns.iter().map(RenderColumn::height).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedProject {
    pub name: String,
    pub name_options: Options,
    pub rows: Vec<RenderRow>,
}

impl RenderedProject {
    /// Every task in render order.
    pub fn tasks(&self) -> impl Iterator<Item = &RenderTask> {
        self.rows
            .iter()
            .flat_map(|r| r.columns.iter())
            .flat_map(|c| c.tasks.iter())
    }

    pub fn error_count(&self) -> usize {
        self.tasks().filter(|t| t.is_error()).count()
    }
}

/// Builds render tasks for every project of a configuration.
#[derive(Clone, Default)]
pub struct Dispatcher {
    backends: Backends,
}

impl Dispatcher {
    pub fn new(backends: Backends) -> Self {
        Self { backends }
    }

    pub fn dispatch(&self, config: &Config, ctx: &WidgetContext) -> Vec<RenderedProject> {
        config
            .projects
            .iter()
            .map(|project| {
                let registry = ServiceRegistry::from_config(&project.services, &self.backends);
                dispatch_project(project, &registry, ctx)
            })
            .collect()
    }
}

/// Dispatch every widget of `project`, rows top to bottom and columns left
/// to right. A whole column is dispatched before the next one starts.
pub fn dispatch_project(project: &Project, registry: &ServiceRegistry, ctx: &WidgetContext) -> RenderedProject {
    let grid = layout::flatten(&project.widgets);

    let rows = grid
        .widgets
        .iter()
        .zip(&grid.sizes)
        .map(|(columns, sizes)| RenderRow {
            columns: columns
                .iter()
                .zip(sizes)
                .map(|(widgets, size)| RenderColumn {
                    size: *size,
                    tasks: widgets
                        .iter()
                        .map(|widget| dispatch_widget(widget, project, registry, ctx))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let rendered = RenderedProject {
        name: project.name.clone(),
        name_options: project.name_options.clone(),
        rows,
    };
    debug!(
        project = %rendered.name,
        tasks = rendered.tasks().count(),
        errors = rendered.error_count(),
        "project dispatched"
    );
    rendered
}

/// Build the task for one widget, or an error task standing in for it.
pub fn dispatch_widget(
    widget: &Widget,
    project: &Project,
    registry: &ServiceRegistry,
    ctx: &WidgetContext,
) -> RenderTask {
    let options = theme::resolve(widget, &project.themes);
    match try_dispatch(widget, &options, registry, ctx) {
        Ok(task) => task,
        Err(err) => {
            warn!(widget = %widget.name, project = %project.name, error = %err, "widget failed");
            let height = options.parse_or(&["height"], TEXT_HEIGHT).unwrap_or(TEXT_HEIGHT);
            RenderTask::error(widget.name.as_str(), height, err.to_string())
        }
    }
}

fn try_dispatch(
    widget: &Widget,
    options: &Options,
    registry: &ServiceRegistry,
    ctx: &WidgetContext,
) -> Result<RenderTask, DispatchError> {
    let route = widget.name.route().map_err(Clone::clone)?;
    match registry.get(route.service) {
        Some(Slot::Ready(service)) => Ok(service.create_widget(widget, options, ctx)?),
        Some(Slot::Unavailable(reason)) => Err(DispatchError::Unavailable(reason.clone())),
        None => Err(DispatchError::NotConfigured(route.service.prefix())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::Service;
    use crate::services::testing::context;
    use crate::task::{Decor, Draw};
    use crate::types::{Column, Row, ServiceKind, WidgetGroup};

    /// Answers every widget with a text box, except names listed as broken.
    struct Scripted {
        broken: Vec<&'static str>,
    }

    impl Service for Scripted {
        fn create_widget(
            &self,
            widget: &Widget,
            options: &Options,
            _ctx: &WidgetContext,
        ) -> Result<RenderTask, ServiceError> {
            if self.broken.contains(&widget.name.as_str()) {
                return Err(ServiceError::Backend {
                    service: ServiceKind::Git,
                    reason: "connection refused".into(),
                });
            }
            let decor = Decor::from_options(options, widget.name.as_str(), 3)?;
            Ok(RenderTask::new(widget.name.as_str(), decor, Draw::Text("ok".into())))
        }
    }

    fn column(size: SizeLabel, widgets: Vec<Widget>) -> Column {
        Column {
            col: Some(WidgetGroup { size, elements: widgets }),
        }
    }

    fn project(rows: Vec<Row>) -> Project {
        Project {
            name: "site".into(),
            name_options: Options::new(),
            themes: Default::default(),
            services: Default::default(),
            widgets: rows,
        }
    }

    fn registry(broken: Vec<&'static str>) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceKind::Git, Arc::new(Scripted { broken }));
        registry
    }

    #[test]
    fn one_failing_widget_does_not_stop_the_pass() {
        let rows = vec![
            Row {
                row: vec![
                    column(SizeLabel::M, vec![Widget::new("git.box_a")]),
                    column(SizeLabel::M, vec![Widget::new("git.box_b")]),
                ],
            },
            Row {
                row: vec![
                    column(SizeLabel::M, vec![Widget::new("git.box_c")]),
                    column(SizeLabel::M, vec![Widget::new("git.box_d")]),
                ],
            },
        ];
        let rendered = dispatch_project(&project(rows), &registry(vec!["git.box_c"]), &context());

        let names: Vec<_> = rendered.tasks().map(|t| t.widget.as_str()).collect();
        assert_eq!(names, vec!["git.box_a", "git.box_b", "git.box_c", "git.box_d"]);
        assert_eq!(rendered.error_count(), 1);
        let failed = &rendered.rows[1].columns[0].tasks[0];
        assert_eq!(failed.draw, Draw::Error("git backend failed: connection refused".into()));
    }

    #[test]
    fn routing_failures_become_error_tasks() {
        let rows = vec![Row {
            row: vec![column(
                SizeLabel::L,
                vec![
                    Widget::new("nosuch.box_x"),
                    Widget::new("malformed"),
                    Widget::new("ga.bar_sessions").with_option("height", "12"),
                    Widget::new("git.box_fine"),
                ],
            )],
        }];
        let rendered = dispatch_project(&project(rows), &registry(vec![]), &context());
        let tasks = &rendered.rows[0].columns[0].tasks;

        assert!(tasks[0].is_error() && tasks[1].is_error() && tasks[2].is_error());
        assert!(matches!(&tasks[2].draw, Draw::Error(m) if m.contains("\"ga\"")));
        assert_eq!(tasks[2].height(), 12);
        assert!(!tasks[3].is_error());
        assert_eq!(rendered.rows[0].columns[0].height(), 3 + 3 + 12 + 3);
    }

    #[test]
    fn themes_reach_the_service() {
        let mut p = project(vec![Row {
            row: vec![column(SizeLabel::S, vec![Widget::new("git.box_a").with_theme("loud")])],
        }]);
        p.themes
            .insert("loud".into(), [("title", "Themed"), ("height", "5")].into_iter().collect());
        let rendered = dispatch_project(&p, &registry(vec![]), &context());
        let task = &rendered.rows[0].columns[0].tasks[0];
        assert_eq!(task.decor.title, "Themed");
        assert_eq!(rendered.rows[0].height(), 5);
    }

    #[test]
    fn empty_columns_are_skipped_and_sizes_kept() {
        let rows = vec![Row {
            row: vec![
                Column { col: None },
                column(SizeLabel::Xs, vec![Widget::new("git.box_a")]),
                column(SizeLabel::Xl, vec![]),
            ],
        }];
        let rendered = dispatch_project(&project(rows), &registry(vec![]), &context());
        let sizes: Vec<_> = rendered.rows[0].columns.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![SizeLabel::Xs, SizeLabel::Xl]);
        assert_eq!(rendered.rows[0].columns[1].height(), 0);
    }
}
