use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CiConfig;
use crate::task::{Decor, Draw, RenderTask, TABLE_HEIGHT, TableData};
use crate::types::{Options, ServiceKind, Widget};

use super::{ServiceError, WidgetContext, headers, row_limit, truncate_chars, unsupported, widget_key};

/// One CI build as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub number: String,
    pub branch: String,
    pub state: String,
    pub finished_at: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: Option<u64>,
    pub message: String,
}

pub trait BuildClient: Send + Sync {
    /// Most recent builds first.
    fn builds(&self, repository: &str, limit: usize) -> Result<Vec<Build>, ServiceError>;
}

pub struct CiService {
    client: Arc<dyn BuildClient>,
    config: CiConfig,
}

impl CiService {
    pub fn new(client: Arc<dyn BuildClient>, config: CiConfig) -> Self {
        Self { client, config }
    }
}

impl super::Service for CiService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        _ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        if widget_key(widget) != "table_builds" {
            return Err(unsupported(ServiceKind::Ci, widget));
        }

        let limit = row_limit(options, 5)?;
        let characters = options.parse_or(&["character_limit"], 1000)?;
        let repository = options.get_or("repository", &self.config.repository);
        let rows = self
            .client
            .builds(repository, limit)?
            .into_iter()
            .take(limit)
            .map(|build| {
                vec![
                    build.number,
                    build.branch,
                    build.state,
                    build
                        .finished_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    build.duration.map(format_duration).unwrap_or_else(|| "-".to_string()),
                    truncate_chars(build.message.lines().next().unwrap_or_default(), characters),
                ]
            })
            .collect();

        let data = TableData {
            headers: headers(options, &["#", "Branch", "State", "Finished", "Duration", "Message"]),
            rows,
        };
        let decor = Decor::from_options(options, "Builds", TABLE_HEIGHT)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, Draw::Table(data)))
    }
}

fn format_duration(seconds: u64) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::services::Service;
    use crate::services::testing::context;

    struct FakeBuilds(Vec<Build>);

    impl BuildClient for FakeBuilds {
        fn builds(&self, repository: &str, _limit: usize) -> Result<Vec<Build>, ServiceError> {
            if repository != "acme/site" {
                return Err(ServiceError::Backend {
                    service: ServiceKind::Ci,
                    reason: format!("repository {} not found", repository),
                });
            }
            Ok(self.0.clone())
        }
    }

    fn service() -> CiService {
        let build = Build {
            number: "118".into(),
            branch: "main".into(),
            state: "passed".into(),
            finished_at: Some(Utc.with_ymd_and_hms(2019, 3, 14, 9, 30, 0).unwrap()),
            duration: Some(185),
            message: "Bump deps\n\nLonger body".into(),
        };
        let running = Build {
            number: "119".into(),
            state: "started".into(),
            finished_at: None,
            duration: None,
            ..build.clone()
        };
        CiService::new(
            Arc::new(FakeBuilds(vec![running, build])),
            CiConfig {
                token: None,
                repository: "acme/site".into(),
            },
        )
    }

    #[test]
    fn builds_table_formats_each_build() {
        let widget = Widget::new("travis.table_builds");
        let task = service().create_widget(&widget, &widget.options, &context()).unwrap();
        let Draw::Table(table) = task.draw else {
            panic!("expected a table");
        };
        assert_eq!(
            table.rows[1],
            vec!["118", "main", "passed", "2019-03-14 09:30", "3m 05s", "Bump deps"]
        );
        assert_eq!(table.rows[0][3], "-");
        assert_eq!(task.decor.title, "Builds");
    }

    #[test]
    fn repository_option_overrides_the_configured_one() {
        let widget = Widget::new("travis.table_builds").with_option("repository", "acme/other");
        let err = service().create_widget(&widget, &widget.options, &context()).unwrap_err();
        assert!(err.to_string().contains("acme/other"));
    }
}
