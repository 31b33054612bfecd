//! Repository host widgets (`github.*`): counters, open issues and daily
//! traffic.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::GithubConfig;
use crate::series::{self, Granularity};
use crate::task::{BAR_HEIGHT, BarData, Decor, Draw, RenderTask, TABLE_HEIGHT, TEXT_HEIGHT, TableData, bar_values};
use crate::types::{Options, ServiceKind, Widget};

use super::{ServiceError, WidgetContext, date_range, headers, row_limit, truncate_chars, unsupported, widget_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryStats {
    pub stars: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub forks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Page views for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub count: u64,
    pub uniques: u64,
}

pub trait RepositoryClient: Send + Sync {
    fn stats(&self, owner: &str, repository: &str) -> Result<RepositoryStats, ServiceError>;

    /// Open issues, newest first.
    fn open_issues(&self, owner: &str, repository: &str, limit: usize) -> Result<Vec<Issue>, ServiceError>;

    /// Daily traffic, sorted by date. Days without traffic may be missing.
    fn views(&self, owner: &str, repository: &str) -> Result<Vec<DailyViews>, ServiceError>;
}

pub struct IssueService {
    client: Arc<dyn RepositoryClient>,
    config: GithubConfig,
}

impl IssueService {
    pub fn new(client: Arc<dyn RepositoryClient>, config: GithubConfig) -> Self {
        Self { client, config }
    }

    fn target<'a>(&'a self, options: &'a Options) -> (&'a str, &'a str) {
        (
            options.get_or("owner", &self.config.owner),
            options.get_or("repository", &self.config.repository),
        )
    }

    fn views(&self, options: &Options, ctx: &WidgetContext) -> Result<Draw, ServiceError> {
        let range = date_range(options, ctx, "14_days_ago", "today")?;
        let uniques = options.get_or("metric", "views") == "uniques";
        let (owner, repository) = self.target(options);

        let (dates, values): (Vec<NaiveDate>, Vec<i64>) = self
            .client
            .views(owner, repository)?
            .into_iter()
            .filter(|day| day.date >= range.start && day.date <= range.end)
            .map(|day| {
                let value = if uniques { day.uniques } else { day.count };
                (day.date, i64::try_from(value).unwrap_or(i64::MAX))
            })
            .unzip();
        let (dates, values) = series::fill_gaps(&dates, &values, Granularity::Day)?;

        Ok(Draw::Bar(BarData {
            labels: dates.iter().map(|d| d.format("%m-%d").to_string()).collect(),
            values: bar_values(&values),
            bar_width: options.parse_or(&["bar_width"], 6)?,
            bar_gap: options.parse_or(&["bar_gap"], 1)?,
        }))
    }
}

impl super::Service for IssueService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        let (owner, repository) = self.target(options);
        let (title, height, draw) = match widget_key(widget) {
            "box_stars" => {
                let stats = self.client.stats(owner, repository)?;
                ("Stars", TEXT_HEIGHT, Draw::Text(stats.stars.to_string()))
            }
            "box_watchers" => {
                let stats = self.client.stats(owner, repository)?;
                ("Watchers", TEXT_HEIGHT, Draw::Text(stats.watchers.to_string()))
            }
            "box_open_issues" => {
                let stats = self.client.stats(owner, repository)?;
                ("Open issues", TEXT_HEIGHT, Draw::Text(stats.open_issues.to_string()))
            }
            "table_issues" => {
                let limit = row_limit(options, 5)?;
                let characters = options.parse_or(&["character_limit"], 1000)?;
                let rows = self
                    .client
                    .open_issues(owner, repository, limit)?
                    .into_iter()
                    .take(limit)
                    .map(|issue| {
                        vec![
                            format!("#{}", issue.number),
                            truncate_chars(&issue.title, characters),
                            issue.author,
                            issue.created_at.format("%Y-%m-%d").to_string(),
                        ]
                    })
                    .collect();
                let data = TableData {
                    headers: headers(options, &["#", "Title", "Author", "Opened"]),
                    rows,
                };
                ("Issues", TABLE_HEIGHT, Draw::Table(data))
            }
            "bar_views" => ("Views", BAR_HEIGHT, self.views(options, ctx)?),
            _ => return Err(unsupported(ServiceKind::IssueTracker, widget)),
        };

        let decor = Decor::from_options(options, title, height)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, draw))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::services::Service;
    use crate::services::testing::context;

    struct FakeRepository;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 3, d).unwrap()
    }

    impl RepositoryClient for FakeRepository {
        fn stats(&self, owner: &str, _repository: &str) -> Result<RepositoryStats, ServiceError> {
            if owner != "acme" {
                return Err(ServiceError::Backend {
                    service: ServiceKind::IssueTracker,
                    reason: "not found".into(),
                });
            }
            Ok(RepositoryStats {
                stars: 1500,
                watchers: 40,
                open_issues: 12,
                forks: 80,
            })
        }

        fn open_issues(&self, _: &str, _: &str, _limit: usize) -> Result<Vec<Issue>, ServiceError> {
            Ok((1..=3)
                .map(|n| Issue {
                    number: 100 + n,
                    title: format!("Issue number {}", n),
                    author: "ada".into(),
                    created_at: Utc.with_ymd_and_hms(2019, 3, n as u32, 8, 0, 0).unwrap(),
                })
                .collect())
        }

        fn views(&self, _: &str, _: &str) -> Result<Vec<DailyViews>, ServiceError> {
            Ok(vec![
                DailyViews { date: day(1), count: 99, uniques: 9 },
                DailyViews { date: day(10), count: 30, uniques: 3 },
                DailyViews { date: day(13), count: 12, uniques: 2 },
            ])
        }
    }

    fn service() -> IssueService {
        IssueService::new(
            Arc::new(FakeRepository),
            GithubConfig {
                token: None,
                owner: "acme".into(),
                repository: "site".into(),
            },
        )
    }

    fn build(widget: Widget) -> Result<RenderTask, ServiceError> {
        service().create_widget(&widget, &widget.options, &context())
    }

    #[test]
    fn counter_boxes() {
        assert_eq!(build(Widget::new("github.box_stars")).unwrap().draw, Draw::Text("1500".into()));
        assert_eq!(build(Widget::new("github.box_open_issues")).unwrap().draw, Draw::Text("12".into()));
        let other = Widget::new("github.box_watchers").with_option("owner", "nobody");
        assert!(build(other).is_err());
    }

    #[test]
    fn views_are_limited_to_the_range_and_gap_filled() {
        let widget = Widget::new("github.bar_views")
            .with_option("start_date", "5_days_ago")
            .with_option("metric", "uniques");
        let task = build(widget).unwrap();
        let Draw::Bar(bar) = task.draw else {
            panic!("expected a bar chart");
        };
        assert_eq!(bar.labels, vec!["03-10", "03-11", "03-12", "03-13"]);
        assert_eq!(bar.values, vec![3, 0, 0, 2]);
    }

    #[test]
    fn issue_table_respects_row_limit() {
        let widget = Widget::new("github.table_issues").with_option("row_limit", "2");
        let Draw::Table(table) = build(widget).unwrap().draw else {
            panic!("expected a table");
        };
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["#101", "Issue number 1", "ada", "2019-03-01"]);
    }
}
