//! Web analytics widgets (`ga.*`).
//!
//! The service builds [`ReportQuery`] values from widget options and hands
//! them to a [`ReportClient`]. Rows coming back are normalised with the
//! series helpers: bar charts are deduplicated by label, day and week charts
//! are gap-filled, tables keep the backend's raw strings.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::series::{self, Granularity, ReportRow};
use crate::task::{BAR_HEIGHT, BarData, Decor, Draw, PairedBarData, RenderTask, TABLE_HEIGHT, TEXT_HEIGHT, TableData, bar_values};
use crate::timerange::DateRange;
use crate::types::{Options, ServiceKind, Widget};

use super::{ServiceError, WidgetContext, date_range, headers, row_limit, truncate_chars, unsupported, widget_key};

const NEW_VISITOR: &str = "New Visitor";
const RETURNING_VISITOR: &str = "Returning Visitor";
const USER_TYPE: &str = "ga:userType";

/// One report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub view_id: String,
    pub range: DateRange,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    /// Sort expression, `-` prefixed for descending.
    pub order: Option<String>,
    pub filters: Option<String>,
    pub limit: Option<usize>,
}

pub trait ReportClient: Send + Sync {
    fn report(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, ServiceError>;

    fn realtime_active_users(&self, view_id: &str) -> Result<i64, ServiceError>;
}

/// How dated bar charts bucket their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    Day,
    Week,
    Month,
}

impl FromStr for TimePeriod {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimePeriod::Day),
            "week" => Ok(TimePeriod::Week),
            "month" => Ok(TimePeriod::Month),
            other => Err(ServiceError::InvalidOption {
                key: "time_period".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl TimePeriod {
    fn dimension(self) -> &'static str {
        match self {
            TimePeriod::Day => "ga:date",
            TimePeriod::Week => "ga:isoYearIsoWeek",
            TimePeriod::Month => "ga:yearMonth",
        }
    }

    fn granularity(self) -> Option<Granularity> {
        match self {
            TimePeriod::Day => Some(Granularity::Day),
            TimePeriod::Week => Some(Granularity::Week),
            TimePeriod::Month => None,
        }
    }

    /// Date a backend key stands for: `YYYYMMDD`, `YYYYWW` (Monday of the
    /// ISO week) or `YYYYMM` (first of the month).
    pub fn parse_key(self, key: &str) -> Option<NaiveDate> {
        match self {
            TimePeriod::Day => NaiveDate::parse_from_str(key, "%Y%m%d").ok(),
            TimePeriod::Week => {
                let year = key.get(..4)?.parse().ok()?;
                let week = key.get(4..)?.parse().ok()?;
                NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            }
            TimePeriod::Month => NaiveDate::parse_from_str(&format!("{}01", key), "%Y%m%d").ok(),
        }
    }

    pub fn label(self, date: NaiveDate) -> String {
        match self {
            TimePeriod::Day | TimePeriod::Week => date.format("%m-%d").to_string(),
            TimePeriod::Month => date.format("%Y-%m").to_string(),
        }
    }
}

pub struct AnalyticsService {
    client: Arc<dyn ReportClient>,
    config: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(client: Arc<dyn ReportClient>, config: AnalyticsConfig) -> Self {
        Self { client, config }
    }

    /// Widget filters, joined with the service filters unless `global` is set.
    fn filters(&self, options: &Options) -> Result<Option<String>, ServiceError> {
        let global = options.parse_or(&["global"], false)?;
        let mut parts = Vec::new();
        if !global {
            parts.extend(self.config.filters.iter().filter(|f| !f.is_empty()).cloned());
        }
        parts.extend(options.get("filters").filter(|f| !f.is_empty()).map(str::to_string));
        Ok((!parts.is_empty()).then(|| parts.join(";")))
    }

    fn query(
        &self,
        options: &Options,
        ctx: &WidgetContext,
        metrics: Vec<String>,
        dimensions: Vec<String>,
    ) -> Result<ReportQuery, ServiceError> {
        Ok(ReportQuery {
            view_id: self.config.view_id.clone(),
            range: date_range(options, ctx, "7_days_ago", "today")?,
            metrics,
            dimensions,
            order: options.get("order").map(str::to_string),
            filters: self.filters(options)?,
            limit: None,
        })
    }

    fn report(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, ServiceError> {
        debug!(
            metrics = ?query.metrics,
            dimensions = ?query.dimensions,
            range = %query.range,
            "analytics report"
        );
        self.client.report(query)
    }

    fn total(&self, options: &Options, ctx: &WidgetContext) -> Result<Draw, ServiceError> {
        let metric = options.get_any(&["metric", "metrics"]).unwrap_or("ga:sessions");
        let query = self.query(options, ctx, vec![metric.to_string()], Vec::new())?;
        let series = series::aggregate_bar(&self.report(&query)?, |_| String::new())?;
        let total: i64 = series.values.iter().sum();
        Ok(Draw::Text(total.to_string()))
    }

    fn bar(&self, options: &Options, ctx: &WidgetContext, metric: &str) -> Result<Draw, ServiceError> {
        let period: TimePeriod = options.parse_or(&["time_period"], TimePeriod::Day)?;
        let custom = options.get_any(&["dimension", "dimensions"]);
        let dimension = custom.unwrap_or(period.dimension());
        let query = self.query(options, ctx, vec![metric.to_string()], vec![dimension.to_string()])?;
        let rows = self.report(&query)?;
        let series = series::aggregate_bar(&rows, first_dimension)?;

        let (labels, values) = match custom {
            Some(_) => (series.labels, series.values),
            None => timeline(period, &series.labels, &series.values)?,
        };
        Ok(Draw::Bar(bar_data(options, labels, &values)?))
    }

    fn returning(&self, options: &Options, ctx: &WidgetContext) -> Result<Draw, ServiceError> {
        let period: TimePeriod = options.parse_or(&["time_period"], TimePeriod::Day)?;
        let metric = options.get_any(&["metric", "metrics"]).unwrap_or("ga:users");
        let dimensions = vec![period.dimension().to_string(), USER_TYPE.to_string()];
        let query = self.query(options, ctx, vec![metric.to_string()], dimensions)?;
        let rows = self.report(&query)?;
        let series = series::aggregate_segment(&rows, 1, RETURNING_VISITOR, first_dimension)?;
        let (labels, values) = timeline(period, &series.labels, &series.values)?;
        Ok(Draw::Bar(bar_data(options, labels, &values)?))
    }

    fn new_returning(&self, options: &Options, ctx: &WidgetContext) -> Result<Draw, ServiceError> {
        let period: TimePeriod = options.parse_or(&["time_period"], TimePeriod::Day)?;
        let metric = options.get_any(&["metric", "metrics"]).unwrap_or("ga:users");
        let dimensions = vec![period.dimension().to_string(), USER_TYPE.to_string()];
        let query = self.query(options, ctx, vec![metric.to_string()], dimensions)?;
        let rows = self.report(&query)?;
        let dual = series::aggregate_dual(&rows, 1, NEW_VISITOR, first_dimension)?;

        let (labels, first) = timeline(period, &dual.labels, &dual.first)?;
        let (_, second) = timeline(period, &dual.labels, &dual.second)?;
        Ok(Draw::PairedBar(PairedBarData {
            labels,
            first: bar_values(&first),
            second: bar_values(&second),
            legend: ["New".to_string(), "Returning".to_string()],
            second_color: options.get("second_color").map(str::to_string),
            bar_width: options.parse_or(&["bar_width"], 3)?,
        }))
    }

    fn table(
        &self,
        options: &Options,
        ctx: &WidgetContext,
        dimension: &str,
        metrics: &[&str],
        default_headers: &[&str],
    ) -> Result<Draw, ServiceError> {
        let dimension = options.get_any(&["dimension", "dimensions"]).unwrap_or(dimension);
        let metrics = match options.list(&["metric", "metrics"]) {
            list if list.is_empty() => metrics.iter().map(|m| m.to_string()).collect(),
            list => list,
        };
        let limit = row_limit(options, 5)?;
        let characters = options.parse_or(&["character_limit"], 1000)?;

        let mut query = self.query(options, ctx, metrics.clone(), vec![dimension.to_string()])?;
        if query.order.is_none() {
            query.order = metrics.first().map(|m| format!("-{}", m));
        }
        query.limit = Some(limit);

        let table = series::aggregate_table(&self.report(&query)?, first_dimension);
        let rows = table
            .labels
            .iter()
            .zip(table.values)
            .take(limit)
            .map(|(label, values)| {
                let mut row = vec![truncate_chars(label, characters)];
                row.extend(values);
                row
            })
            .collect();

        let default_headers: Vec<String> = if default_headers.is_empty() {
            std::iter::once(dimension)
                .chain(metrics.iter().map(String::as_str))
                .map(header_for)
                .collect()
        } else {
            default_headers.iter().map(|h| h.to_string()).collect()
        };
        let defaults: Vec<&str> = default_headers.iter().map(String::as_str).collect();
        Ok(Draw::Table(TableData {
            headers: headers(options, &defaults),
            rows,
        }))
    }
}

impl super::Service for AnalyticsService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        let (title, height, draw) = match widget_key(widget) {
            "box_real_time" => {
                let users = self.client.realtime_active_users(&self.config.view_id)?;
                ("Real time users", TEXT_HEIGHT, Draw::Text(users.to_string()))
            }
            "box_total" => ("Total", TEXT_HEIGHT, self.total(options, ctx)?),
            "bar" => {
                let metric = options.get_any(&["metric", "metrics"]).unwrap_or("ga:sessions");
                ("Analytics", BAR_HEIGHT, self.bar(options, ctx, metric)?)
            }
            "bar_sessions" => ("Sessions", BAR_HEIGHT, self.bar(options, ctx, "ga:sessions")?),
            "bar_users" => ("Users", BAR_HEIGHT, self.bar(options, ctx, "ga:users")?),
            "bar_pages" => ("Page views", BAR_HEIGHT, self.bar(options, ctx, "ga:pageviews")?),
            "bar_returning" => ("Returning visitors", BAR_HEIGHT, self.returning(options, ctx)?),
            "bar_new_returning" => (
                "New vs returning visitors",
                BAR_HEIGHT,
                self.new_returning(options, ctx)?,
            ),
            "table" => (
                "Analytics",
                TABLE_HEIGHT,
                self.table(options, ctx, "ga:pagePath", &["ga:sessions"], &[])?,
            ),
            "table_pages" => (
                "Pages",
                TABLE_HEIGHT,
                self.table(
                    options,
                    ctx,
                    "ga:pagePath",
                    &["ga:sessions", "ga:pageviews"],
                    &["Page", "Sessions", "Page views"],
                )?,
            ),
            "table_traffic_sources" => (
                "Traffic sources",
                TABLE_HEIGHT,
                self.table(
                    options,
                    ctx,
                    "ga:source",
                    &["ga:sessions", "ga:users"],
                    &["Source", "Sessions", "Users"],
                )?,
            ),
            _ => return Err(unsupported(ServiceKind::Analytics, widget)),
        };

        let decor = Decor::from_options(options, title, height)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, draw))
    }
}

fn first_dimension(dimensions: &[String]) -> String {
    dimensions.first().cloned().unwrap_or_default()
}

/// `ga:pagePath` -> `pagePath`.
fn header_for(name: &str) -> String {
    name.strip_prefix("ga:").unwrap_or(name).to_string()
}

fn bar_data(options: &Options, labels: Vec<String>, values: &[i64]) -> Result<BarData, ServiceError> {
    Ok(BarData {
        labels,
        values: bar_values(values),
        bar_width: options.parse_or(&["bar_width"], 6)?,
        bar_gap: options.parse_or(&["bar_gap"], 1)?,
    })
}

/// Turn backend date keys into a chronological, gap-filled series with
/// display labels.
pub fn timeline(
    period: TimePeriod,
    keys: &[String],
    values: &[i64],
) -> Result<(Vec<String>, Vec<i64>), ServiceError> {
    let mut points = keys
        .iter()
        .zip(values)
        .map(|(key, value)| {
            period
                .parse_key(key)
                .map(|date| (date, *value))
                .ok_or_else(|| ServiceError::Backend {
                    service: ServiceKind::Analytics,
                    reason: format!("unexpected date {:?}", key),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    points.sort_by_key(|(date, _)| *date);

    let (dates, values): (Vec<NaiveDate>, Vec<i64>) = points.into_iter().unzip();
    let (dates, values) = match period.granularity() {
        Some(step) => series::fill_gaps(&dates, &values, step)?,
        None => (dates, values),
    };
    Ok((dates.into_iter().map(|d| period.label(d)).collect(), values))
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeReports {
        pub rows: Vec<ReportRow>,
        pub active: i64,
        pub failure: Option<String>,
        pub seen: Mutex<Vec<ReportQuery>>,
    }

    impl ReportClient for FakeReports {
        fn report(&self, query: &ReportQuery) -> Result<Vec<ReportRow>, ServiceError> {
            self.seen.lock().unwrap().push(query.clone());
            match &self.failure {
                Some(reason) => Err(ServiceError::Backend {
                    service: ServiceKind::Analytics,
                    reason: reason.clone(),
                }),
                None => Ok(self.rows.clone()),
            }
        }

        fn realtime_active_users(&self, _view_id: &str) -> Result<i64, ServiceError> {
            Ok(self.active)
        }
    }
}
