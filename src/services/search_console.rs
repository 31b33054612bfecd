use std::sync::Arc;

use tracing::debug;

use crate::config::SearchConsoleConfig;
use crate::task::{Decor, Draw, RenderTask, TABLE_HEIGHT, TableData};
use crate::timerange::DateRange;
use crate::types::{Options, ServiceKind, Widget};
use crate::units::round;

use super::{ServiceError, WidgetContext, date_range, headers, row_limit, truncate_chars, unsupported, widget_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub address: String,
    pub range: DateRange,
    /// `page` or `query`.
    pub dimension: String,
    pub filters: Option<String>,
    pub limit: usize,
}

/// Search performance of one page or query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub key: String,
    pub clicks: f64,
    pub impressions: f64,
    /// Click-through rate, 0 to 1.
    pub ctr: f64,
    pub position: f64,
}

pub trait SearchClient: Send + Sync {
    fn query(&self, query: &SearchQuery) -> Result<Vec<SearchRow>, ServiceError>;
}

pub struct SearchConsoleService {
    client: Arc<dyn SearchClient>,
    config: SearchConsoleConfig,
}

impl SearchConsoleService {
    pub fn new(client: Arc<dyn SearchClient>, config: SearchConsoleConfig) -> Self {
        Self { client, config }
    }

    fn table(&self, options: &Options, ctx: &WidgetContext, dimension: &str) -> Result<Draw, ServiceError> {
        let dimension = options.get_any(&["dimension", "dimensions"]).unwrap_or(dimension);
        let limit = row_limit(options, 5)?;
        let characters = options.parse_or(&["character_limit"], 1000)?;
        let query = SearchQuery {
            address: self.config.address.clone(),
            range: date_range(options, ctx, "7_days_ago", "today")?,
            dimension: dimension.to_string(),
            filters: options.get("filters").map(str::to_string),
            limit,
        };
        debug!(dimension, range = %query.range, "search console query");

        let rows = self
            .client
            .query(&query)?
            .into_iter()
            .take(limit)
            .map(|row| {
                vec![
                    truncate_chars(&row.key, characters),
                    round(row.clicks, 0).to_string(),
                    round(row.impressions, 0).to_string(),
                    format!("{}%", round(row.ctr * 100.0, 2)),
                    round(row.position, 2).to_string(),
                ]
            })
            .collect();

        let first = match dimension {
            "query" => "Query",
            _ => "Page",
        };
        Ok(Draw::Table(TableData {
            headers: headers(options, &[first, "Clicks", "Impressions", "CTR", "Position"]),
            rows,
        }))
    }
}

impl super::Service for SearchConsoleService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        let (title, draw) = match widget_key(widget) {
            "table" | "table_pages" => ("Search pages", self.table(options, ctx, "page")?),
            "table_queries" => ("Search queries", self.table(options, ctx, "query")?),
            _ => return Err(unsupported(ServiceKind::SearchConsole, widget)),
        };
        let decor = Decor::from_options(options, title, TABLE_HEIGHT)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, draw))
    }
}
