//! Data services behind widget name prefixes.
//!
//! Each service turns a widget and its themed options into a [`RenderTask`].
//! Services talking to a web API take their client through a trait so that
//! real clients can be plugged in; the ones that only need local executables
//! (`git`, `sh`, `ssh`) are built straight from the configuration.

pub mod analytics;
pub mod ci;
pub mod display;
pub mod feeds;
pub mod git;
pub mod host;
pub mod issues;
pub mod runner;
pub mod search_console;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, warn};

use crate::config::ServicesConfig;
use crate::series::SeriesError;
use crate::task::RenderTask;
use crate::timerange::{self, DateError, DateRange};
use crate::types::{Options, ServiceKind, Widget};

pub use analytics::{AnalyticsService, ReportClient, ReportQuery};
pub use ci::{Build, BuildClient, CiService};
pub use display::DisplayService;
pub use feeds::{FeedClient, FeedService};
pub use git::GitService;
pub use host::HostService;
pub use issues::{DailyViews, Issue, IssueService, RepositoryClient, RepositoryStats};
pub use runner::{CommandRunner, LocalRunner, SshRunner};
pub use search_console::{SearchClient, SearchConsoleService, SearchQuery, SearchRow};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("option {key:?} has invalid value {value:?}")]
    InvalidOption { key: String, value: String },
    #[error("option {0:?} is required")]
    MissingOption(&'static str),
    #[error(transparent)]
    Date(#[from] DateError),
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error("{service} backend failed: {reason}")]
    Backend { service: ServiceKind, reason: String },
    #[error("command {command:?} failed: {reason}")]
    Command { command: String, reason: String },
    #[error("cannot parse output of {command:?}: {reason}")]
    Output { command: String, reason: String },
    #[error("{service} has no widget {widget:?}")]
    UnsupportedWidget { service: ServiceKind, widget: String },
}

/// Per-pass facts shared by every widget of the pass.
#[derive(Debug, Clone)]
pub struct WidgetContext {
    /// Reference instant for relative dates.
    pub now: DateTime<FixedOffset>,
}

impl WidgetContext {
    pub fn now() -> Self {
        Self {
            now: Local::now().fixed_offset(),
        }
    }
}

pub trait Service: Send + Sync {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError>;
}

/// API clients supplied by the embedding program.
#[derive(Clone, Default)]
pub struct Backends {
    pub analytics: Option<Arc<dyn ReportClient>>,
    pub search_console: Option<Arc<dyn SearchClient>>,
    pub ci: Option<Arc<dyn BuildClient>>,
    pub issues: Option<Arc<dyn RepositoryClient>>,
    pub feeds: Option<Arc<dyn FeedClient>>,
}

#[derive(Clone)]
pub enum Slot {
    Ready(Arc<dyn Service>),
    /// Configured, but nothing can serve it.
    Unavailable(String),
}

/// Services configured for one project, keyed by the variant their widget
/// prefix resolves to.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    slots: BTreeMap<ServiceKind, Slot>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the services a project configures. The display service needs no
    /// configuration and is always present.
    pub fn from_config(config: &ServicesConfig, backends: &Backends) -> Self {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceKind::Display, Arc::new(DisplayService));

        if let Some(cfg) = &config.google_analytics {
            match &backends.analytics {
                Some(client) => registry.register(
                    ServiceKind::Analytics,
                    Arc::new(AnalyticsService::new(client.clone(), cfg.clone())),
                ),
                None => registry.unavailable(ServiceKind::Analytics),
            }
        }
        if let Some(cfg) = &config.google_search_console {
            match &backends.search_console {
                Some(client) => registry.register(
                    ServiceKind::SearchConsole,
                    Arc::new(SearchConsoleService::new(client.clone(), cfg.clone())),
                ),
                None => registry.unavailable(ServiceKind::SearchConsole),
            }
        }
        if let Some(cfg) = &config.travis {
            match &backends.ci {
                Some(client) => registry.register(
                    ServiceKind::Ci,
                    Arc::new(CiService::new(client.clone(), cfg.clone())),
                ),
                None => registry.unavailable(ServiceKind::Ci),
            }
        }
        if let Some(cfg) = &config.github {
            match &backends.issues {
                Some(client) => registry.register(
                    ServiceKind::IssueTracker,
                    Arc::new(IssueService::new(client.clone(), cfg.clone())),
                ),
                None => registry.unavailable(ServiceKind::IssueTracker),
            }
        }
        if let Some(cfg) = &config.feedly {
            match &backends.feeds {
                Some(client) => registry.register(
                    ServiceKind::FeedReader,
                    Arc::new(FeedService::new(client.clone(), cfg.clone())),
                ),
                None => registry.unavailable(ServiceKind::FeedReader),
            }
        }
        if let Some(cfg) = &config.git {
            registry.register(
                ServiceKind::Git,
                Arc::new(GitService::new(Arc::new(LocalRunner), &cfg.path)),
            );
        }
        if config.localhost.is_some() {
            registry.register(ServiceKind::LocalHost, Arc::new(HostService::new(Arc::new(LocalRunner))));
        }
        if let Some(cfg) = &config.remote_host {
            registry.register(
                ServiceKind::RemoteHost,
                Arc::new(HostService::new(Arc::new(SshRunner::from_config(cfg)))),
            );
        }

        debug!(services = ?registry.slots.keys().collect::<Vec<_>>(), "services configured");
        registry
    }

    pub fn register(&mut self, kind: ServiceKind, service: Arc<dyn Service>) {
        self.slots.insert(kind, Slot::Ready(service));
    }

    fn unavailable(&mut self, kind: ServiceKind) {
        warn!(service = %kind, "service configured but no backend client registered");
        self.slots.insert(
            kind,
            Slot::Unavailable(format!("no backend client registered for {:?}", kind.prefix())),
        );
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&Slot> {
        self.slots.get(&kind)
    }
}

pub(crate) fn unsupported(service: ServiceKind, widget: &Widget) -> ServiceError {
    let widget = widget
        .name
        .route()
        .map(|r| r.widget.clone())
        .unwrap_or_else(|_| widget.name.to_string());
    ServiceError::UnsupportedWidget { service, widget }
}

/// The `type_variant` part of a widget name.
pub(crate) fn widget_key(widget: &Widget) -> &str {
    widget
        .name
        .route()
        .map(|r| r.widget.as_str())
        .unwrap_or_else(|_| widget.name.as_str())
}

/// Resolve `start_date` / `end_date` against the pass's reference instant.
pub(crate) fn date_range(
    options: &Options,
    ctx: &WidgetContext,
    default_start: &str,
    default_end: &str,
) -> Result<DateRange, ServiceError> {
    let start = options.get_or("start_date", default_start);
    let end = options.get_or("end_date", default_end);
    Ok(timerange::resolve(&ctx.now, start, end)?)
}

/// Cut `text` to at most `limit` characters.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// `headers` option when set, the given defaults otherwise.
pub(crate) fn headers(options: &Options, defaults: &[&str]) -> Vec<String> {
    let custom = options.list(&["headers"]);
    if custom.is_empty() {
        defaults.iter().map(|h| h.to_string()).collect()
    } else {
        custom
    }
}

pub(crate) fn row_limit(options: &Options, default: usize) -> Result<usize, ServiceError> {
    options.parse_or(&["row_limit", "limit_row"], default)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::TimeZone;

    /// Thursday 2019-03-14 10:00 UTC.
    pub fn context() -> WidgetContext {
        WidgetContext {
            now: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2019, 3, 14, 10, 0, 0)
                .unwrap(),
        }
    }
}
