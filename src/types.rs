use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::ServicesConfig;
use crate::services::ServiceError;

/// Flat `key -> value` option map. Scalars of any type are stringified when
/// the configuration is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, Scalar>")]
pub struct Options(BTreeMap<String, String>);

/// Any scalar an option value may be written as.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<BTreeMap<String, Scalar>> for Options {
    fn from(map: BTreeMap<String, Scalar>) -> Self {
        Options(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Scalar::Bool(b) => b.to_string(),
                        Scalar::Int(i) => i.to_string(),
                        Scalar::Float(f) => f.to_string(),
                        Scalar::Str(s) => s,
                    };
                    (k, v)
                })
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Options(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First present key among aliases such as `row_limit` / `limit_row`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copy every entry of `other` over this map; `other` wins on conflicts.
    pub fn overlay(&mut self, other: &Options) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parse<T: FromStr>(&self, keys: &[&str]) -> Result<Option<T>, ServiceError> {
        let Some((key, raw)) = keys.iter().find_map(|k| self.get(k).map(|v| (*k, v))) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ServiceError::InvalidOption {
                key: key.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn parse_or<T: FromStr>(&self, keys: &[&str], default: T) -> Result<T, ServiceError> {
        Ok(self.parse(keys)?.unwrap_or(default))
    }

    /// Comma separated list, empty entries dropped.
    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        self.get_any(keys)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Every service a widget prefix can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    Analytics,
    SearchConsole,
    Ci,
    IssueTracker,
    FeedReader,
    Git,
    LocalHost,
    RemoteHost,
    Display,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 9] = [
        ServiceKind::Analytics,
        ServiceKind::SearchConsole,
        ServiceKind::Ci,
        ServiceKind::IssueTracker,
        ServiceKind::FeedReader,
        ServiceKind::Git,
        ServiceKind::LocalHost,
        ServiceKind::RemoteHost,
        ServiceKind::Display,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            ServiceKind::Analytics => "ga",
            ServiceKind::SearchConsole => "gsc",
            ServiceKind::Ci => "travis",
            ServiceKind::IssueTracker => "github",
            ServiceKind::FeedReader => "feedly",
            ServiceKind::Git => "git",
            ServiceKind::LocalHost => "lh",
            ServiceKind::RemoteHost => "rh",
            ServiceKind::Display => "display",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("widget name {0:?} must look like service.type_variant")]
    Malformed(String),
    #[error("unknown service {prefix:?} in widget {name:?}")]
    UnknownService { prefix: String, name: String },
}

/// Where a widget name points: the owning service, the widget type token
/// (`bar`, `table`, `box`, `gauge`) and the full `type_variant` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub service: ServiceKind,
    pub kind: String,
    pub widget: String,
}

/// A widget name, parsed once when the configuration is read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct WidgetName {
    raw: String,
    route: Result<Route, NameError>,
}

impl From<String> for WidgetName {
    fn from(raw: String) -> Self {
        let route = parse_route(&raw);
        WidgetName { raw, route }
    }
}

impl From<&str> for WidgetName {
    fn from(raw: &str) -> Self {
        WidgetName::from(raw.to_string())
    }
}

impl WidgetName {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn route(&self) -> Result<&Route, &NameError> {
        self.route.as_ref()
    }
}

impl fmt::Display for WidgetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_route(raw: &str) -> Result<Route, NameError> {
    let (prefix, widget) = raw
        .split_once('.')
        .filter(|(p, w)| !p.is_empty() && !w.is_empty())
        .ok_or_else(|| NameError::Malformed(raw.to_string()))?;

    let service = ServiceKind::from_prefix(prefix).ok_or_else(|| NameError::UnknownService {
        prefix: prefix.to_string(),
        name: raw.to_string(),
    })?;

    let kind = widget.split('_').next().unwrap_or(widget).to_string();
    Ok(Route {
        service,
        kind,
        widget: widget.to_string(),
    })
}

/// Column width label, mapped onto a 12 unit grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SizeLabel {
    Xxs,
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl SizeLabel {
    pub const GRID_UNITS: u16 = 12;

    pub fn units(self) -> u16 {
        match self {
            SizeLabel::Xxs => 1,
            SizeLabel::Xs => 2,
            SizeLabel::S => 4,
            SizeLabel::M => 6,
            SizeLabel::L => 8,
            SizeLabel::Xl => 10,
            SizeLabel::Xxl => 12,
        }
    }
}

impl FromStr for SizeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "XXS" => Ok(SizeLabel::Xxs),
            "XS" => Ok(SizeLabel::Xs),
            "S" => Ok(SizeLabel::S),
            "M" => Ok(SizeLabel::M),
            "L" => Ok(SizeLabel::L),
            "XL" => Ok(SizeLabel::Xl),
            "XXL" => Ok(SizeLabel::Xxl),
            _ => Err(format!(
                "invalid size {:?}: expected one of XXS, XS, S, M, L, XL, XXL",
                s
            )),
        }
    }
}

impl TryFrom<String> for SizeLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SizeLabel::Xxs => "XXS",
            SizeLabel::Xs => "XS",
            SizeLabel::S => "S",
            SizeLabel::M => "M",
            SizeLabel::L => "L",
            SizeLabel::Xl => "XL",
            SizeLabel::Xxl => "XXL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Widget {
    pub name: WidgetName,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub theme: Option<String>,
}

impl Widget {
    pub fn new(name: &str) -> Self {
        Widget {
            name: WidgetName::from(name),
            options: Options::new(),
            theme: None,
        }
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn with_theme(mut self, theme: &str) -> Self {
        self.theme = Some(theme.to_string());
        self
    }

    /// Named theme: the dedicated field, else the `theme` option.
    pub fn theme_name(&self) -> Option<&str> {
        self.theme.as_deref().or_else(|| self.options.get("theme"))
    }

    /// Type token used for the implicit type-default theme.
    pub fn type_token(&self) -> Option<&str> {
        self.name.route().ok().map(|r| r.kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WidgetGroup {
    pub size: SizeLabel,
    #[serde(default)]
    pub elements: Vec<Widget>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub col: Option<WidgetGroup>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub row: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub name_options: Options,
    #[serde(default)]
    pub themes: BTreeMap<String, Options>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub widgets: Vec<Row>,
}

impl Project {
    /// Every widget of the project in configuration order.
    pub fn all_widgets(&self) -> impl Iterator<Item = &Widget> {
        self.widgets
            .iter()
            .flat_map(|r| r.row.iter())
            .filter_map(|c| c.col.as_ref())
            .flat_map(|g| g.elements.iter())
    }
}
