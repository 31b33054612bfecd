//! Terminal dashboard core.
//!
//! A configuration describes projects made of rows, columns and widgets.
//! Each refresh flattens the widget tree ([`layout`]), resolves widget
//! options against themes ([`theme`]), lets the owning service build a
//! render task ([`dispatch`], [`services`]) and draws the tasks ([`ui`]).
//! [`coordinator`] drives refreshes from a timer and key presses.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod layout;
pub mod logging;
pub mod series;
pub mod services;
pub mod task;
pub mod theme;
pub mod timerange;
pub mod types;
pub mod ui;
pub mod units;
