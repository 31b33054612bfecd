use std::collections::BTreeMap;

use tracing::debug;

use crate::types::{Options, Widget};

/// Options a widget renders with: the theme keyed by its type token, then
/// its named theme, then its own options. Later layers win on every key.
/// A named theme missing from `themes` is skipped.
pub fn resolve(widget: &Widget, themes: &BTreeMap<String, Options>) -> Options {
    let mut resolved = Options::new();

    if let Some(defaults) = widget.type_token().and_then(|t| themes.get(t)) {
        resolved.overlay(defaults);
    }

    if let Some(name) = widget.theme_name() {
        match themes.get(name) {
            Some(named) => resolved.overlay(named),
            None => debug!(widget = %widget.name, theme = name, "unknown theme, using type defaults"),
        }
    }

    resolved.overlay(&widget.options);
    resolved
}
