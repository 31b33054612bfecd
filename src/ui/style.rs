use ratatui::{
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders},
};

use crate::task::Decor;

/// Named (`red`, `lightblue`), indexed (`33`) or hex (`#ff8800`) colors.
/// Unknown names fall back to the terminal default.
pub fn color(name: Option<&str>) -> Option<Color> {
    name.and_then(|n| n.trim().parse::<Color>().ok())
}

pub fn fg(name: Option<&str>) -> Style {
    match color(name) {
        Some(c) => Style::default().fg(c),
        None => Style::default(),
    }
}

pub fn text_style(decor: &Decor) -> Style {
    fg(decor.text_color.as_deref())
}

/// Main color of charts and gauges.
pub fn accent(decor: &Decor, fallback: Color) -> Style {
    Style::default().fg(color(decor.color.as_deref()).unwrap_or(fallback))
}

pub fn block(decor: &Decor) -> Block<'static> {
    let title = Span::styled(
        format!(" {} ", decor.title),
        fg(decor.title_color.as_deref()).add_modifier(Modifier::BOLD),
    );
    let block = Block::default().border_style(fg(decor.border_color.as_deref()));
    if !decor.border {
        return block.borders(Borders::NONE);
    }
    if decor.title.is_empty() {
        block.borders(Borders::ALL)
    } else {
        block.title(title).borders(Borders::ALL)
    }
}
