use crate::task::{Decor, Draw, RenderTask, TEXT_HEIGHT};
use crate::types::{Options, ServiceKind, Widget};

use super::{ServiceError, WidgetContext, unsupported, widget_key};

/// Static content: `display.box` shows its `text` option, `display.empty`
/// reserves space without a border.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayService;

impl super::Service for DisplayService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        _ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        match widget_key(widget) {
            "box" => {
                let decor = Decor::from_options(options, "", TEXT_HEIGHT)?;
                let text = options.get_or("text", "").replace("\\n", "\n");
                Ok(RenderTask::new(widget.name.as_str(), decor, Draw::Text(text)))
            }
            "empty" => {
                let mut decor = Decor::from_options(options, "", TEXT_HEIGHT)?;
                decor.border = false;
                Ok(RenderTask::new(widget.name.as_str(), decor, Draw::Text(String::new())))
            }
            _ => Err(unsupported(ServiceKind::Display, widget)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Service;
    use crate::services::testing::context;

    #[test]
    fn box_shows_its_text() {
        let widget = Widget::new("display.box")
            .with_option("title", "Welcome")
            .with_option("text", "line one\\nline two");
        let task = DisplayService
            .create_widget(&widget, &widget.options, &context())
            .unwrap();
        assert_eq!(task.decor.title, "Welcome");
        assert_eq!(task.draw, Draw::Text("line one\nline two".to_string()));
        assert!(task.decor.border);
    }

    #[test]
    fn empty_has_no_border() {
        let widget = Widget::new("display.empty").with_option("height", "5");
        let task = DisplayService
            .create_widget(&widget, &widget.options, &context())
            .unwrap();
        assert!(!task.decor.border);
        assert_eq!(task.height(), 5);
    }

    #[test]
    fn unknown_display_widget_is_an_error() {
        let widget = Widget::new("display.banner");
        assert!(DisplayService.create_widget(&widget, &widget.options, &context()).is_err());
    }
}
