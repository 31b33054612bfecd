use std::sync::Arc;

use crate::config::FeedlyConfig;
use crate::task::{Decor, Draw, RenderTask, TEXT_HEIGHT};
use crate::types::{Options, ServiceKind, Widget};

use super::{ServiceError, WidgetContext, unsupported, widget_key};

pub trait FeedClient: Send + Sync {
    /// Number of readers subscribed to the feed of `address`.
    fn subscribers(&self, address: &str) -> Result<u64, ServiceError>;
}

pub struct FeedService {
    client: Arc<dyn FeedClient>,
    config: FeedlyConfig,
}

impl FeedService {
    pub fn new(client: Arc<dyn FeedClient>, config: FeedlyConfig) -> Self {
        Self { client, config }
    }
}

impl super::Service for FeedService {
    fn create_widget(
        &self,
        widget: &Widget,
        options: &Options,
        _ctx: &WidgetContext,
    ) -> Result<RenderTask, ServiceError> {
        if widget_key(widget) != "box_subscribers" {
            return Err(unsupported(ServiceKind::FeedReader, widget));
        }
        let address = options.get_or("address", &self.config.address);
        let count = self.client.subscribers(address)?;
        let decor = Decor::from_options(options, "Feed subscribers", TEXT_HEIGHT)?;
        Ok(RenderTask::new(widget.name.as_str(), decor, Draw::Text(count.to_string())))
    }
}
