use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::model::InMemoryModel;
use crate::websocket::{log_view_command, SyncHandler, ViewListener};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub model: Arc<InMemoryModel>,
    pub handler: Arc<SyncHandler>,
    pub started_at: Instant,
}

impl AppState {
    /// State whose connections log client commands without acting on them
    pub fn new(settings: Settings) -> Self {
        Self::build(
            settings,
            Arc::new(InMemoryModel::new()),
            Some(Arc::new(log_view_command)),
        )
    }

    /// State whose connections relay client commands to `view`
    pub fn with_view_listener(settings: Settings, model: Arc<InMemoryModel>, view: ViewListener) -> Self {
        Self::build(settings, model, Some(view))
    }

    fn build(settings: Settings, model: Arc<InMemoryModel>, view: Option<ViewListener>) -> Self {
        let mut handler = SyncHandler::new(settings.websocket.route.clone(), model.clone());
        if let Some(view) = view {
            handler = handler.with_view_listener(view);
        }

        Self {
            settings: Arc::new(settings),
            model,
            handler: Arc::new(handler),
            started_at: Instant::now(),
        }
    }
}
