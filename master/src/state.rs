// master/src/state.rs

use std::sync::Arc;

use crate::config::Settings;
use crate::dispatcher::WorkerDispatcher;
use crate::registry::TaskRegistry;

#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskRegistry,
    pub dispatcher: Arc<WorkerDispatcher>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings, dispatcher: WorkerDispatcher) -> Self {
        Self {
            tasks: TaskRegistry::new(),
            dispatcher: Arc::new(dispatcher),
            settings: Arc::new(settings),
        }
    }

    pub fn from_settings(settings: Settings) -> Self {
        let dispatcher = WorkerDispatcher::from_settings(&settings);
        Self::new(settings, dispatcher)
    }
}
