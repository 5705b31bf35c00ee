use std::sync::Arc;

use crate::{backend::GenerationBackend, config::Settings, orchestrator::Orchestrator};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<dyn GenerationBackend>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: Arc<Settings>) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(backend.clone(), settings.clone()));
        Self {
            settings,
            backend,
            orchestrator,
        }
    }

    pub fn new_for_tests<B>(backend: Arc<B>) -> Self
    where
        B: GenerationBackend + 'static,
    {
        Self::new(backend, Arc::new(Settings::for_tests()))
    }
}
