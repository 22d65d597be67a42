use std::sync::Arc;

use crate::{
    Config, auth::GoogleOAuth, events::EventBus, model::ModelManager, storage::ObjectStorage,
    web::middlewares::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    mm: ModelManager,
    config: &'static Config,
    events: EventBus,
    storage: Arc<dyn ObjectStorage>,
    google: Option<Arc<GoogleOAuth>>,
    rate_limiter: RateLimiter,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("mm", &self.mm)
            .field("google", &self.google.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        mm: ModelManager,
        config: &'static Config,
        events: EventBus,
        storage: Arc<dyn ObjectStorage>,
        google: Option<GoogleOAuth>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit_max_requests(),
            std::time::Duration::from_secs(config.rate_limit_window_secs()),
        );

        Self {
            mm,
            config,
            events,
            storage,
            google: google.map(Arc::new),
            rate_limiter,
        }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn config(&self) -> &'static Config {
        self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn google(&self) -> Option<&GoogleOAuth> {
        self.google.as_deref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
