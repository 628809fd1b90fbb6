use crate::session::Lifecycle;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<Mutex<Lifecycle>>,
}

impl AppState {
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self {
            lifecycle: Arc::new(Mutex::new(lifecycle)),
        }
    }
}
