use std::sync::Arc;
use std::time::Duration;

use woodlink_core::config::Config;
use woodlink_core::coordinator::Coordinator;
use woodlink_core::notify::NotificationChannel;
use woodlink_core::store::WoodlinkDb;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Direct store access for the read-only and reference-entity routes.
    pub db: Arc<WoodlinkDb>,
}

impl AppState {
    pub fn new(db: Arc<WoodlinkDb>, channel: Arc<dyn NotificationChannel>, config: &Config) -> Self {
        let coordinator = Coordinator::new(
            db.clone(),
            db.clone(),
            db.clone(),
            channel,
            config.links.clone(),
        )
        .with_dispatch_timeout(Duration::from_secs(config.dispatch_timeout_secs));
        Self {
            coordinator: Arc::new(coordinator),
            db,
        }
    }
}
