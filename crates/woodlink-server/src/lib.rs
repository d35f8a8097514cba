pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use woodlink_core::config::{Config, MessagingConfig};
use woodlink_core::notify::{LogChannel, NotificationChannel};
use woodlink_core::reconcile::{self, ReconcileReport};
use woodlink_core::store::WoodlinkDb;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "linked!" }))
        // Claims
        .route(
            "/claims",
            get(routes::claims::list_claims).post(routes::claims::submit_claim),
        )
        .route("/claims/change", post(routes::claims::change_delivery))
        .route("/claims/accept/{id}", get(routes::claims::accept_claim))
        .route("/claims/cancel/{id}", get(routes::claims::cancel_claim))
        .route("/claims/{id}", get(routes::claims::get_claim))
        // Reference entities
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/{phone}",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route(
            "/workshops",
            get(routes::workshops::list_workshops).post(routes::workshops::create_workshop),
        )
        .route("/workshops/{name}", get(routes::workshops::find_workshops))
        .route(
            "/items",
            get(routes::items::list_items).post(routes::items::create_item),
        )
        .route("/items/{id}", put(routes::items::update_item))
        .route(
            "/reviews",
            get(routes::reviews::list_reviews).post(routes::reviews::create_review),
        )
        // GET takes a reviewer name, PUT a review id.
        .route(
            "/reviews/{key}",
            get(routes::reviews::reviews_by_user).put(routes::reviews::update_review),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Pick the production channel when credentials are configured, otherwise
/// log-only.
pub fn notification_channel(
    messaging: &MessagingConfig,
) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    let channel: Arc<dyn NotificationChannel> = if messaging.is_usable() {
        Arc::new(solapi_client::SolapiChannel::from_config(messaging)?)
    } else {
        tracing::warn!("messaging credentials missing; notifications will only be logged");
        Arc::new(LogChannel)
    };
    Ok(channel)
}

/// Re-derive item availability from claims, off the async executor.
pub async fn reconcile_store(db: Arc<WoodlinkDb>) -> anyhow::Result<ReconcileReport> {
    let report =
        tokio::task::spawn_blocking(move || reconcile::run(db.as_ref(), db.as_ref())).await??;
    if report.repaired.is_empty() {
        tracing::info!(checked = report.checked, "reconcile: items consistent");
    } else {
        tracing::warn!(
            checked = report.checked,
            repaired = report.repaired.len(),
            "reconcile: repaired item status"
        );
    }
    Ok(report)
}

/// Open the store, recover, and serve until the process is stopped.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning.message);
    }

    let db = Arc::new(WoodlinkDb::open(&config.db_path)?);
    if config.reconcile_on_start {
        reconcile_store(db.clone()).await?;
    }

    let channel = notification_channel(&config.messaging)?;
    let app = build_router(state::AppState::new(db, channel, &config));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("woodlink server listening on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}
