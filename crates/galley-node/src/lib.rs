//! # Galley Node
//!
//! REST and WebSocket façade over the menu and order engine, plus the
//! background refresh scheduler.

pub mod api;
pub mod config;
pub mod scheduler;
pub mod state;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::config::GalleyConfig;
pub use scheduler::RefreshScheduler;
pub use state::AppState;

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        // Catalog and menu
        .route("/api/v1/categories", get(api::catalog::list_categories))
        .route("/api/v1/menu", get(api::catalog::get_menu))
        .route(
            "/api/v1/offerings/:id/composition",
            get(api::catalog::get_composition),
        )
        .route("/api/v1/offerings/:id/profile", get(api::catalog::get_profile))
        .route(
            "/api/v1/offerings/:id/feasibility",
            post(api::catalog::check_feasibility),
        )
        .route(
            "/api/v1/offerings/:id/attributes",
            post(api::catalog::attribute_report),
        )
        // Orders
        .route(
            "/api/v1/orders/:order_id/items",
            post(api::orders::place_item).get(api::orders::list_items),
        )
        .route("/api/v1/orders/:order_id/receipt", get(api::orders::get_receipt))
        .route("/api/v1/orders/:order_id/settle", post(api::orders::settle))
        .route("/api/v1/items/:id", get(api::orders::get_item))
        .route("/api/v1/items/:id/status", get(api::orders::get_status))
        .route("/api/v1/items/:id/cancel", post(api::orders::cancel_item))
        .route("/api/v1/items/:id/advance", post(api::orders::advance_item))
        .route("/api/v1/items/:id/quantity", put(api::orders::update_quantity))
        .route("/api/v1/refresh", post(api::orders::refresh))
        // WebSocket
        .route("/ws/orders/:order_id", get(api::ws::order_stream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Run the node until the server stops.
pub async fn run(config: GalleyConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).await?;

    RefreshScheduler::new(state.orders.clone(), config.refresh.sweep_interval()?).spawn();

    let app = create_router(state);
    let listener = TcpListener::bind(config.server.bind).await?;
    info!(addr = %config.server.bind, "Galley node listening");

    axum::serve(listener, app).await?;
    Ok(())
}
