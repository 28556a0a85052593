mod handlers;
mod state;

use axum::routing::get;
use axum::Router;
use log::{error, info};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::geo::CityIndex;
use crate::location::AddressResolver;

pub fn build_router(resolver: AddressResolver, cities: Arc<CityIndex>) -> Router {
    let state = Arc::new(AppState {
        resolver,
        cities,
    });

    Router::new()
        .route("/api/reverse", get(handlers::reverse))
        .route("/api/elevation", get(handlers::elevation))
        .route("/api/cities", get(handlers::city_list))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, resolver: AddressResolver, cities: Arc<CityIndex>) -> std::io::Result<()> {
    let app = build_router(resolver, cities);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("Cannot bind to {}: {}", addr, e);
        e
    })?;

    info!("Polaris Atlas server listening on http://{}", addr);
    axum::serve(listener, app).await
}
