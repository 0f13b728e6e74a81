use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use crucible_beacon::BeaconFeed;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use super::{
    api::index, LocalRelay, PATH_BUILDER_API, PATH_GET_HEADER, PATH_GET_PAYLOAD,
    PATH_REGISTER_VALIDATORS, PATH_STATUS,
};

pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_REQUEST_LENGTH: usize = 1024 * 1024 * 10;

pub fn build_router<B: BeaconFeed>(relay: Arc<LocalRelay<B>>) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route(&format!("{PATH_BUILDER_API}{PATH_STATUS}"), get(LocalRelay::<B>::status))
        .route(
            &format!("{PATH_BUILDER_API}{PATH_REGISTER_VALIDATORS}"),
            post(LocalRelay::<B>::register_validators),
        )
        .route(&format!("{PATH_BUILDER_API}{PATH_GET_HEADER}"), get(LocalRelay::<B>::get_header))
        .route(
            &format!("{PATH_BUILDER_API}{PATH_GET_PAYLOAD}"),
            post(LocalRelay::<B>::get_payload),
        );

    router = router.layer(RequestBodyLimitLayer::new(MAX_REQUEST_LENGTH));

    // Add Timeout-Layer
    // Add Error-handling layer
    router = router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(|_: BoxError| async { StatusCode::REQUEST_TIMEOUT }))
            .layer(TimeoutLayer::new(API_REQUEST_TIMEOUT)),
    );

    router.layer(Extension(relay))
}

/// Serves the local relay until the listener fails.
pub async fn serve<B: BeaconFeed>(relay: Arc<LocalRelay<B>>, addr: SocketAddr) {
    let router = build_router(relay);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, %err, "failed to bind local relay");
            return;
        }
    };

    info!(%addr, "local relay listening");
    match axum::serve(listener, router).await {
        Ok(_) => info!("local relay exited successfully"),
        Err(err) => error!(%err, "local relay exited with error"),
    }
}
