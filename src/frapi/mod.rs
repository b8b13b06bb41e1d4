//! HTTP surface: router construction and server bootstrap.

pub(crate) mod handlers;

use crate::cli::globals::GlobalArgs;
use crate::gate::Gate;
use crate::gate::memory::{MemoryAllowlist, MemoryRateLimiter, MemorySecrets};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

/// Whether client addresses may be taken from proxy headers.
///
/// Off by default: trusting `x-forwarded-for` from a directly reachable
/// listener lets any client rotate the header to evade rate limiting and
/// poison allowlist entries for arbitrary addresses. Enable only behind a
/// trusted proxy that overwrites those headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProxyPolicy {
    pub trust_forward_headers: bool,
}

/// Build the application router around a gate.
///
/// `/health` is the only named route; everything else falls through to the
/// knock handler, which owns the method check and the digest-path semantics.
#[must_use]
pub fn router(gate: Arc<Gate>, proxy: ProxyPolicy) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .fallback(handlers::knock)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(gate))
                .layer(Extension(proxy)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, globals: &GlobalArgs) -> Result<()> {
    let gate = Arc::new(Gate::new(
        globals.gate_config(),
        Arc::new(MemorySecrets::new(globals.users.clone())),
        Arc::new(MemoryAllowlist::default()),
        Arc::new(MemoryRateLimiter::default()),
    ));

    let app = router(
        gate,
        ProxyPolicy {
            trust_forward_headers: globals.behind_proxy,
        },
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
