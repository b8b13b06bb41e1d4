use crate::frapi::ProxyPolicy;
use crate::frapi::handlers::extract_client_ip;
use crate::gate::{Decision, Gate, KnockRequest, PRE_KEY_HEADER};
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::header::HOST,
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::instrument;

/// Fallback handler covering every non-health route: one knock attempt.
///
/// The gate owns the decision; this handler only assembles the request view
/// (digest path, pre-key header bytes, client address, target host) and maps
/// the decision to its HTTP status/body pair.
#[instrument(skip_all, fields(http.method = %request.method()))]
pub async fn knock(
    Extension(gate): Extension<Arc<Gate>>,
    Extension(proxy): Extension<ProxyPolicy>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let headers = request.headers();

    // Behind a trusted proxy the socket peer would throttle every client as
    // one, so forwarded headers win there; everywhere else they are
    // attacker-controlled and ignored.
    let client_addr = if proxy.trust_forward_headers {
        extract_client_ip(headers).unwrap_or_else(|| peer.ip().to_string())
    } else {
        peer.ip().to_string()
    };

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map_or("unknown", strip_port)
        .to_string();

    let pre_key = headers.get(PRE_KEY_HEADER).map(|value| value.as_bytes());

    let digest_path = request.uri().path().trim_start_matches('/');

    let decision = gate
        .decide(&KnockRequest {
            method: request.method().clone(),
            digest_path,
            pre_key,
            client_addr: &client_addr,
            host: &host,
        })
        .await;

    respond(&decision)
}

fn respond(decision: &Decision) -> Response {
    (decision.status(), decision.message()).into_response()
}

/// Drop an optional port from a Host header value.
///
/// IPv6 literals arrive bracketed (`[::1]:8080`), so the colon search must
/// not eat into the address itself.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.rsplit_once(':').map_or(host, |(name, _port)| name)
    }
}
