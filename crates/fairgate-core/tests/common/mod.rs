//! Shared helpers for middleware integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::routing::get;
use axum::Router;
use fairgate_core::rate_limit::{install, ClientAddrMode, RateLimiter};
use hyper::Request;

/// Initialize a tracing subscriber that writes through the test harness
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

pub fn app(limiter: Arc<RateLimiter>, mode: ClientAddrMode) -> Router {
	let router = Router::new().route("/", get(|| async { "ok" }));
	install(router, limiter, mode)
}

/// Request from `peer` with a user agent
pub fn request_from(peer: &str, user_agent: &str) -> Request<Body> {
	let mut req = Request::builder()
		.uri("/")
		.header("user-agent", user_agent)
		.body(Body::empty())
		.unwrap();
	let addr: SocketAddr = peer.parse().unwrap();
	req.extensions_mut().insert(ConnectInfo(addr));
	req
}

// vim: ts=4
