//! fairgate server
//!
//! Serves a small demo API behind the weighted rate limiter. Useful for
//! trying out a configuration before embedding the limiter in an application.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use fairgate_core::rate_limit::{install, BanEntry, RateLimitApi, RateLimiter, RateLimiterStats};
use fairgate_core::UaDeviceClassifier;
use fairgate_types::prelude::*;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;

async fn index() -> &'static str {
	"ok"
}

async fn stats(State(limiter): State<Arc<RateLimiter>>) -> Json<RateLimiterStats> {
	Json(limiter.stats())
}

async fn bans(State(limiter): State<Arc<RateLimiter>>) -> Json<Vec<BanEntry>> {
	Json(limiter.list_bans())
}

fn router(limiter: Arc<RateLimiter>, config: &ServerConfig) -> Router {
	let router = Router::new()
		.route("/", get(index))
		.route("/_fairgate/stats", get(stats))
		.route("/_fairgate/bans", get(bans))
		.with_state(limiter.clone());

	install(router, limiter, config.mode).layer(TraceLayer::new_for_http())
}

async fn run(config: ServerConfig) -> FgResult<()> {
	let mut builder = RateLimiter::builder().config(config.rate_limit.clone());
	if config.classify_devices {
		builder = builder.device_classifier(Arc::new(UaDeviceClassifier::new()?));
	}
	let limiter = Arc::new(builder.build()?);
	let sweeper = limiter.spawn_sweeper();

	let app = router(limiter, &config);
	let listener = tokio::net::TcpListener::bind(config.listen.as_ref()).await?;
	info!("Listening on {} ({:?} mode)", config.listen, config.mode);

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			info!("Shutting down");
		})
		.await?;

	sweeper.abort();
	Ok(())
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let result = match ServerConfig::load() {
		Ok(config) => run(config).await,
		Err(e) => Err(e),
	};
	if let Err(e) = result {
		error!("FATAL: {}", e);
		std::process::exit(1);
	}
}

// vim: ts=4
