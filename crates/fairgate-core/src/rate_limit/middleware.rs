//! Rate Limiting Middleware
//!
//! Tower middleware layers for applying the limiter to Axum routes.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Router;
use fairgate_types::capability::DeviceClassifier;
use futures::future::BoxFuture;
use hyper::Request;
use tower::{Layer, Service};

use super::error::{RejectAction, RejectPolicy, RejectReason};
use super::extractors::{client_address, user_agent, ClientAddrMode};
use super::limiter::{ClientRequest, RateLimiter, Verdict};
use crate::prelude::*;

/// Rate limit middleware layer
#[derive(Clone)]
pub struct RateLimitLayer {
	limiter: Arc<RateLimiter>,
	mode: ClientAddrMode,
}

impl RateLimitLayer {
	/// Create a new rate limit layer
	pub fn new(limiter: Arc<RateLimiter>, mode: ClientAddrMode) -> Self {
		Self { limiter, mode }
	}
}

impl<S> Layer<S> for RateLimitLayer {
	type Service = RateLimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RateLimitService { inner, limiter: self.limiter.clone(), mode: self.mode }
	}
}

/// Rate limit middleware service
#[derive(Clone)]
pub struct RateLimitService<S> {
	inner: S,
	limiter: Arc<RateLimiter>,
	mode: ClientAddrMode,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let limiter = self.limiter.clone();
		let mode = self.mode;
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let address = client_address(&req, mode);
			let verdict = limiter.evaluate(&ClientRequest {
				address: &address,
				user_agent: user_agent(&req),
				device: req.extensions().get::<DeviceInfo>(),
			});

			if let Verdict::Reject(reason) = verdict {
				if let Some(response) = reject(&limiter, &req, &reason) {
					return Ok(response);
				}
				limiter.record_override();
				debug!("Rejection handler let {} through", reason.key());
			}

			inner.call(req).await
		})
	}
}

/// Response for a rejected request, `None` if it may continue downstream
fn reject(limiter: &RateLimiter, req: &Request<Body>, reason: &RejectReason) -> Option<Response> {
	if let RejectPolicy::Handler(handler) = limiter.reject_policy() {
		match handler.on_reject(req, reason) {
			RejectAction::Respond(response) => return Some(response),
			RejectAction::Continue if matches!(reason, RejectReason::BudgetExceeded { .. }) => {
				return None;
			}
			RejectAction::Continue => {}
		}
	}
	Some(limiter.rejection(reason).into_response())
}

/// Attaches [`DeviceInfo`] to requests that do not carry one yet
#[derive(Clone)]
pub struct DeviceCaptureLayer {
	classifier: Arc<dyn DeviceClassifier>,
}

impl DeviceCaptureLayer {
	pub fn new(classifier: Arc<dyn DeviceClassifier>) -> Self {
		Self { classifier }
	}
}

impl<S> Layer<S> for DeviceCaptureLayer {
	type Service = DeviceCaptureService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		DeviceCaptureService { inner, classifier: self.classifier.clone() }
	}
}

#[derive(Clone)]
pub struct DeviceCaptureService<S> {
	inner: S,
	classifier: Arc<dyn DeviceClassifier>,
}

impl<S> Service<Request<Body>> for DeviceCaptureService<S>
where
	S: Service<Request<Body>>,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = S::Future;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<Body>) -> Self::Future {
		if req.extensions().get::<DeviceInfo>().is_none() {
			let device = self.classifier.classify(user_agent(&req));
			req.extensions_mut().insert(device);
		}
		self.inner.call(req)
	}
}

/// Put every route of `router` behind the limiter.
///
/// When the limiter has a device classifier, requests are classified once up
/// front so handlers see the same [`DeviceInfo`] the limiter used.
pub fn install<S>(router: Router<S>, limiter: Arc<RateLimiter>, mode: ClientAddrMode) -> Router<S>
where
	S: Clone + Send + Sync + 'static,
{
	let classifier = limiter.device_classifier();
	let router = router.layer(RateLimitLayer::new(limiter, mode));
	match classifier {
		Some(classifier) => router.layer(DeviceCaptureLayer::new(classifier)),
		None => router,
	}
}

// vim: ts=4
