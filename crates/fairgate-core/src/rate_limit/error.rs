//! Rejection Types
//!
//! Why a request was rejected, how the host can take over the response, and
//! the default HTML rejection body.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use hyper::Request;

use super::config::ErrorResponse;
use crate::prelude::*;

/// Why the limiter refused a request
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
	/// The fingerprint is serving a ban
	Banned { key: Box<str>, until: Timestamp },
	/// This request pushed the fingerprint over its budget and started a ban
	BudgetExceeded { key: Box<str>, total: f64, until: Timestamp },
}

impl RejectReason {
	pub fn key(&self) -> &str {
		match self {
			RejectReason::Banned { key, .. } | RejectReason::BudgetExceeded { key, .. } => key,
		}
	}

	/// When the ban ends
	pub fn until(&self) -> Timestamp {
		match self {
			RejectReason::Banned { until, .. } | RejectReason::BudgetExceeded { until, .. } => *until,
		}
	}
}

impl std::fmt::Display for RejectReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RejectReason::Banned { key, until } => {
				write!(f, "{} is banned until {}", key, until)
			}
			RejectReason::BudgetExceeded { key, total, until } => {
				write!(f, "{} exceeded its budget ({}), banned until {}", key, total, until)
			}
		}
	}
}

/// What a custom handler wants done with a rejected request
pub enum RejectAction {
	/// Send this response and stop
	Respond(Response),
	/// Forward the request downstream anyway. Only honoured for
	/// [`RejectReason::BudgetExceeded`]; a banned request gets the default
	/// rejection instead.
	Continue,
}

/// Host supplied rejection behaviour
pub trait RejectHandler: Send + Sync {
	fn on_reject(&self, req: &Request<Body>, reason: &RejectReason) -> RejectAction;
}

impl<F> RejectHandler for F
where
	F: Fn(&Request<Body>, &RejectReason) -> RejectAction + Send + Sync,
{
	fn on_reject(&self, req: &Request<Body>, reason: &RejectReason) -> RejectAction {
		self(req, reason)
	}
}

/// How rejections are turned into responses
#[derive(Clone, Default)]
pub enum RejectPolicy {
	/// 429 with the default body
	#[default]
	Default,
	/// Fixed status and message
	Custom(ErrorResponse),
	Handler(Arc<dyn RejectHandler>),
}

impl std::fmt::Debug for RejectPolicy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RejectPolicy::Default => write!(f, "Default"),
			RejectPolicy::Custom(resp) => write!(f, "Custom({:?})", resp),
			RejectPolicy::Handler(_) => write!(f, "Handler"),
		}
	}
}

/// A synthesized rejection response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
	pub status: StatusCode,
	pub message: Box<str>,
	pub retry_after: Option<Duration>,
}

impl Rejection {
	pub fn new(response: &ErrorResponse, retry_after: Option<Duration>) -> Self {
		Self { status: response.status, message: response.message.clone(), retry_after }
	}

	pub fn body(&self) -> String {
		format!("<h1>Error {}</h1><h2>{}</h2>", self.status.as_u16(), self.message)
	}
}

impl Default for Rejection {
	fn default() -> Self {
		Self::new(&ErrorResponse::default(), None)
	}
}

impl IntoResponse for Rejection {
	fn into_response(self) -> Response {
		let mut response = (self.status, Html(self.body())).into_response();

		if let Some(retry_after) = self.retry_after {
			// Round up so clients never retry before the ban ends
			let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
			response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_body() {
		let rejection = Rejection::default();
		assert_eq!(rejection.status, StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(rejection.body(), "<h1>Error 429</h1><h2>Too Many Requests</h2>");
	}

	#[test]
	fn test_custom_body() {
		let custom =
			ErrorResponse { status: StatusCode::SERVICE_UNAVAILABLE, message: "Slow down".into() };
		assert_eq!(Rejection::new(&custom, None).body(), "<h1>Error 503</h1><h2>Slow down</h2>");
	}

	#[test]
	fn test_into_response_headers() {
		let rejection = Rejection { retry_after: Some(Duration::from_millis(1500)), ..Rejection::default() };
		let response = rejection.into_response();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers()[header::RETRY_AFTER], "2");
		assert!(
			response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html")
		);
	}

	#[test]
	fn test_reason_accessors() {
		let reason = RejectReason::Banned { key: "10.0.0:linux".into(), until: Timestamp(42) };
		assert_eq!(reason.key(), "10.0.0:linux");
		assert_eq!(reason.until(), Timestamp(42));
		assert!(reason.to_string().starts_with("10.0.0:linux is banned until"));
	}
}

// vim: ts=4
