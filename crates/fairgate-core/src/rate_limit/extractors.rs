//! Client Extractors
//!
//! Pulls the client address and user agent out of a request. Behind a reverse
//! proxy the forwarding headers are consulted before the peer address.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::header;
use hyper::Request;
use serde::{Deserialize, Serialize};

use crate::sanitize::clean_str;

/// Address used when the client address is missing or cannot be cleaned
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Where the client address comes from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAddrMode {
	/// Peer address of the connection
	#[default]
	Standalone,
	/// Forwarding headers first, then the peer address
	Proxy,
}

/// Extract client IP from request based on mode
pub fn extract_client_ip<B>(req: &Request<B>, mode: ClientAddrMode) -> Option<IpAddr> {
	let peer = || req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());
	match mode {
		ClientAddrMode::Standalone => peer(),
		ClientAddrMode::Proxy => extract_from_xff(req)
			.or_else(|| extract_from_x_real_ip(req))
			.or_else(|| extract_from_forwarded(req))
			.or_else(peer),
	}
}

/// Cleaned client address string used for fingerprinting
pub fn client_address<B>(req: &Request<B>, mode: ClientAddrMode) -> Box<str> {
	extract_client_ip(req, mode)
		// IPv4-mapped IPv6 peers are accounted as plain IPv4
		.map(|ip| ip.to_canonical().to_string())
		.and_then(|addr| clean_str(&addr, false))
		.filter(|addr| !addr.is_empty())
		.map_or_else(|| UNKNOWN_ADDRESS.into(), Into::into)
}

/// User-Agent header, empty if missing or not valid text
pub fn user_agent<B>(req: &Request<B>) -> &str {
	req.headers().get(header::USER_AGENT).and_then(|h| h.to_str().ok()).unwrap_or_default()
}

/// Extract IP from X-Forwarded-For header
fn extract_from_xff<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| {
			// Leftmost entry is the original client
			s.split(',').next().map(str::trim).and_then(|ip| ip.parse().ok())
		})
}

/// Extract IP from X-Real-IP header
fn extract_from_x_real_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.trim().parse().ok())
}

/// Extract IP from Forwarded header (RFC 7239)
fn extract_from_forwarded<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers().get("forwarded").and_then(|h| h.to_str().ok()).and_then(|s| {
		// "for=192.0.2.60;proto=http" or "for=\"[2001:db8::1]\""
		s.split(';').find_map(|part| {
			let part = part.trim();
			let value = part.get(..4).filter(|p| p.eq_ignore_ascii_case("for=")).map(|_| &part[4..])?;
			let cleaned = value.trim_matches('"').trim_matches('[').trim_matches(']');
			cleaned.parse().ok()
		})
	})
}


// vim: ts=4
