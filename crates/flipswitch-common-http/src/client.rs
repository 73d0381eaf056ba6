// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use flipswitch_common_version::BuildInfo;
use reqwest::{Client, ClientBuilder};

/// Creates a new HTTP client builder with the standard Flipswitch User-Agent.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = flipswitch_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a client builder suited to long-lived server-push connections.
///
/// No overall request timeout is set: the response body of a stream is
/// expected to stay open indefinitely. Only connection establishment is
/// bounded by the caller's cancellation.
pub fn streaming_builder() -> ClientBuilder {
	builder().pool_max_idle_per_host(0)
}

/// Returns the standard Flipswitch User-Agent string.
///
/// Format: `flipswitch-rust/{version} ({platform})`
pub fn user_agent() -> String {
	let info = BuildInfo::current();
	format!("flipswitch-rust/{} ({})", info.version, info.platform)
}
