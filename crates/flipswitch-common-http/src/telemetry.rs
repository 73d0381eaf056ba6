// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Telemetry headers sent with every SDK request.

use flipswitch_common_version::{BuildInfo, PLATFORM};

/// HTTP header names for SDK telemetry.
pub mod headers {
	pub const SDK: &str = "X-Flipswitch-SDK";
	pub const RUNTIME: &str = "X-Flipswitch-Runtime";
	pub const OS: &str = "X-Flipswitch-OS";
	pub const FEATURES: &str = "X-Flipswitch-Features";
}

/// Returns the telemetry headers as `(name, value)` pairs.
///
/// `realtime` is reported through the features header as `sse=true` or
/// `sse=false`.
pub fn telemetry_headers(realtime: bool) -> Vec<(String, String)> {
	let info = BuildInfo::current();
	vec![
		(headers::SDK.to_string(), info.sdk_tag()),
		(headers::RUNTIME.to_string(), info.runtime_tag()),
		(headers::OS.to_string(), PLATFORM.to_string()),
		(headers::FEATURES.to_string(), format!("sse={realtime}")),
	]
}
