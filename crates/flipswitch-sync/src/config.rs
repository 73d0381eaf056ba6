// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the sync layer.
//!
//! [`SyncConfigLayer`] holds optional values from one source (a TOML table,
//! the environment, code). Layers merge with later values winning, and
//! [`SyncConfigLayer::finalize`] fills defaults and validates.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::backoff::{DEFAULT_MAX_RETRY_DELAY, DEFAULT_MIN_RETRY_DELAY};
use crate::error::{Result, SyncError};
use crate::polling::{DEFAULT_MAX_SSE_RETRIES, DEFAULT_POLLING_INTERVAL};

pub const DEFAULT_BASE_URL: &str = "https://api.flipswitch.io";

const REDACTED: &str = "[REDACTED]";

/// The environment API key. Never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	/// The raw key, for placing in a request header.
	pub fn expose(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncConfigLayer {
	pub api_key: Option<String>,
	pub base_url: Option<String>,
	pub enable_realtime: Option<bool>,
	pub min_retry_delay_ms: Option<u64>,
	pub max_retry_delay_ms: Option<u64>,
	pub polling_interval_secs: Option<u64>,
	pub max_sse_retries: Option<u32>,
	pub polling_fallback: Option<bool>,
	pub telemetry: Option<bool>,
	pub extra_headers: Option<BTreeMap<String, String>>,
}

impl SyncConfigLayer {
	/// Reads a layer from `FLIPSWITCH_*` environment variables.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads a layer through an arbitrary variable lookup.
	///
	/// Values that fail to parse are left unset so a lower layer applies.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
		let flag = |name: &str| {
			lookup(name).map(|v| {
				let v = v.trim();
				v != "0" && !v.eq_ignore_ascii_case("false")
			})
		};

		Self {
			api_key: lookup("FLIPSWITCH_API_KEY"),
			base_url: lookup("FLIPSWITCH_BASE_URL"),
			enable_realtime: flag("FLIPSWITCH_REALTIME"),
			min_retry_delay_ms: number("FLIPSWITCH_MIN_RETRY_MS"),
			max_retry_delay_ms: number("FLIPSWITCH_MAX_RETRY_MS"),
			polling_interval_secs: number("FLIPSWITCH_POLLING_INTERVAL_SECS"),
			max_sse_retries: number("FLIPSWITCH_MAX_SSE_RETRIES").and_then(|n| u32::try_from(n).ok()),
			polling_fallback: flag("FLIPSWITCH_POLLING_FALLBACK"),
			telemetry: None,
			extra_headers: None,
		}
	}

	pub fn merge(&mut self, other: Self) {
		if other.api_key.is_some() {
			self.api_key = other.api_key;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.enable_realtime.is_some() {
			self.enable_realtime = other.enable_realtime;
		}
		if other.min_retry_delay_ms.is_some() {
			self.min_retry_delay_ms = other.min_retry_delay_ms;
		}
		if other.max_retry_delay_ms.is_some() {
			self.max_retry_delay_ms = other.max_retry_delay_ms;
		}
		if other.polling_interval_secs.is_some() {
			self.polling_interval_secs = other.polling_interval_secs;
		}
		if other.max_sse_retries.is_some() {
			self.max_sse_retries = other.max_sse_retries;
		}
		if other.polling_fallback.is_some() {
			self.polling_fallback = other.polling_fallback;
		}
		if other.telemetry.is_some() {
			self.telemetry = other.telemetry;
		}
		if other.extra_headers.is_some() {
			self.extra_headers = other.extra_headers;
		}
	}

	pub fn finalize(self) -> Result<SyncConfig> {
		let config = SyncConfig {
			api_key: ApiKey::new(self.api_key.unwrap_or_default()),
			base_url: self
				.base_url
				.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			enable_realtime: self.enable_realtime.unwrap_or(true),
			min_retry_delay: self
				.min_retry_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_MIN_RETRY_DELAY),
			max_retry_delay: self
				.max_retry_delay_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_MAX_RETRY_DELAY),
			polling_interval: self
				.polling_interval_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_POLLING_INTERVAL),
			max_sse_retries: self.max_sse_retries.unwrap_or(DEFAULT_MAX_SSE_RETRIES),
			polling_fallback: self.polling_fallback.unwrap_or(true),
			telemetry: self.telemetry.unwrap_or(true),
			extra_headers: self.extra_headers.unwrap_or_default(),
		};
		config.validated()
	}
}

/// Finalized sync configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
	pub api_key: ApiKey,
	/// Server base URL without a trailing slash.
	pub base_url: String,
	/// Open the streaming connection at start.
	pub enable_realtime: bool,
	pub min_retry_delay: Duration,
	pub max_retry_delay: Duration,
	/// Period of the fallback refresh loop.
	pub polling_interval: Duration,
	/// Consecutive streaming errors before polling starts.
	pub max_sse_retries: u32,
	pub polling_fallback: bool,
	/// Send the SDK telemetry headers on the stream request.
	pub telemetry: bool,
	/// Additional pass-through headers for the stream request.
	pub extra_headers: BTreeMap<String, String>,
}

impl SyncConfig {
	/// Configuration with defaults for everything but the key.
	pub fn new(api_key: impl Into<String>) -> Result<Self> {
		SyncConfigLayer {
			api_key: Some(api_key.into()),
			..Default::default()
		}
		.finalize()
	}

	/// Checks invariants and normalizes the base URL.
	pub fn validated(mut self) -> Result<Self> {
		if self.api_key.is_empty() {
			return Err(SyncError::MissingApiKey);
		}

		self.base_url = normalize_base_url(&self.base_url)?;

		if self.min_retry_delay.is_zero() {
			return Err(SyncError::Config("min_retry_delay must be positive".to_string()));
		}
		if self.min_retry_delay > self.max_retry_delay {
			return Err(SyncError::Config(
				"min_retry_delay must not exceed max_retry_delay".to_string(),
			));
		}
		if self.max_sse_retries == 0 {
			return Err(SyncError::Config("max_sse_retries must be at least 1".to_string()));
		}
		if self.polling_interval.is_zero() {
			return Err(SyncError::Config("polling_interval must be positive".to_string()));
		}

		Ok(self)
	}
}

/// Strips trailing slashes and checks for an http(s) URL.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
	let trimmed = raw.trim().trim_end_matches('/');
	let url = Url::parse(trimmed).map_err(|e| SyncError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(SyncError::InvalidBaseUrl(format!(
			"{trimmed}: scheme must be http or https"
		)));
	}
	Ok(trimmed.to_string())
}
