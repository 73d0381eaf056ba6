// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build and version information for the Flipswitch SDK.
//!
//! The values here are compile-time constants and feed the telemetry headers
//! the SDK attaches to its requests.

shadow_rs::shadow!(build);

/// Platform string in `{os}/{arch}` format, e.g. "linux/x86_64".
pub const PLATFORM: &str = env!("FLIPSWITCH_PLATFORM");

/// SDK language tag used as the prefix of the SDK and runtime headers.
pub const SDK_LANGUAGE: &str = "rust";

/// Build information for the running SDK.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
	pub version: &'static str,
	pub rustc_version: &'static str,
	pub platform: &'static str,
}

impl BuildInfo {
	pub fn current() -> Self {
		Self {
			version: build::PKG_VERSION,
			rustc_version: rustc_semver(build::RUST_VERSION),
			platform: PLATFORM,
		}
	}

	/// `rust/{sdk version}`
	pub fn sdk_tag(&self) -> String {
		format!("{SDK_LANGUAGE}/{}", self.version)
	}

	/// `rust/{rustc version}`
	pub fn runtime_tag(&self) -> String {
		format!("{SDK_LANGUAGE}/{}", self.rustc_version)
	}
}

// "rustc 1.82.0 (f6e511eec 2024-10-15)" -> "1.82.0"
fn rustc_semver(raw: &'static str) -> &'static str {
	let mut parts = raw.split_whitespace();
	match (parts.next(), parts.next()) {
		(Some("rustc"), Some(version)) => version,
		_ if raw.is_empty() => "unknown",
		_ => raw,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn build_info_has_version() {
		let info = BuildInfo::current();
		assert!(!info.version.is_empty());
		assert!(!info.rustc_version.is_empty());
	}

	#[test]
	fn platform_format_is_valid() {
		let parts: Vec<&str> = PLATFORM.split('/').collect();
		assert_eq!(parts.len(), 2);
		assert!(parts.iter().all(|p| !p.is_empty()));
	}

	#[test]
	fn tags_carry_language_prefix() {
		let info = BuildInfo::current();
		assert!(info.sdk_tag().starts_with("rust/"));
		assert!(info.runtime_tag().starts_with("rust/"));
	}

	#[test]
	fn rustc_semver_extracts_version() {
		assert_eq!(rustc_semver("rustc 1.82.0 (f6e511eec 2024-10-15)"), "1.82.0");
		assert_eq!(rustc_semver("1.82.0"), "1.82.0");
		assert_eq!(rustc_semver(""), "unknown");
	}
}
