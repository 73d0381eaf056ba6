// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

fn target_cfg(key: &str) -> String {
	std::env::var(key).unwrap_or_else(|_| "unknown".to_string())
}

fn main() -> shadow_rs::SdResult<()> {
	let platform = format!(
		"{}/{}",
		target_cfg("CARGO_CFG_TARGET_OS"),
		target_cfg("CARGO_CFG_TARGET_ARCH")
	);
	println!("cargo:rustc-env=FLIPSWITCH_PLATFORM={platform}");
	shadow_rs::new()
}
