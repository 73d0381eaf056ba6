// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Flipswitch SDK.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with a consistent User-Agent header
//! - The telemetry headers identifying the SDK, runtime, OS and enabled features

mod client;
mod telemetry;

pub use client::{builder, streaming_builder, user_agent};
pub use telemetry::{headers, telemetry_headers};
