// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Real-time flag change synchronization for the Flipswitch Rust SDK.
//!
//! Keeps an application informed of server-side flag changes over a
//! long-lived SSE connection, and falls back to periodic polling while that
//! connection keeps failing.
//!
//! # Features
//!
//! - **SSE Streaming**: one background task per connection, with exponential
//!   backoff between reconnects
//! - **Listeners**: global and per-flag subscriptions with cancellation handles
//! - **Polling Fallback**: periodic bulk refresh after repeated SSE errors
//! - **Key Rotation Notices**: advisory side channel, never an invalidation
//!
//! # Example
//!
//! ```ignore
//! use flipswitch_sync::{refresh_fn, SyncConfig, SyncCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::new("fs_live_xxx")?;
//!
//!     let sync = SyncCoordinator::builder()
//!         .config(config)
//!         .refresh(refresh_fn(|| async { Ok(()) }))
//!         .build()?;
//!
//!     let _dark_mode = sync.subscribe_key("dark-mode", |event| {
//!         println!("dark-mode changed at {}", event.timestamp);
//!     });
//!
//!     sync.start();
//!     Ok(())
//! }
//! ```

mod backoff;
mod config;
mod coordinator;
mod error;
mod listeners;
mod polling;
mod rotation;
mod sse;

pub use backoff::{Backoff, DEFAULT_MAX_RETRY_DELAY, DEFAULT_MIN_RETRY_DELAY};
pub use config::{ApiKey, SyncConfig, SyncConfigLayer, DEFAULT_BASE_URL};
pub use coordinator::{SyncCoordinator, SyncCoordinatorBuilder};
pub use error::{Result, SyncError};
pub use listeners::{ChangeListener, ListenerId, ListenerRegistry, ListenerScope, Subscription};
pub use polling::{
	refresh_fn, PollingConfig, PollingFallbackController, RefreshFn, RefreshSource,
	DEFAULT_MAX_SSE_RETRIES, DEFAULT_POLLING_INTERVAL,
};
pub use rotation::{KeyRotationHook, NoOpKeyRotationHook, SharedKeyRotationHook};
pub use sse::{
	StatusListener, StreamingClient, StreamingClientBuilder, API_KEY_HEADER, EVENTS_PATH,
};

// Re-export core types for convenience
pub use flipswitch_sync_core::{
	ChangeEvent, ConnectionStatus, DecodeError, KeyRotationNotice, StreamEvent,
};
