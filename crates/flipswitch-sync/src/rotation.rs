// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Side channel for API key rotation notices.
//!
//! When the server rotates the environment's API key it emits an
//! `api-key-rotated` frame carrying the instant the current key stops being
//! accepted. The notice is advisory: it never invalidates flags and never
//! reaches change listeners. The streaming client logs it and hands it to a
//! [`KeyRotationHook`] so the application can schedule a key swap.
//!
//! # Example
//!
//! ```ignore
//! use flipswitch_sync::{KeyRotationHook, KeyRotationNotice, SyncCoordinator};
//!
//! struct PageOnCall;
//!
//! impl KeyRotationHook for PageOnCall {
//!     fn on_api_key_rotated(&self, notice: &KeyRotationNotice) {
//!         eprintln!("rotate the Flipswitch key before {}", notice.valid_until);
//!     }
//! }
//!
//! let coordinator = SyncCoordinator::builder()
//!     .config(config)
//!     .refresh(refresh)
//!     .key_rotation_hook(PageOnCall)
//!     .build()?;
//! ```

use std::sync::Arc;

pub use flipswitch_sync_core::KeyRotationNotice;

/// Receives API key rotation notices.
///
/// Called inline on the streaming task, so implementations should return
/// quickly and move slow work elsewhere.
pub trait KeyRotationHook: Send + Sync + 'static {
	/// Called when the server announces that the current key will expire.
	fn on_api_key_rotated(&self, notice: &KeyRotationNotice);
}

/// Type alias for a shared key rotation hook.
pub type SharedKeyRotationHook = Arc<dyn KeyRotationHook>;

/// A hook that ignores rotation notices.
///
/// The streaming client still logs every notice at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpKeyRotationHook;

impl KeyRotationHook for NoOpKeyRotationHook {
	fn on_api_key_rotated(&self, _notice: &KeyRotationNotice) {}
}
