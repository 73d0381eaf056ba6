// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Flipswitch real-time flag synchronization.
//!
//! This crate holds the pieces that carry no I/O:
//!
//! - [`ConnectionStatus`]: the state of the streaming connection
//! - [`ChangeEvent`]: a flag change (or bulk invalidation) delivered to listeners
//! - [`sse`]: the payloads carried by the server-push stream and the
//!   decoder that turns a `(event type, data)` frame into a [`StreamEvent`]

pub mod error;
pub mod event;
pub mod sse;
pub mod status;

pub use error::DecodeError;
pub use event::ChangeEvent;
pub use sse::{
	ApiKeyRotatedData, ConfigUpdatedData, FlagUpdatedData, KeyRotationNotice, StreamEvent,
};
pub use status::ConnectionStatus;
