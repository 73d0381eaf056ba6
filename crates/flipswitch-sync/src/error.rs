// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sync layer.
//!
//! Only construction and configuration surface these to callers. At runtime
//! every failure is absorbed into a status transition, a dropped frame or a
//! log line.

use flipswitch_sync_core::DecodeError;
use thiserror::Error;

/// Result type alias for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in the sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
	/// API key is missing or empty.
	#[error("Invalid or missing API key")]
	MissingApiKey,

	/// Base URL is missing or not an http(s) URL.
	#[error("Invalid base URL: {0}")]
	InvalidBaseUrl(String),

	/// A pass-through header has an invalid name or value.
	#[error("Invalid header: {name}")]
	InvalidHeader {
		/// The offending header name.
		name: String,
	},

	/// Failed to build the HTTP client.
	#[error("Failed to build HTTP client: {0}")]
	ClientBuild(#[source] reqwest::Error),

	/// Failed to reach the server.
	#[error("Failed to connect to server: {0}")]
	ConnectionFailed(#[source] reqwest::Error),

	/// The stream endpoint answered with a non-success status.
	#[error("SSE connection failed with status: {status}")]
	Handshake {
		/// HTTP status code.
		status: u16,
		/// Response body, if any.
		message: String,
	},

	/// The stream broke while reading.
	#[error("SSE stream error: {0}")]
	Stream(String),

	/// A frame payload could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// The bulk refresh collaborator failed.
	#[error("Flag refresh failed: {0}")]
	Refresh(String),

	/// A background task was requested outside a Tokio runtime.
	#[error("No Tokio runtime available to spawn background work")]
	NoRuntime,

	/// Configuration values are inconsistent.
	#[error("Invalid configuration: {0}")]
	Config(String),
}

impl SyncError {
	/// Returns true if this error is a transient connection-level failure.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			SyncError::ConnectionFailed(_)
				| SyncError::Stream(_)
				| SyncError::Handshake {
					status: 408 | 429 | 500..=599,
					..
				}
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retryable_errors() {
		assert!(SyncError::Stream("reset".to_string()).is_retryable());
		assert!(SyncError::Handshake {
			status: 503,
			message: String::new(),
		}
		.is_retryable());
		assert!(SyncError::Handshake {
			status: 429,
			message: String::new(),
		}
		.is_retryable());
		assert!(!SyncError::Handshake {
			status: 401,
			message: String::new(),
		}
		.is_retryable());
		assert!(!SyncError::MissingApiKey.is_retryable());
		assert!(!SyncError::Refresh("boom".to_string()).is_retryable());
	}

	#[test]
	fn test_decode_error_converts_transparently() {
		let decode =
			flipswitch_sync_core::StreamEvent::decode("flag-updated", "{broken").unwrap_err();
		let message = decode.to_string();
		let err = SyncError::from(decode);
		assert!(matches!(err, SyncError::Decode(_)));
		assert_eq!(err.to_string(), message);
		assert!(!err.is_retryable());
	}

	#[test]
	fn test_handshake_message_includes_status() {
		let err = SyncError::Handshake {
			status: 502,
			message: "bad gateway".to_string(),
		};
		assert_eq!(err.to_string(), "SSE connection failed with status: 502");
	}
}
