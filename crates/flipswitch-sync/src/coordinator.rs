// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Composition root wiring streaming, listeners and polling together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use flipswitch_sync_core::{ChangeEvent, ConnectionStatus};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::listeners::{ListenerRegistry, Subscription};
use crate::polling::{PollingConfig, PollingFallbackController, RefreshSource};
use crate::rotation::{KeyRotationHook, NoOpKeyRotationHook, SharedKeyRotationHook};
use crate::sse::StreamingClient;

/// Keeps subscribers informed of flag changes.
///
/// Streaming status feeds the polling controller; change events from either
/// source go through one [`ListenerRegistry`].
pub struct SyncCoordinator {
	config: SyncConfig,
	registry: ListenerRegistry,
	polling: Arc<PollingFallbackController>,
	rotation_hook: SharedKeyRotationHook,
	streaming: Mutex<Option<StreamingClient>>,
	shut_down: AtomicBool,
}

impl SyncCoordinator {
	pub fn builder() -> SyncCoordinatorBuilder {
		SyncCoordinatorBuilder::default()
	}

	/// Opens the streaming connection when realtime is enabled.
	///
	/// Idempotent. Must run inside a Tokio runtime.
	pub fn start(&self) {
		if self.is_shut_down() {
			return;
		}
		match self.lock_streaming().as_ref() {
			Some(client) => client.connect(),
			None => debug!("Realtime disabled, not opening SSE connection"),
		}
	}

	/// Subscribes to every flag change.
	pub fn subscribe_global<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		self.registry.subscribe_global(callback)
	}

	/// Subscribes to one flag's changes and to bulk invalidations.
	pub fn subscribe_key<F>(&self, flag_key: impl Into<String>, callback: F) -> Subscription
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		self.registry.subscribe_key(flag_key, callback)
	}

	/// Does nothing. Cancel the [`Subscription`] instead.
	#[deprecated(note = "does nothing; cancel the Subscription returned by subscribe_* instead")]
	pub fn remove_flag_change_listener<F>(&self, callback: F)
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		#[allow(deprecated)]
		self.registry.remove_listener(callback);
	}

	/// Streaming status, or `Disconnected` when realtime is off or after
	/// shutdown.
	pub fn status(&self) -> ConnectionStatus {
		if self.is_shut_down() {
			return ConnectionStatus::Disconnected;
		}
		self.lock_streaming()
			.as_ref()
			.map(StreamingClient::status)
			.unwrap_or(ConnectionStatus::Disconnected)
	}

	pub fn is_polling_active(&self) -> bool {
		self.polling.is_active()
	}

	/// Handles a streaming status transition.
	///
	/// This is what the streaming client reports to.
	pub fn handle_status(&self, status: ConnectionStatus) {
		forward_status(&self.polling, status);
	}

	/// Replaces the streaming client with a fresh, connected one.
	///
	/// No-op when realtime is disabled or after shutdown.
	pub fn reconnect(&self) -> Result<()> {
		if self.is_shut_down() || !self.config.enable_realtime {
			return Ok(());
		}

		let previous = self.lock_streaming().take();
		if let Some(previous) = previous {
			previous.close();
		}

		let fresh = new_streaming_client(
			&self.config,
			&self.registry,
			&self.polling,
			&self.rotation_hook,
		)?;
		info!("Reconnecting SSE");
		fresh.connect();
		*self.lock_streaming() = Some(fresh);
		Ok(())
	}

	/// Closes streaming and stops polling. Idempotent.
	pub fn shutdown(&self) {
		if self.shut_down.swap(true, Ordering::SeqCst) {
			return;
		}

		let client = self.lock_streaming().take();
		if let Some(client) = client {
			client.close();
		}
		self.polling.shutdown();
		info!("Flag sync shut down");
	}

	pub fn registry(&self) -> &ListenerRegistry {
		&self.registry
	}

	pub fn config(&self) -> &SyncConfig {
		&self.config
	}

	fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}

	fn lock_streaming(&self) -> MutexGuard<'_, Option<StreamingClient>> {
		self.streaming
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl std::fmt::Debug for SyncCoordinator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncCoordinator")
			.field("config", &self.config)
			.field("status", &self.status())
			.field("polling", &self.polling)
			.field("listeners", &self.registry.len())
			.finish()
	}
}

impl Drop for SyncCoordinator {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn forward_status(polling: &PollingFallbackController, status: ConnectionStatus) {
	match status {
		ConnectionStatus::Error => {
			warn!("SSE connection error, provider is stale");
		}
		ConnectionStatus::Connected => {
			if polling.consecutive_failures() > 0 || polling.is_active() {
				info!("SSE connection restored");
			} else {
				debug!("SSE connected");
			}
		}
		ConnectionStatus::Connecting | ConnectionStatus::Disconnected => {
			debug!(status = %status, "SSE status changed");
		}
	}
	polling.on_status(status);
}

fn new_streaming_client(
	config: &SyncConfig,
	registry: &ListenerRegistry,
	polling: &Arc<PollingFallbackController>,
	rotation_hook: &SharedKeyRotationHook,
) -> Result<StreamingClient> {
	let registry = registry.clone();
	let polling = Arc::clone(polling);
	StreamingClient::builder()
		.config(config)
		.on_change(move |event| registry.dispatch(event))
		.on_status(move |status| forward_status(&polling, status))
		.shared_key_rotation_hook(Arc::clone(rotation_hook))
		.build()
}

/// Builder for [`SyncCoordinator`].
#[derive(Default)]
pub struct SyncCoordinatorBuilder {
	config: Option<SyncConfig>,
	refresh: Option<Arc<dyn RefreshSource>>,
	rotation_hook: Option<SharedKeyRotationHook>,
}

impl SyncCoordinatorBuilder {
	pub fn config(mut self, config: SyncConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Sets the bulk refresh used by the polling fallback.
	pub fn refresh<R: RefreshSource>(mut self, source: R) -> Self {
		self.refresh = Some(Arc::new(source));
		self
	}

	pub fn shared_refresh(mut self, source: Arc<dyn RefreshSource>) -> Self {
		self.refresh = Some(source);
		self
	}

	pub fn key_rotation_hook<H: KeyRotationHook>(mut self, hook: H) -> Self {
		self.rotation_hook = Some(Arc::new(hook));
		self
	}

	pub fn build(self) -> Result<SyncCoordinator> {
		let config = self
			.config
			.ok_or_else(|| SyncError::Config("a SyncConfig is required".to_string()))?
			.validated()?;
		let refresh = self
			.refresh
			.ok_or_else(|| SyncError::Config("a refresh source is required".to_string()))?;
		let rotation_hook = self
			.rotation_hook
			.unwrap_or_else(|| Arc::new(NoOpKeyRotationHook));

		let registry = ListenerRegistry::new();
		let polling = Arc::new(PollingFallbackController::new(
			PollingConfig::from(&config),
			refresh,
			registry.clone(),
		));

		let streaming = if config.enable_realtime {
			Some(new_streaming_client(
				&config,
				&registry,
				&polling,
				&rotation_hook,
			)?)
		} else {
			None
		};

		Ok(SyncCoordinator {
			config,
			registry,
			polling,
			rotation_hook,
			streaming: Mutex::new(streaming),
			shut_down: AtomicBool::new(false),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::polling::refresh_fn;

	fn config(realtime: bool) -> SyncConfig {
		let mut config = SyncConfig::new("test-key").unwrap();
		config.base_url = "http://127.0.0.1:9".to_string();
		config.enable_realtime = realtime;
		config.max_sse_retries = 2;
		config
	}

	fn coordinator(realtime: bool) -> SyncCoordinator {
		SyncCoordinator::builder()
			.config(config(realtime))
			.refresh(refresh_fn(|| async { Ok(()) }))
			.build()
			.unwrap()
	}

	#[test]
	fn test_build_requires_config_and_refresh() {
		let result = SyncCoordinator::builder()
			.refresh(refresh_fn(|| async { Ok(()) }))
			.build();
		assert!(matches!(result, Err(SyncError::Config(_))));

		let result = SyncCoordinator::builder().config(config(false)).build();
		assert!(matches!(result, Err(SyncError::Config(_))));
	}

	#[test]
	fn test_build_validates_config() {
		let mut bad = config(false);
		bad.max_sse_retries = 0;
		let result = SyncCoordinator::builder()
			.config(bad)
			.refresh(refresh_fn(|| async { Ok(()) }))
			.build();
		assert!(matches!(result, Err(SyncError::Config(_))));
	}

	#[test]
	fn test_status_is_disconnected_without_realtime() {
		let coordinator = coordinator(false);
		coordinator.start();
		assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
		assert!(coordinator.reconnect().is_ok());
		assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
	}

	#[tokio::test]
	async fn test_handle_status_drives_polling() {
		let coordinator = coordinator(false);

		coordinator.handle_status(ConnectionStatus::Error);
		assert!(!coordinator.is_polling_active());
		coordinator.handle_status(ConnectionStatus::Error);
		assert!(coordinator.is_polling_active());

		coordinator.handle_status(ConnectionStatus::Connected);
		assert!(!coordinator.is_polling_active());
	}

	#[tokio::test]
	async fn test_subscriptions_go_through_registry() {
		let coordinator = coordinator(false);
		let global = coordinator.subscribe_global(|_| {});
		let _keyed = coordinator.subscribe_key("dark-mode", |_| {});
		assert_eq!(coordinator.registry().len(), 2);

		global.cancel();
		assert_eq!(coordinator.registry().len(), 1);

		#[allow(deprecated)]
		coordinator.remove_flag_change_listener(|_: &ChangeEvent| {});
		assert_eq!(coordinator.registry().len(), 1);
	}

	#[tokio::test]
	async fn test_shutdown_is_idempotent_and_final() {
		let coordinator = coordinator(true);
		coordinator.start();

		coordinator.shutdown();
		coordinator.shutdown();
		assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);

		coordinator.handle_status(ConnectionStatus::Error);
		coordinator.handle_status(ConnectionStatus::Error);
		assert!(!coordinator.is_polling_active());

		assert!(coordinator.reconnect().is_ok());
		assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
	}
}
