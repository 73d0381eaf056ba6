// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out of change events to global and per-flag subscribers.
//!
//! Each subscription returns a [`Subscription`] handle that revokes exactly
//! that registration. Dispatch snapshots the matching callbacks before
//! invoking them, so a listener may subscribe or cancel from inside its own
//! callback. A panicking listener is logged and skipped; the rest still run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use flipswitch_sync_core::ChangeEvent;
use tracing::{debug, error};

/// Callback invoked for each matching change event.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Opaque identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Which events a registration receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerScope {
	/// Every event.
	Global,
	/// Events for this flag key, plus bulk invalidations.
	Key(String),
}

impl ListenerScope {
	fn matches(&self, event: &ChangeEvent) -> bool {
		match self {
			ListenerScope::Global => true,
			ListenerScope::Key(key) => event.is_bulk_invalidation() || *key == event.flag_key,
		}
	}
}

struct Registration {
	id: ListenerId,
	scope: ListenerScope,
	callback: ChangeListener,
}

#[derive(Default)]
struct RegistryInner {
	next_id: u64,
	registrations: Vec<Registration>,
}

impl RegistryInner {
	fn remove(&mut self, id: ListenerId) -> bool {
		let before = self.registrations.len();
		self.registrations.retain(|r| r.id != id);
		self.registrations.len() != before
	}
}

/// Registry of change listeners.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
	inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Subscribes to every change event.
	pub fn subscribe_global<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		self.subscribe(ListenerScope::Global, Arc::new(callback))
	}

	/// Subscribes to changes of a single flag.
	///
	/// Bulk invalidations are delivered too, since they mean every flag may
	/// have changed.
	pub fn subscribe_key<F>(&self, flag_key: impl Into<String>, callback: F) -> Subscription
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		self.subscribe(ListenerScope::Key(flag_key.into()), Arc::new(callback))
	}

	/// Registers an already-shared callback under the given scope.
	pub fn subscribe(&self, scope: ListenerScope, callback: ChangeListener) -> Subscription {
		let mut inner = self.lock();
		inner.next_id += 1;
		let id = ListenerId(inner.next_id);
		debug!(listener_id = id.0, scope = ?scope, "Listener registered");
		inner.registrations.push(Registration {
			id,
			scope,
			callback,
		});

		Subscription {
			id,
			registry: Arc::downgrade(&self.inner),
		}
	}

	/// Removes a registration by id. Returns false if it was already gone.
	pub fn unsubscribe(&self, id: ListenerId) -> bool {
		self.lock().remove(id)
	}

	/// Legacy removal by callback value.
	///
	/// Two closures never compare equal, so this cannot identify a
	/// registration and does nothing. Use the [`Subscription`] returned at
	/// subscribe time instead.
	#[deprecated(note = "does nothing; cancel the Subscription returned by subscribe_* instead")]
	pub fn remove_listener<F>(&self, _callback: F)
	where
		F: Fn(&ChangeEvent) + Send + Sync + 'static,
	{
		debug!("remove_listener is a no-op; use Subscription::cancel");
	}

	/// Delivers an event to every matching listener, in registration order.
	///
	/// A non-empty `flag_key` reaches global listeners and listeners for that
	/// key. An empty `flag_key` reaches every listener.
	pub fn dispatch(&self, event: &ChangeEvent) {
		let targets: Vec<(ListenerId, ChangeListener)> = self
			.lock()
			.registrations
			.iter()
			.filter(|r| r.scope.matches(event))
			.map(|r| (r.id, Arc::clone(&r.callback)))
			.collect();

		debug!(
			flag_key = %event.flag_key,
			listeners = targets.len(),
			"Dispatching change event"
		);

		for (id, callback) in targets {
			if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
				error!(
					listener_id = id.0,
					flag_key = %event.flag_key,
					panic = %panic_message(payload.as_ref()),
					"Error in flag change listener"
				);
			}
		}
	}

	/// Number of active registrations.
	pub fn len(&self) -> usize {
		self.lock().registrations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, RegistryInner> {
		lock_registry(&self.inner)
	}
}

impl std::fmt::Debug for ListenerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListenerRegistry")
			.field("listeners", &self.len())
			.finish()
	}
}

/// Cancellation handle for one registration.
///
/// Dropping the handle leaves the registration in place; call
/// [`Subscription::cancel`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
	id: ListenerId,
	registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
	pub fn id(&self) -> ListenerId {
		self.id
	}

	/// Removes this registration. Calling it again is a no-op.
	pub fn cancel(&self) {
		if let Some(inner) = self.registry.upgrade() {
			if lock_registry(&inner).remove(self.id) {
				debug!(listener_id = self.id.0, "Listener cancelled");
			}
		}
	}
}

// Listener callbacks never run under this lock, so a poisoned guard only
// means a panic inside the registry's own bookkeeping.
fn lock_registry(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
	inner.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}
