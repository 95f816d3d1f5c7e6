use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use rs_tunnel_mux_core::{Block, StreamId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Connection, Manager};

struct Entry {
	connection: Arc<dyn Connection>,
	/// Cancelled once the entry leaves the registry, releasing a recv relay blocked on its queue.
	removed: CancellationToken,
}

impl Entry {
	fn unregister(self, manager: &dyn Manager) -> Arc<dyn Connection> {
		self.removed.cancel();
		self.connection.cancel_daemon();
		manager.on_connection_removed(self.connection.id());
		self.connection
	}
}

/// Where the recv relay delivers the blocks of one registered stream.
pub(crate) struct Route {
	pub(crate) recv_queue: mpsc::Sender<Block>,
	pub(crate) removed: CancellationToken,
}

/// Streams currently addressable through the multiplexer, keyed by identifier.
///
/// Every access goes through the lock, which is never held across an await point.
/// Manager hooks run under the lock, so they observe registrations in the same
/// order as the registry and must not call back into the multiplexer.
pub(crate) struct Registry {
	connections: Mutex<HashMap<StreamId, Entry>>,
	manager: Arc<dyn Manager>,
}

impl Registry {
	pub(crate) fn new(manager: Arc<dyn Manager>) -> Self {
		Self {
			connections: Mutex::default(),
			manager,
		}
	}

	pub(crate) fn manager(&self) -> &Arc<dyn Manager> {
		&self.manager
	}

	/// Registers `connection`, unregistering and returning the stream previously held under the same identifier.
	pub(crate) fn insert(&self, connection: Arc<dyn Connection>) -> Option<Arc<dyn Connection>> {
		let stream_id = connection.id();
		let entry = Entry {
			connection: connection.clone(),
			removed: CancellationToken::new(),
		};

		let mut connections = self.connections.lock();
		let replaced = connections
			.insert(stream_id, entry)
			.map(|replaced| replaced.unregister(&*self.manager));
		self.manager.on_connection_added(stream_id, connection.origin());
		replaced
	}

	/// Unregisters `connection` if it is the stream registered under its identifier.
	///
	/// A stale handle whose identifier was since reused leaves the newer stream in place.
	pub(crate) fn remove(&self, connection: &dyn Connection) -> Option<Arc<dyn Connection>> {
		let stream_id = connection.id();
		let mut connections = self.connections.lock();

		let registered = connections.get(&stream_id)?;
		if !std::ptr::addr_eq(Arc::as_ptr(&registered.connection), connection) {
			return None;
		}
		connections
			.remove(&stream_id)
			.map(|entry| entry.unregister(&*self.manager))
	}

	pub(crate) fn route(&self, stream_id: StreamId) -> Option<Route> {
		self.connections.lock().get(&stream_id).map(|entry| Route {
			recv_queue: entry.connection.recv_queue(),
			removed: entry.removed.clone(),
		})
	}

	pub(crate) fn contains(&self, stream_id: StreamId) -> bool {
		self.connections.lock().contains_key(&stream_id)
	}

	pub(crate) fn len(&self) -> usize {
		self.connections.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::NoopManager;
	use futures::{FutureExt, future::BoxFuture};

	struct Idle {
		id: StreamId,
		recv_tx: mpsc::Sender<Block>,
		cancel: CancellationToken,
	}

	impl Idle {
		fn new(id: u32) -> Arc<Self> {
			let (recv_tx, _) = mpsc::channel(1);
			Arc::new(Self {
				id: StreamId::new(id),
				recv_tx,
				cancel: CancellationToken::new(),
			})
		}
	}

	impl Connection for Idle {
		fn id(&self) -> StreamId {
			self.id
		}

		fn recv_queue(&self) -> mpsc::Sender<Block> {
			self.recv_tx.clone()
		}

		fn daemon(self: Arc<Self>) -> BoxFuture<'static, ()> {
			async move { self.cancel.cancelled().await }.boxed()
		}

		fn cancel_daemon(&self) {
			self.cancel.cancel();
		}
	}

	#[test]
	fn test_stale_handle_does_not_remove_newer_stream() {
		let registry = Registry::new(Arc::new(NoopManager));
		let first = Idle::new(3);
		let second = Idle::new(3);

		assert!(registry.insert(first.clone()).is_none());
		let first_route = registry.route(StreamId::new(3)).unwrap();
		assert!(registry.insert(second.clone()).is_some());
		assert!(first_route.removed.is_cancelled());
		assert!(first.cancel.is_cancelled());

		assert!(registry.remove(&*first).is_none());
		assert!(registry.contains(StreamId::new(3)));
		assert!(!second.cancel.is_cancelled());

		let second_route = registry.route(StreamId::new(3)).unwrap();
		assert!(registry.remove(&*second).is_some());
		assert!(second_route.removed.is_cancelled());
		assert_eq!(registry.len(), 0);
	}
}
