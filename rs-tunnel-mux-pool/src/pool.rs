use std::{io, sync::Arc};

use parking_lot::Mutex;
use rs_tunnel_mux_core::{Block, StreamId, tunnel::TunnelPool};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::{
	Config, Connection, IoConnection, Manager,
	error::{BuilderError, Error},
	registry::Registry,
	relay,
};

struct Relays {
	send: JoinHandle<()>,
	recv: JoinHandle<()>,
}

/// Multiplexes registered streams over a tunnel pool.
///
/// Owns the stream registry, the queue shared by every stream for outgoing blocks,
/// and the two relay tasks moving blocks between them and the tunnel pool. The
/// relays run until [`ConnectionPool::shutdown`] is called or the pool is dropped.
pub struct ConnectionPool {
	registry: Arc<Registry>,
	send_queue: mpsc::Sender<Block>,
	config: Config,
	shutdown: CancellationToken,
	relays: Mutex<Option<Relays>>,
}

impl ConnectionPool {
	/// Takes the tunnel pool's feeds and spawns both relays on the current Tokio runtime.
	pub fn new<P>(manager: Arc<dyn Manager>, tunnel_pool: &mut P, config: Config) -> Result<Self, BuilderError>
	where
		P: TunnelPool + ?Sized,
	{
		let tunnel_recv = tunnel_pool.take_recv_queue().ok_or(BuilderError::RecvQueueTaken)?;
		let tunnel_send = tunnel_pool.send_queue();

		let (send_queue, send_queue_rx) = mpsc::channel(config.send_queue_size);
		let registry = Arc::new(Registry::new(manager));
		let shutdown = CancellationToken::new();

		let span = tracing::debug_span!(parent: tracing::Span::none(), "send_relay");
		span.follows_from(tracing::Span::current());
		let send = tokio::spawn(relay::send_relay(send_queue_rx, tunnel_send, shutdown.clone()).instrument(span));

		let span = tracing::debug_span!(parent: tracing::Span::none(), "recv_relay");
		span.follows_from(tracing::Span::current());
		let recv = tokio::spawn(relay::recv_relay(tunnel_recv, registry.clone(), shutdown.clone()).instrument(span));

		Ok(Self {
			registry,
			send_queue,
			config,
			shutdown,
			relays: Mutex::new(Some(Relays { send, recv })),
		})
	}

	/// Creates and registers a locally accepted stream.
	#[tracing::instrument(level = "debug", name = "ConnectionPool::new_inbound_connection", skip(self))]
	pub fn new_inbound_connection(&self) -> Arc<IoConnection> {
		let connection = Arc::new(IoConnection::inbound(self.send_queue.clone(), &self.config));
		self.add_connection(connection.clone());
		connection
	}

	/// Dials `address` on behalf of the remote peer's stream `stream_id`.
	///
	/// The returned stream is not registered yet, see [`ConnectionPool::add_connection`].
	#[tracing::instrument(level = "debug", name = "ConnectionPool::new_outbound_connection", skip(self))]
	pub async fn new_outbound_connection(&self, stream_id: StreamId, address: &str) -> Result<Arc<IoConnection>, Error> {
		let dial_error = |source| Error::Dial {
			address: address.to_owned(),
			source,
		};

		let stream = match tokio::time::timeout(self.config.dial_timeout, TcpStream::connect(address)).await {
			Ok(Ok(stream)) => stream,
			Ok(Err(error)) => {
				warn!(%stream_id, %address, ?error, "Failed to dial");
				return Err(dial_error(error));
			}
			Err(_) => {
				warn!(%stream_id, %address, "Dial timed out");
				return Err(dial_error(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")));
			}
		};
		let remote_addr = stream.peer_addr().map_err(dial_error)?;
		info!(%stream_id, %remote_addr, "Outbound connection established");

		Ok(Arc::new(IoConnection::outbound(
			stream,
			remote_addr,
			stream_id,
			self.send_queue.clone(),
			&self.config,
		)))
	}

	/// Registers a stream and spawns its daemon.
	///
	/// A stream already registered under the same identifier is removed first and its daemon cancelled.
	pub fn add_connection(&self, connection: Arc<dyn Connection>) {
		let stream_id = connection.id();

		if self.registry.insert(connection.clone()).is_some() {
			warn!(%stream_id, "Stream identifier reused, replaced registered stream");
		}

		let span = tracing::debug_span!(parent: tracing::Span::none(), "connection_daemon", %stream_id);
		span.follows_from(tracing::Span::current());
		tokio::spawn(connection.daemon().instrument(span));
	}

	/// Unregisters the stream and cancels its daemon.
	///
	/// Does nothing if this stream is not the one registered under its identifier,
	/// which covers repeated removals and handles displaced by a reused identifier.
	pub fn remove_connection(&self, connection: &dyn Connection) {
		if self.registry.remove(connection).is_some() {
			debug!(stream_id = %connection.id(), "Connection removed");
		}
	}

	pub fn contains(&self, stream_id: StreamId) -> bool {
		self.registry.contains(stream_id)
	}

	pub fn len(&self) -> usize {
		self.registry.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The queue streams put their outgoing blocks on.
	pub fn send_queue(&self) -> mpsc::Sender<Block> {
		self.send_queue.clone()
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn manager(&self) -> &Arc<dyn Manager> {
		self.registry.manager()
	}

	/// The token stopping both relays once cancelled.
	pub fn shutdown_token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	/// Stops both relays and waits for them to exit.
	///
	/// Blocks still queued are not delivered. Stream daemons keep running until removed.
	pub async fn shutdown(&self) {
		self.shutdown.cancel();

		let Some(Relays { send, recv }) = self.relays.lock().take() else {
			return;
		};
		for (name, handle) in [("send", send), ("recv", recv)] {
			if let Err(error) = handle.await {
				error!(relay = name, ?error, "Relay task failed");
			}
		}
		info!("Connection pool shut down");
	}
}

impl Drop for ConnectionPool {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}
