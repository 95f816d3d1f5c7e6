use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use rs_tunnel_mux_core::{Block, BlockKind, ConnectionOrigin, StreamId};
use tokio::{
	io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream},
	sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use web_time::Instant;

use crate::{Config, Connection, error::Error};

pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T> AsyncReadWrite for T where T: AsyncRead + AsyncWrite {}

type BoxedIo = Box<dyn AsyncReadWrite + Send + Unpin>;

/// A stream whose daemon pumps bytes between an async byte endpoint and blocks.
///
/// Bytes read from the endpoint leave as [`BlockKind::Data`] blocks on the shared
/// send queue, data blocks delivered to the private queue are written to the
/// endpoint. End of input is announced with one [`BlockKind::Disconnect`] block,
/// and a received disconnect shuts the endpoint's write side down.
pub struct IoConnection {
	id: StreamId,
	origin: ConnectionOrigin,
	send_queue: mpsc::Sender<Block>,
	recv_tx: mpsc::Sender<Block>,
	recv_rx: Mutex<Option<mpsc::Receiver<Block>>>,
	io: Mutex<Option<BoxedIo>>,
	/// Application side of an inbound stream, until someone takes it.
	local_io: Mutex<Option<DuplexStream>>,
	read_buffer_size: usize,
	cancel: CancellationToken,
	created_at: Instant,
}

impl IoConnection {
	/// A locally accepted stream with a fresh random identifier.
	///
	/// The application talks to it through the endpoint returned by [`IoConnection::take_io`].
	pub fn inbound(send_queue: mpsc::Sender<Block>, config: &Config) -> Self {
		let (local_io, io) = tokio::io::duplex(config.read_buffer_size);
		let mut connection = Self::new(
			StreamId::random(),
			ConnectionOrigin::Inbound,
			Box::new(io),
			send_queue,
			config,
		);
		*connection.local_io.get_mut() = Some(local_io);
		connection
	}

	/// A stream the remote peer asked for, bound to the endpoint dialed on its behalf.
	pub fn outbound<S>(
		io: S,
		remote_addr: SocketAddr,
		stream_id: StreamId,
		send_queue: mpsc::Sender<Block>,
		config: &Config,
	) -> Self
	where
		S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
	{
		Self::new(
			stream_id,
			ConnectionOrigin::Outbound { remote_addr },
			Box::new(io),
			send_queue,
			config,
		)
	}

	fn new(
		id: StreamId,
		origin: ConnectionOrigin,
		io: BoxedIo,
		send_queue: mpsc::Sender<Block>,
		config: &Config,
	) -> Self {
		let (recv_tx, recv_rx) = mpsc::channel(config.recv_queue_size);

		Self {
			id,
			origin,
			send_queue,
			recv_tx,
			recv_rx: Mutex::new(Some(recv_rx)),
			io: Mutex::new(Some(io)),
			local_io: Mutex::new(None),
			read_buffer_size: config.read_buffer_size,
			cancel: CancellationToken::new(),
			created_at: Instant::now(),
		}
	}

	/// Takes the application side of an inbound stream. Always `None` for outbound streams.
	pub fn take_io(&self) -> Option<DuplexStream> {
		self.local_io.lock().take()
	}

	/// Asks the remote peer to dial `address` for this stream.
	pub async fn send_connect(&self, address: &str) -> Result<(), Error> {
		self.send_queue
			.send(Block::connect(self.id, address))
			.await
			.map_err(|_| Error::SendQueueClosed(self.id))
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Sends on the shared queue unless the daemon is cancelled while waiting for room.
	async fn send_block(&self, block: Block) -> bool {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => false,
			sent = self.send_queue.send(block) => sent.is_ok(),
		}
	}

	async fn run(self: Arc<Self>) {
		let (recv_rx, io) = {
			let mut recv_rx = self.recv_rx.lock();
			let mut io = self.io.lock();
			(recv_rx.take(), io.take())
		};
		let (Some(mut recv_rx), Some(io)) = (recv_rx, io) else {
			warn!(stream_id = %self.id, "Connection daemon already started");
			return;
		};

		debug!(stream_id = %self.id, origin = ?self.origin, "Connection daemon started");

		let (mut reader, mut writer) = tokio::io::split(io);
		let mut buf = vec![0u8; self.read_buffer_size];
		let mut local_open = true;
		let mut remote_open = true;

		while local_open || remote_open {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => {
					debug!(stream_id = %self.id, "Connection daemon cancelled");
					break;
				}
				read = reader.read(&mut buf), if local_open => {
					let block = match read {
						Ok(0) => {
							local_open = false;
							Block::disconnect(self.id)
						}
						Ok(n) => Block::data(self.id, Bytes::copy_from_slice(&buf[..n])),
						Err(error) => {
							debug!(stream_id = %self.id, ?error, "Connection read failed");
							local_open = false;
							Block::disconnect(self.id)
						}
					};
					if !self.send_block(block).await {
						break;
					}
				}
				block = recv_rx.recv(), if remote_open => {
					let Some(block) = block else { break };
					match block.kind {
						BlockKind::Data => {
							let written = tokio::select! {
								biased;
								_ = self.cancel.cancelled() => {
									debug!(stream_id = %self.id, "Connection daemon cancelled while writing");
									break;
								}
								written = writer.write_all(&block.payload) => written,
							};
							if let Err(error) = written {
								debug!(stream_id = %self.id, ?error, "Connection write failed");
								remote_open = false;
								if local_open {
									local_open = false;
									if !self.send_block(Block::disconnect(self.id)).await {
										break;
									}
								}
							}
						}
						BlockKind::Disconnect => {
							remote_open = false;
							let _ = writer.shutdown().await;
						}
						BlockKind::Connect => {
							debug!(stream_id = %self.id, "Ignoring connect request for an established stream");
						}
					}
				}
			}
		}

		debug!(stream_id = %self.id, lifetime = ?self.created_at.elapsed(), "Connection daemon stopped");
	}
}

impl Connection for IoConnection {
	fn id(&self) -> StreamId {
		self.id
	}

	fn origin(&self) -> Option<&ConnectionOrigin> {
		Some(&self.origin)
	}

	fn recv_queue(&self) -> mpsc::Sender<Block> {
		self.recv_tx.clone()
	}

	fn daemon(self: Arc<Self>) -> BoxFuture<'static, ()> {
		self.run().boxed()
	}

	fn cancel_daemon(&self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	const WAIT: Duration = Duration::from_secs(5);

	fn inbound() -> (Arc<IoConnection>, DuplexStream, mpsc::Receiver<Block>) {
		let (send_tx, send_rx) = mpsc::channel(8);
		let connection = Arc::new(IoConnection::inbound(send_tx, &Config::default()));
		let local = connection.take_io().unwrap();
		(connection, local, send_rx)
	}

	#[tokio::test]
	async fn test_bytes_become_data_blocks() {
		let (connection, mut local, mut send_rx) = inbound();
		tokio::spawn(connection.clone().daemon());

		local.write_all(b"ping").await.unwrap();

		let block = tokio::time::timeout(WAIT, send_rx.recv()).await.unwrap().unwrap();
		assert_eq!(block, Block::data(connection.id(), &b"ping"[..]));
	}

	#[tokio::test]
	async fn test_data_blocks_reach_endpoint() {
		let (connection, mut local, _send_rx) = inbound();
		tokio::spawn(connection.clone().daemon());

		let queue = connection.recv_queue();
		queue.send(Block::data(connection.id(), "po")).await.unwrap();
		queue.send(Block::data(connection.id(), "ng")).await.unwrap();

		let mut buf = [0u8; 4];
		tokio::time::timeout(WAIT, local.read_exact(&mut buf)).await.unwrap().unwrap();
		assert_eq!(&buf, b"pong");
	}

	#[tokio::test]
	async fn test_both_sides_closing_stops_daemon() {
		let (connection, mut local, mut send_rx) = inbound();
		let daemon = tokio::spawn(connection.clone().daemon());

		local.shutdown().await.unwrap();
		let block = tokio::time::timeout(WAIT, send_rx.recv()).await.unwrap().unwrap();
		assert_eq!(block, Block::disconnect(connection.id()));

		connection.recv_queue().send(Block::disconnect(connection.id())).await.unwrap();
		let mut rest = Vec::new();
		tokio::time::timeout(WAIT, local.read_to_end(&mut rest)).await.unwrap().unwrap();
		assert!(rest.is_empty());

		tokio::time::timeout(WAIT, daemon).await.unwrap().unwrap();
		assert!(!connection.is_cancelled());
	}

	#[tokio::test]
	async fn test_cancel_stops_daemon() {
		let (connection, _local, _send_rx) = inbound();
		let daemon = tokio::spawn(connection.clone().daemon());

		connection.cancel_daemon();

		tokio::time::timeout(WAIT, daemon).await.unwrap().unwrap();
		assert!(connection.is_cancelled());
	}

	#[tokio::test]
	async fn test_cancel_interrupts_blocked_write() {
		let (send_tx, _send_rx) = mpsc::channel(8);
		let config = Config::new().with_read_buffer_size(4);
		let connection = Arc::new(IoConnection::inbound(send_tx, &config));
		// Never read, so the daemon's write stalls once the endpoint buffer is full.
		let _local = connection.take_io().unwrap();
		let daemon = tokio::spawn(connection.clone().daemon());

		connection
			.recv_queue()
			.send(Block::data(connection.id(), "more than four bytes"))
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!daemon.is_finished());

		connection.cancel_daemon();
		tokio::time::timeout(WAIT, daemon).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_daemon_runs_once() {
		let (connection, _local, _send_rx) = inbound();
		let first = tokio::spawn(connection.clone().daemon());
		tokio::task::yield_now().await;

		// A second daemon finds the endpoint already taken and returns immediately.
		tokio::time::timeout(WAIT, connection.clone().daemon()).await.unwrap();

		connection.cancel_daemon();
		tokio::time::timeout(WAIT, first).await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_outbound_keeps_peer_identifier() {
		let (send_tx, mut send_rx) = mpsc::channel(8);
		let (mut remote, io) = tokio::io::duplex(64);
		let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
		let connection = Arc::new(IoConnection::outbound(
			io,
			addr,
			StreamId::new(77),
			send_tx,
			&Config::default(),
		));
		tokio::spawn(connection.clone().daemon());

		assert!(connection.take_io().is_none());
		assert_eq!(connection.origin(), Some(&ConnectionOrigin::Outbound { remote_addr: addr }));

		remote.write_all(b"reply").await.unwrap();
		let block = tokio::time::timeout(WAIT, send_rx.recv()).await.unwrap().unwrap();
		assert_eq!(block.stream_id, StreamId::new(77));
		assert_eq!(block.payload, "reply");
	}

	#[tokio::test]
	async fn test_send_connect() {
		let (connection, _local, mut send_rx) = inbound();

		connection.send_connect("example.org:443").await.unwrap();

		let block = send_rx.recv().await.unwrap();
		assert_eq!(block.stream_id, connection.id());
		assert_eq!(block.connect_address(), Some("example.org:443"));

		drop(send_rx);
		assert!(matches!(
			connection.send_connect("example.org:443").await,
			Err(Error::SendQueueClosed(id)) if id == connection.id()
		));
	}
}
