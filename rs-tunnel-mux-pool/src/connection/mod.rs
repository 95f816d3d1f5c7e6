use std::sync::Arc;

use futures::future::BoxFuture;
use rs_tunnel_mux_core::{Block, ConnectionOrigin, StreamId};
use tokio::sync::mpsc;

mod io;

pub use io::{AsyncReadWrite, IoConnection};

/// What the multiplexer needs from a stream to route blocks to it and manage its lifetime.
pub trait Connection: Send + Sync + 'static {
	fn id(&self) -> StreamId;

	fn origin(&self) -> Option<&ConnectionOrigin> {
		None
	}

	/// The stream's private queue, fed by the multiplexer with the blocks addressed to it.
	fn recv_queue(&self) -> mpsc::Sender<Block>;

	/// The stream's I/O loop. Runs until the stream finishes or [`Connection::cancel_daemon`] is called.
	fn daemon(self: Arc<Self>) -> BoxFuture<'static, ()>;

	fn cancel_daemon(&self);
}
