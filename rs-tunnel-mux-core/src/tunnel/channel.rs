use tokio::sync::mpsc;

use crate::{Block, tunnel::TunnelPool};

/// Tunnel pool backed by in-process channels.
pub struct ChannelPool {
	send_tx: mpsc::Sender<Block>,
	recv_rx: Option<mpsc::Receiver<Block>>,
}

/// The far side of a [`ChannelPool`] created with [`ChannelPool::new`].
pub struct RemoteEnd {
	/// Blocks the pool was asked to send.
	pub sent: mpsc::Receiver<Block>,
	/// Injects blocks as if they arrived from the remote peer.
	pub deliver: mpsc::Sender<Block>,
}

impl ChannelPool {
	pub fn new(capacity: usize) -> (Self, RemoteEnd) {
		let (send_tx, sent) = mpsc::channel(capacity);
		let (deliver, recv_rx) = mpsc::channel(capacity);

		let pool = Self {
			send_tx,
			recv_rx: Some(recv_rx),
		};
		(pool, RemoteEnd { sent, deliver })
	}

	/// Two pools wired back to back: what one sends, the other receives.
	pub fn pair(capacity: usize) -> (Self, Self) {
		let (a_tx, b_rx) = mpsc::channel(capacity);
		let (b_tx, a_rx) = mpsc::channel(capacity);

		let a = Self {
			send_tx: a_tx,
			recv_rx: Some(a_rx),
		};
		let b = Self {
			send_tx: b_tx,
			recv_rx: Some(b_rx),
		};
		(a, b)
	}
}

impl TunnelPool for ChannelPool {
	fn send_queue(&self) -> mpsc::Sender<Block> {
		self.send_tx.clone()
	}

	fn take_recv_queue(&mut self) -> Option<mpsc::Receiver<Block>> {
		self.recv_rx.take()
	}
}
