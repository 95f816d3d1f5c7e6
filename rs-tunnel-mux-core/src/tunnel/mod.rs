use tokio::sync::mpsc;

use crate::Block;

mod channel;
mod link;

pub use channel::{ChannelPool, RemoteEnd};
pub use link::{Link, LinkPool};

/// Shared physical transport the multiplexer relays blocks through.
///
/// How blocks reach the remote peer (one link, many links, reconnection,
/// balancing) is up to the implementation.
pub trait TunnelPool {
	/// Feed accepting blocks bound for the remote peer.
	fn send_queue(&self) -> mpsc::Sender<Block>;

	/// Feed yielding blocks received from the remote peer.
	///
	/// The feed has a single consumer: only the first call returns it.
	fn take_recv_queue(&mut self) -> Option<mpsc::Receiver<Block>>;
}
