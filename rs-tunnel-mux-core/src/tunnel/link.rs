use asynchronous_codec::Framed;
use futures::{AsyncRead, AsyncWrite, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{
	Block,
	codec::{BlockCodec, CodecError},
	tunnel::TunnelPool,
};

/// Tunnel pool carried by a single physical byte stream.
///
/// The stream itself is driven by the [`Link`] returned alongside the pool,
/// which must be spawned by the caller.
pub struct LinkPool {
	send_tx: mpsc::Sender<Block>,
	recv_rx: Option<mpsc::Receiver<Block>>,
}

/// Moves blocks between a [`LinkPool`]'s feeds and the byte stream.
pub struct Link<S> {
	io: S,
	codec: BlockCodec,
	outbound: mpsc::Receiver<Block>,
	inbound: mpsc::Sender<Block>,
}

impl LinkPool {
	pub fn new<S>(io: S, capacity: usize) -> (Self, Link<S>)
	where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		let (send_tx, outbound) = mpsc::channel(capacity);
		let (inbound, recv_rx) = mpsc::channel(capacity);

		let pool = Self {
			send_tx,
			recv_rx: Some(recv_rx),
		};
		let link = Link {
			io,
			codec: BlockCodec::default(),
			outbound,
			inbound,
		};
		(pool, link)
	}
}

impl TunnelPool for LinkPool {
	fn send_queue(&self) -> mpsc::Sender<Block> {
		self.send_tx.clone()
	}

	fn take_recv_queue(&mut self) -> Option<mpsc::Receiver<Block>> {
		self.recv_rx.take()
	}
}

impl<S> Link<S>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	pub fn with_codec(mut self, codec: BlockCodec) -> Self {
		self.codec = codec;
		self
	}

	/// Runs until the byte stream closes, the pool is dropped or framing fails.
	///
	/// Reading and writing progress independently, so a peer blocked on writing
	/// its own frames still has its frames read.
	pub async fn run(self) -> Result<(), CodecError> {
		let Link {
			io,
			codec,
			mut outbound,
			inbound,
		} = self;
		let (mut sink, mut stream) = StreamExt::split::<Block>(Framed::new(io, codec));

		let write = async {
			while let Some(block) = outbound.recv().await {
				sink.send(block).await?;
			}
			tracing::debug!("Link pool dropped, closing link");
			sink.close().await
		};

		let read = async {
			while let Some(frame) = stream.next().await {
				let block = frame.inspect_err(|error| tracing::warn!(?error, "Link framing failed"))?;
				if inbound.send(block).await.is_err() {
					tracing::debug!("Link inbound feed dropped, closing link");
					return Ok::<_, CodecError>(());
				}
			}
			tracing::debug!("Link closed by peer");
			Ok(())
		};

		tokio::select! {
			result = write => result,
			result = read => result,
		}
	}
}
