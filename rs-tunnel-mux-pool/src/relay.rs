use std::sync::Arc;

use rs_tunnel_mux_core::Block;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::registry::Registry;

/// Forwards every block of the shared send queue to the tunnel pool, in queue order.
pub(crate) async fn send_relay(
	mut send_queue: mpsc::Receiver<Block>,
	tunnel: mpsc::Sender<Block>,
	shutdown: CancellationToken,
) {
	tracing::debug!("Send relay started");
	loop {
		let block = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			block = send_queue.recv() => match block {
				Some(block) => block,
				None => break,
			},
		};

		tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			sent = tunnel.send(block) => {
				if sent.is_err() {
					tracing::warn!("Tunnel pool send queue closed, stopping send relay");
					break;
				}
			}
		}
	}
	tracing::debug!("Send relay stopped");
}

/// Delivers every block coming out of the tunnel pool to the stream it is addressed to.
///
/// Blocks for streams that are not registered are dropped. Delivery to a full
/// private queue waits, unless the stream is removed in the meantime.
pub(crate) async fn recv_relay(
	mut tunnel: mpsc::Receiver<Block>,
	registry: Arc<Registry>,
	shutdown: CancellationToken,
) {
	tracing::debug!("Recv relay started");
	loop {
		let block = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			block = tunnel.recv() => match block {
				Some(block) => block,
				None => {
					tracing::debug!("Tunnel pool recv queue closed");
					break;
				}
			},
		};

		let stream_id = block.stream_id;
		let Some(route) = registry.route(stream_id) else {
			continue;
		};

		tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			_ = route.removed.cancelled() => {
				tracing::debug!(%stream_id, "Stream removed before its block was delivered, dropping it");
			}
			// Fails once the stream's daemon is gone, the block is dropped then too.
			_ = route.recv_queue.send(block) => {}
		}
	}
	tracing::debug!("Recv relay stopped");
}
