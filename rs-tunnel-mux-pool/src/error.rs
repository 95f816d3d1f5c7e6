use std::io;

use rs_tunnel_mux_core::StreamId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("dial to: {address} error: {source}")]
	Dial {
		address: String,
		#[source]
		source: io::Error,
	},

	#[error("stream {0} cannot send: the shared send queue is closed")]
	SendQueueClosed(StreamId),
}

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
	#[error("the tunnel pool's receive queue was already taken")]
	RecvQueueTaken,
}
