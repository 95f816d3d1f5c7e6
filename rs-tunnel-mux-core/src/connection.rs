use std::net::SocketAddr;

/// Where a stream came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionOrigin {
	/// Accepted locally, identifier assigned on this side.
	Inbound,
	/// Requested by the remote peer, which also picked the identifier.
	Outbound { remote_addr: SocketAddr },
}
