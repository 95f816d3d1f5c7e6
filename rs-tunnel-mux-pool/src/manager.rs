use rs_tunnel_mux_core::{ConnectionOrigin, StreamId};

/// Admission policy the multiplexer reports stream lifecycle changes to.
///
/// The relays never call into the manager; it only hears about registrations.
/// Hooks are called while the registry is locked, in registration order, and must
/// not call back into the [`ConnectionPool`](crate::ConnectionPool).
pub trait Manager: Send + Sync + 'static {
	/// A stream was registered. Its daemon is spawned right after.
	fn on_connection_added(&self, _stream_id: StreamId, _origin: Option<&ConnectionOrigin>) {}

	/// A registered stream was removed and its daemon cancelled, or displaced by a
	/// stream reusing its identifier.
	fn on_connection_removed(&self, _stream_id: StreamId) {}
}

/// Manager that accepts everything and keeps no state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopManager;

impl Manager for NoopManager {}
