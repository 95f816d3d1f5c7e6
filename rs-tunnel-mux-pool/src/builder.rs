use std::sync::Arc;

use rs_tunnel_mux_core::tunnel::TunnelPool;

use crate::{Config, ConnectionPool, Manager, NoopManager, error::BuilderError};

pub struct Builder {
	manager: Arc<dyn Manager>,
	config: Config,
}

impl Builder {
	pub fn new() -> Self {
		Self {
			manager: Arc::new(NoopManager),
			config: Config::default(),
		}
	}

	pub fn with_manager(mut self, manager: impl Manager) -> Self {
		self.manager = Arc::new(manager);
		self
	}

	pub fn with_config(mut self, config: Config) -> Self {
		self.config = config;
		self
	}

	/// Builds the multiplexer on top of `tunnel_pool` and starts its relays.
	///
	/// Fails if the tunnel pool's receive queue was already taken by someone else.
	pub fn build<P>(self, tunnel_pool: &mut P) -> Result<ConnectionPool, BuilderError>
	where
		P: TunnelPool + ?Sized,
	{
		ConnectionPool::new(self.manager, tunnel_pool, self.config)
	}
}

impl Default for Builder {
	fn default() -> Self {
		Self::new()
	}
}
