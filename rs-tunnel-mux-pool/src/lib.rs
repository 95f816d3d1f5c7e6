mod builder;
mod config;
mod connection;
mod error;
mod manager;
mod pool;
mod registry;
mod relay;

pub use builder::Builder;
pub use config::Config;
pub use connection::{AsyncReadWrite, Connection, IoConnection};
pub use error::{BuilderError, Error};
pub use manager::{Manager, NoopManager};
pub use pool::ConnectionPool;
pub use rs_tunnel_mux_core::{Block, BlockKind, ConnectionOrigin, StreamId, tunnel};
