mod block;
pub mod codec;
pub mod connection;
mod stream_id;
pub mod tunnel;

pub use block::{Block, BlockKind};
pub use codec::BlockCodec;
pub use connection::ConnectionOrigin;
pub use stream_id::StreamId;
pub use tunnel::TunnelPool;
