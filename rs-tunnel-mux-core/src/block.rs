use bytes::Bytes;

use crate::StreamId;

/// What a [`Block`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockKind {
	/// Application bytes.
	Data = 0,
	/// Asks the remote side to dial the address held in the payload.
	Connect = 1,
	/// The sender will not write to the stream anymore.
	Disconnect = 2,
}

impl TryFrom<u8> for BlockKind {
	type Error = u8;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(BlockKind::Data),
			1 => Ok(BlockKind::Connect),
			2 => Ok(BlockKind::Disconnect),
			other => Err(other),
		}
	}
}

/// Smallest unit moved through the tunnel pool, addressed to one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	pub stream_id: StreamId,
	pub kind: BlockKind,
	pub payload: Bytes,
}

impl Block {
	pub fn new(stream_id: StreamId, kind: BlockKind, payload: impl Into<Bytes>) -> Self {
		Self {
			stream_id,
			kind,
			payload: payload.into(),
		}
	}

	pub fn data(stream_id: StreamId, payload: impl Into<Bytes>) -> Self {
		Self::new(stream_id, BlockKind::Data, payload)
	}

	pub fn connect(stream_id: StreamId, address: &str) -> Self {
		Self::new(stream_id, BlockKind::Connect, Bytes::copy_from_slice(address.as_bytes()))
	}

	pub fn disconnect(stream_id: StreamId) -> Self {
		Self::new(stream_id, BlockKind::Disconnect, Bytes::new())
	}

	/// The target address of a [`BlockKind::Connect`] block.
	pub fn connect_address(&self) -> Option<&str> {
		match self.kind {
			BlockKind::Connect => std::str::from_utf8(&self.payload).ok(),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_block_kind_from_u8() {
		assert_eq!(BlockKind::try_from(0u8), Ok(BlockKind::Data));
		assert_eq!(BlockKind::try_from(1u8), Ok(BlockKind::Connect));
		assert_eq!(BlockKind::try_from(2u8), Ok(BlockKind::Disconnect));
		assert_eq!(BlockKind::try_from(9u8), Err(9));
	}

	#[test]
	fn test_connect_address() {
		let id = StreamId::new(3);
		let block = Block::connect(id, "127.0.0.1:8080");

		assert_eq!(block.kind, BlockKind::Connect);
		assert_eq!(block.connect_address(), Some("127.0.0.1:8080"));
		assert_eq!(Block::data(id, "127.0.0.1:8080").connect_address(), None);
	}

	#[test]
	fn test_disconnect_has_empty_payload() {
		let block = Block::disconnect(StreamId::new(5));
		assert_eq!(block.kind, BlockKind::Disconnect);
		assert!(block.payload.is_empty());
	}
}
