use asynchronous_codec::{Decoder, Encoder};
use bytes::{Buf, BufMut, BytesMut};

use crate::{Block, BlockKind, StreamId};

/// `stream id (u32) | kind (u8) | payload length (u32)`, big endian.
const HEADER_LEN: usize = 9;

/// Largest payload accepted by [`BlockCodec::default`].
pub const MAX_BLOCK_PAYLOAD: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("unknown block kind: {0}")]
	UnknownKind(u8),

	#[error("block payload of {len} bytes exceeds the {max} bytes limit")]
	PayloadTooLarge { len: usize, max: usize },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Length-prefixed framing of [`Block`]s over a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
	max_payload: usize,
}

impl BlockCodec {
	pub fn new(max_payload: usize) -> Self {
		Self { max_payload }
	}
}

impl Default for BlockCodec {
	fn default() -> Self {
		Self::new(MAX_BLOCK_PAYLOAD)
	}
}

impl Encoder for BlockCodec {
	type Item<'a> = Block;
	type Error = CodecError;

	fn encode(&mut self, block: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
		let len = block.payload.len();
		if len > self.max_payload {
			return Err(CodecError::PayloadTooLarge {
				len,
				max: self.max_payload,
			});
		}

		dst.reserve(HEADER_LEN + len);
		dst.put_u32(block.stream_id.as_u32());
		dst.put_u8(block.kind as u8);
		dst.put_u32(len as u32);
		dst.put_slice(&block.payload);
		Ok(())
	}
}

impl Decoder for BlockCodec {
	type Item = Block;
	type Error = CodecError;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
		if src.len() < HEADER_LEN {
			return Ok(None);
		}

		let mut header = &src[..HEADER_LEN];
		let stream_id = StreamId::new(header.get_u32());
		let kind = BlockKind::try_from(header.get_u8()).map_err(CodecError::UnknownKind)?;
		let len = header.get_u32() as usize;

		if len > self.max_payload {
			return Err(CodecError::PayloadTooLarge {
				len,
				max: self.max_payload,
			});
		}

		if src.len() < HEADER_LEN + len {
			src.reserve(HEADER_LEN + len - src.len());
			return Ok(None);
		}

		src.advance(HEADER_LEN);
		let payload = src.split_to(len).freeze();

		Ok(Some(Block {
			stream_id,
			kind,
			payload,
		}))
	}
}
