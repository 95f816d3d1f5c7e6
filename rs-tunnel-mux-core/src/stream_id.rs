use std::fmt::{Debug, Display};

/// Identifier of one logical stream carried over the tunnel pool.
///
/// Unique among the streams currently registered with one multiplexer. Inbound
/// streams draw a random identifier, outbound streams reuse the identifier chosen
/// by the remote peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
	pub const fn new(id: u32) -> Self {
		StreamId(id)
	}

	pub fn random() -> Self {
		StreamId(rand::random())
	}

	pub const fn as_u32(self) -> u32 {
		self.0
	}
}

impl Debug for StreamId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "StreamId({})", self.0)
	}
}

impl Display for StreamId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

macro_rules! impl_stream_id_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for StreamId {
                fn from(val: $t) -> Self {
                    StreamId(u32::from(val))
                }
            }
        )*
    };
}

impl_stream_id_from_unsigned!(u8, u16, u32);

impl From<StreamId> for u32 {
	fn from(id: StreamId) -> Self {
		id.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_stream_id_formatting() {
		let id = StreamId::from(42u32);
		assert_eq!(format!("{id:?}"), "StreamId(42)");
		assert_eq!(format!("{id}"), "42");
	}

	#[test]
	fn test_stream_id_from_various_types() {
		let from_u8 = StreamId::from(7u8);
		let from_u16 = StreamId::from(7u16);
		let from_u32 = StreamId::from(7u32);

		assert_eq!(from_u8, from_u16);
		assert_eq!(from_u16, from_u32);
		assert_eq!(u32::from(from_u32), 7);
	}

	#[test]
	fn test_stream_id_edge_values() {
		let zero = StreamId::new(0);
		let max = StreamId::new(u32::MAX);

		assert_eq!(format!("{max:?}"), format!("StreamId({})", u32::MAX));
		assert_ne!(zero, max);
		assert!(zero < max);
	}

	#[test]
	fn test_stream_id_in_hashmap() {
		let mut map = HashMap::new();
		map.insert(StreamId::new(1), "first");
		map.insert(StreamId::new(2), "second");
		map.insert(StreamId::new(1), "first_updated");

		assert_eq!(map.len(), 2);
		assert_eq!(map.get(&StreamId::new(1)), Some(&"first_updated"));
	}

	#[test]
	fn test_stream_id_random_spreads() {
		let ids: std::collections::HashSet<_> = (0..64).map(|_| StreamId::random()).collect();
		// 64 draws out of 2^32 colliding down to a handful would mean the generator is broken.
		assert!(ids.len() > 60);
	}
}
