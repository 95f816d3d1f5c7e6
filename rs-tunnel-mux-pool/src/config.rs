use std::time::Duration;

/// The configuration of a [`ConnectionPool`](crate::ConnectionPool).
#[derive(Debug, Clone)]
pub struct Config {
	/// Capacity of the queue shared by every stream for outgoing blocks.
	pub(crate) send_queue_size: usize,
	/// Capacity of each stream's private queue of incoming blocks.
	pub(crate) recv_queue_size: usize,
	/// Bytes read from a stream endpoint into one data block, at most.
	pub(crate) read_buffer_size: usize,
	/// How long dialing an outbound target may take.
	pub(crate) dial_timeout: Duration,
}

impl Config {
	/// Creates a new [`Config`] with the following default settings:
	///
	///   * [`Config::with_send_queue_size`] 24
	///   * [`Config::with_recv_queue_size`] 24
	///   * [`Config::with_read_buffer_size`] 16 KiB
	///   * [`Config::with_dial_timeout`] 10s
	///
	/// A full shared queue suspends every stream trying to send, which is how a
	/// slow tunnel pool pushes back on the streams.
	pub fn new() -> Self {
		Self {
			send_queue_size: 24,
			recv_queue_size: 24,
			read_buffer_size: 16 * 1024,
			dial_timeout: Duration::from_secs(10),
		}
	}

	/// Sets the capacity of the shared outbound queue.
	pub fn with_send_queue_size(mut self, size: usize) -> Self {
		self.send_queue_size = size.max(1);
		self
	}

	/// Sets the capacity of each stream's inbound queue.
	pub fn with_recv_queue_size(mut self, size: usize) -> Self {
		self.recv_queue_size = size.max(1);
		self
	}

	/// Sets how many bytes a stream reads into one data block.
	pub fn with_read_buffer_size(mut self, size: usize) -> Self {
		self.read_buffer_size = size.max(1);
		self
	}

	/// Sets the outbound dial timeout.
	pub fn with_dial_timeout(mut self, d: Duration) -> Self {
		self.dial_timeout = d;
		self
	}

	pub fn send_queue_size(&self) -> usize {
		self.send_queue_size
	}

	pub fn recv_queue_size(&self) -> usize {
		self.recv_queue_size
	}

	pub fn read_buffer_size(&self) -> usize {
		self.read_buffer_size
	}

	pub fn dial_timeout(&self) -> Duration {
		self.dial_timeout
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::new()
	}
}
