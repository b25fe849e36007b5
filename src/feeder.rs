//! Streaming buffer between the symbol queue and the audio callback.
//!
//! The audio driver pulls bytes from a [`StreamBuffer`] on its own thread, while a [`Feeder`] on
//! the transmitter thread keeps a couple of seconds of PCM buffered ahead of the read cursor. The
//! two sides share nothing but the buffer's mutex.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use jjy::{Symbol, ToneBank};
use parking_lot::Mutex;

/// How far ahead of the read cursor the feeder keeps the buffer filled.
pub const DEFAULT_LEAD: Duration = Duration::from_secs(2);

/// Result of a single pull from a [`StreamBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullStatus {
	/// More data may follow.
	Continue,
	/// The producer closed the buffer and every byte has been pulled.
	Complete
}

#[derive(Debug, Default)]
struct Inner {
	data: Vec<u8>,
	cursor: usize,
	closed: bool
}

/// PCM bytes plus a read cursor, shared between the audio callback and the feeder.
#[derive(Debug, Default)]
pub struct StreamBuffer {
	inner: Mutex<Inner>,
	underruns: AtomicU64
}

impl StreamBuffer {
	/// Create an empty, open buffer.
	pub fn new() -> StreamBuffer {
		Default::default()
	}

	/// Copy the next bytes into `out`.
	///
	/// Returns the number of bytes written and whether the stream is complete. The cursor advances
	/// by exactly the bytes written. If fewer than `out.len()` bytes are buffered and the buffer is
	/// still open, the shortfall is counted as an underrun; the rest of `out` is left untouched for
	/// the caller to fill. This never blocks on the producer.
	///
	/// # Examples
	///
	/// ```ignore
	/// let b = StreamBuffer::new();
	/// b.append(&[1, 2, 3]);
	/// b.close();
	/// let mut out = [0; 2];
	/// assert_eq!(b.pull(&mut out), (2, PullStatus::Continue));
	/// assert_eq!(b.pull(&mut out), (1, PullStatus::Complete));
	/// ```
	pub fn pull(&self, out: &mut [u8]) -> (usize, PullStatus) {
		let mut inner = self.inner.lock();
		let available = inner.data.len() - inner.cursor;
		let n = available.min(out.len());
		let start = inner.cursor;
		out[..n].copy_from_slice(&inner.data[start..start + n]);
		inner.cursor += n;

		if inner.closed && inner.cursor == inner.data.len() {
			(n, PullStatus::Complete)
		} else {
			if n < out.len() {
				self.underruns.fetch_add(1, Ordering::Relaxed);
			}
			(n, PullStatus::Continue)
		}
	}

	/// Append bytes after the buffered data.
	///
	/// Bytes already pulled are dropped first so the buffer only ever holds unread data.
	pub fn append(&self, chunk: &[u8]) {
		let mut inner = self.inner.lock();
		let cursor = inner.cursor;
		if cursor > 0 {
			inner.data.drain(..cursor);
			inner.cursor = 0;
		}
		inner.data.extend_from_slice(chunk);
	}

	/// Mark the end of input. Later appends are still accepted but pointless.
	pub fn close(&self) {
		self.inner.lock().closed = true;
	}

	/// Whether [`close`](StreamBuffer::close) was called.
	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed
	}

	/// Number of unread bytes.
	pub fn buffered(&self) -> usize {
		let inner = self.inner.lock();
		inner.data.len() - inner.cursor
	}

	/// Number of short pulls since the previous call.
	pub fn take_underruns(&self) -> u64 {
		self.underruns.swap(0, Ordering::Relaxed)
	}
}

/// Refills a [`StreamBuffer`] from a queue of symbols.
pub struct Feeder {
	buffer: Arc<StreamBuffer>,
	tones: Arc<ToneBank>,
	queue: VecDeque<Symbol>,
	lead_bytes: usize
}

impl Feeder {
	/// Create a feeder that keeps at least `lead` of audio buffered ahead of the reader.
	pub fn new(buffer: Arc<StreamBuffer>, tones: Arc<ToneBank>, queue: VecDeque<Symbol>, lead: Duration)
		-> Feeder
	{
		let bytes_per_second = tones.chunk_len() as f64;
		Feeder {
			buffer,
			tones,
			queue,
			lead_bytes: (lead.as_secs_f64() * bytes_per_second).ceil() as usize
		}
	}

	/// Append whole symbols until the lead target is met or the queue runs out.
	///
	/// Closes the buffer once the queue is empty. Returns the number of symbols appended.
	pub fn tick(&mut self) -> usize {
		let mut buffered = self.buffer.buffered();
		let mut appended = 0;
		while buffered < self.lead_bytes {
			let Some(symbol) = self.queue.pop_front() else { break };
			let chunk = self.tones.chunk(symbol);
			self.buffer.append(chunk);
			buffered += chunk.len();
			appended += 1;
		}
		if self.queue.is_empty() && !self.buffer.is_closed() {
			self.buffer.close();
		}
		appended
	}

	/// Symbols not yet handed to the buffer.
	pub fn remaining(&self) -> usize {
		self.queue.len()
	}

	/// The buffer being fed.
	pub fn buffer(&self) -> &Arc<StreamBuffer> {
		&self.buffer
	}
}
