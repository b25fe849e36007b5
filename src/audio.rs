//! Pull-mode PCM output.
//!
//! The transmitter only needs a device that can be opened with a format and a pull callback, and a
//! stream that reports when it has finished. [`OutputDevice`] and [`OutputStream`] describe that
//! seam; [`CpalDevice`] implements it on the default audio output through cpal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::Sample;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::error;

use crate::error::AudioError;
use crate::feeder::PullStatus;

/// Samples per hardware buffer requested from cpal.
pub const BUFFER_FRAMES: u32 = 1024;

/// PCM format of an output stream. Samples are always signed 16-bit little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamFormat {
	/// Frames per second.
	pub sample_rate: u32,
	/// Interleaved channels per frame.
	pub channels: u16
}

impl StreamFormat {
	/// Mono at `sample_rate`.
	pub fn mono(sample_rate: u32) -> StreamFormat {
		StreamFormat { sample_rate, channels: 1 }
	}
}

/// Callback the device invokes to obtain the next bytes of PCM.
///
/// It fills a prefix of the buffer and returns how many bytes it wrote, together with
/// [`PullStatus::Complete`] once no more data will ever follow.
pub type PullCallback = Box<dyn FnMut(&mut [u8]) -> (usize, PullStatus) + Send>;

/// An audio output that can be opened in pull mode.
pub trait OutputDevice {
	/// The stream type returned by [`open`](OutputDevice::open).
	type Stream: OutputStream;

	/// Open and start a stream that pulls its data from `callback`.
	///
	/// # Errors
	///
	/// Returns an [`AudioError`] if the stream could not be created or started.
	fn open(&mut self, format: StreamFormat, callback: PullCallback) -> Result<Self::Stream, AudioError>;
}

/// A running output stream.
pub trait OutputStream {
	/// `false` once the callback reported [`PullStatus::Complete`] and the final buffer was handed to
	/// the device, or after the stream failed.
	fn is_active(&self) -> bool;

	/// Stop pulling data.
	fn stop(&mut self) -> Result<(), AudioError>;

	/// Release the stream.
	fn close(self) -> Result<(), AudioError>;
}

/// Current state of the writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
	/// Running, write the output of the pull callback.
	Running,
	/// The callback completed during the previous buffer. Mark the stream inactive.
	Finishing,
	/// Write [`i16::EQUILIBRIUM`] until stopped.
	Done
}

/// Fill `data` from `callback`, padding any shortfall with silence.
///
/// `scratch` is reused between calls to avoid allocating once it has grown to the buffer size.
fn fill(callback: &mut PullCallback, scratch: &mut Vec<u8>, data: &mut [i16]) -> PullStatus {
	scratch.resize(data.len() * 2, 0);
	let (n, status) = callback(&mut scratch[..]);
	let samples = n / 2;
	for (v, b) in data.iter_mut().zip(scratch[..samples * 2].chunks_exact(2)) {
		*v = i16::from_le_bytes([b[0], b[1]]);
	}
	data[samples..].iter_mut().for_each(|v| *v = i16::EQUILIBRIUM);
	status
}

/// Writes pull callback output into device buffers and tracks the end of the stream.
///
/// Once the pull callback completes, the remaining output is padded with silence and `active` is
/// cleared on the following invocation, after the final samples have been handed over.
struct Writer {
	callback: PullCallback,
	active: Arc<AtomicBool>,
	state: WriterState,
	scratch: Vec<u8>
}

impl Writer {
	fn new(callback: PullCallback, active: Arc<AtomicBool>) -> Writer {
		Writer { callback, active, state: WriterState::Running, scratch: Vec::new() }
	}

	/// Fill one device buffer.
	fn write(&mut self, data: &mut [i16]) {
		if self.state == WriterState::Finishing {
			self.active.store(false, Ordering::Release);
			self.state = WriterState::Done;
		}

		if self.state == WriterState::Running {
			if fill(&mut self.callback, &mut self.scratch, data) == PullStatus::Complete {
				self.state = WriterState::Finishing;
			}
		} else {
			data.iter_mut().for_each(|v| *v = i16::EQUILIBRIUM);
		}
	}
}

/// Make a cpal data callback around `callback`.
fn make_writer(callback: PullCallback, active: Arc<AtomicBool>)
	-> impl FnMut(&mut [i16], &cpal::OutputCallbackInfo) + Send + 'static
{
	let mut writer = Writer::new(callback, active);
	move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| writer.write(data)
}

/// The default output device of the default cpal host.
pub struct CpalDevice {
	device: cpal::Device
}

impl CpalDevice {
	/// Select the default output device.
	///
	/// # Errors
	///
	/// Returns [`AudioError::NoDevice`] if the host has no default output.
	pub fn default_output() -> Result<CpalDevice, AudioError> {
		let host = cpal::default_host();
		let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
		Ok(CpalDevice { device })
	}

	/// Device name, if the host reports one.
	pub fn name(&self) -> Option<String> {
		self.device.name().ok()
	}
}

impl OutputDevice for CpalDevice {
	type Stream = CpalStream;

	fn open(&mut self, format: StreamFormat, callback: PullCallback) -> Result<CpalStream, AudioError> {
		let config = cpal::StreamConfig {
			channels: format.channels,
			sample_rate: cpal::SampleRate(format.sample_rate),
			buffer_size: cpal::BufferSize::Fixed(BUFFER_FRAMES),
		};
		let active = Arc::new(AtomicBool::new(true));
		let failed = active.clone();
		let stream = self.device.build_output_stream(
			&config,
			make_writer(callback, active.clone()),
			move |e: cpal::StreamError| {
				error!("Error occurred on the stream: {}", e);
				failed.store(false, Ordering::Release);
			},
			None
		)?;
		stream.play()?;
		Ok(CpalStream { stream, active })
	}
}

/// A running cpal output stream.
pub struct CpalStream {
	stream: cpal::Stream,
	active: Arc<AtomicBool>
}

impl OutputStream for CpalStream {
	fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	fn stop(&mut self) -> Result<(), AudioError> {
		self.active.store(false, Ordering::Release);
		self.stream.pause()?;
		Ok(())
	}

	fn close(self) -> Result<(), AudioError> {
		drop(self.stream);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn source(bytes: Vec<u8>) -> PullCallback {
		let mut cursor = 0;
		Box::new(move |out: &mut [u8]| {
			let n = (bytes.len() - cursor).min(out.len());
			out[..n].copy_from_slice(&bytes[cursor..cursor + n]);
			cursor += n;
			let status = if cursor == bytes.len() { PullStatus::Complete } else { PullStatus::Continue };
			(n, status)
		})
	}

	#[test]
	fn fill_test() {
		let pcm: Vec<u8> = [1i16, -2, 300, -32768, 32767]
			.iter()
			.flat_map(|v| v.to_le_bytes())
			.collect();
		let mut cb = source(pcm);
		let mut scratch = Vec::new();

		let mut data = [7i16; 3];
		assert_eq!(fill(&mut cb, &mut scratch, &mut data), PullStatus::Continue);
		assert_eq!(data, [1, -2, 300]);

		// Shortfall is padded with silence
		let mut data = [7i16; 4];
		assert_eq!(fill(&mut cb, &mut scratch, &mut data), PullStatus::Complete);
		assert_eq!(data, [-32768, 32767, 0, 0]);
	}

	#[test]
	fn writer_test() {
		let pcm: Vec<u8> = [10i16, 20, 30, 40, 50].iter().flat_map(|v| v.to_le_bytes()).collect();
		let active = Arc::new(AtomicBool::new(true));
		let mut w = Writer::new(source(pcm), active.clone());

		let mut data = [7i16; 3];
		w.write(&mut data);
		assert_eq!(data, [10, 20, 30]);
		assert!(active.load(Ordering::Acquire));

		// The completing buffer is still written, and the stream stays active while it plays
		let mut data = [7i16; 3];
		w.write(&mut data);
		assert_eq!(data, [40, 50, 0]);
		assert_eq!(w.state, WriterState::Finishing);
		assert!(active.load(Ordering::Acquire));

		// The next buffer marks the stream inactive and is silent
		let mut data = [7i16; 3];
		w.write(&mut data);
		assert_eq!(data, [0, 0, 0]);
		assert_eq!(w.state, WriterState::Done);
		assert!(!active.load(Ordering::Acquire));

		let mut data = [7i16; 4];
		w.write(&mut data);
		assert_eq!(data, [0; 4]);
		assert!(!active.load(Ordering::Acquire));
	}

	#[test]
	fn writer_exact_end_test() {
		// Completion on a full buffer still defers the end by one invocation
		let pcm: Vec<u8> = [1i16, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
		let active = Arc::new(AtomicBool::new(true));
		let mut w = Writer::new(source(pcm), active.clone());

		let mut data = [0i16; 2];
		w.write(&mut data);
		assert_eq!(data, [1, 2]);
		assert!(active.load(Ordering::Acquire));
		w.write(&mut data);
		assert_eq!(data, [0, 0]);
		assert!(!active.load(Ordering::Acquire));
	}

	#[test]
	fn format_test() {
		assert_eq!(StreamFormat::mono(48000), StreamFormat { sample_rate: 48000, channels: 1 });
	}
}
