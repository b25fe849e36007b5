//! Transmission state machine.
//!
//! A [`Transmitter`] validates its [`Config`], builds the symbol schedule, waits for the next
//! second boundary, then streams the schedule to an [`OutputDevice`] while a [`Feeder`] keeps the
//! buffer topped up. The stream is stopped and closed on every path out of
//! [`run`](Transmitter::run), including cancellation and device errors.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jjy::{normalize, schedule, Symbol, ToneBank};
use tracing::{debug, info, warn};

use crate::audio::{OutputDevice, OutputStream, StreamFormat};
use crate::config::Config;
use crate::error::{AudioError, TransmitError};
use crate::feeder::{Feeder, StreamBuffer, DEFAULT_LEAD};

/// Time between feeder wakeups.
pub const FEED_INTERVAL: Duration = Duration::from_millis(750);

/// Source of the corrected current time.
pub trait Clock {
	/// Seconds since the Unix epoch, UTC.
	fn now(&self) -> f64;
}

/// System time plus a fixed correction, typically from NTP.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock {
	offset: f64
}

impl SystemClock {
	/// A clock reading system time plus `offset` seconds.
	pub fn new(offset: f64) -> SystemClock {
		SystemClock { offset }
	}
}

impl Clock for SystemClock {
	fn now(&self) -> f64 {
		let t = match time::now() {
			Some(t) => t.as_secs_f64(),
			None => SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_secs_f64())
				.unwrap_or_default()
		};
		t + self.offset
	}
}

/// Transmitter lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// Not started, or validating.
	Idle,
	/// Building the schedule and waiting for the second boundary.
	Aligning,
	/// Audio is playing.
	Streaming,
	/// Stopping and closing the stream.
	Draining,
	/// Finished. The stream, if one was opened, is closed.
	Stopped
}

/// How a transmission ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
	/// Every scheduled symbol was played.
	Completed,
	/// The cancellation flag was raised.
	Cancelled
}

/// Streams the JJY schedule for a [`Config`] to an output device.
pub struct Transmitter<D: OutputDevice, C: Clock> {
	config: Config,
	device: D,
	clock: C,
	cancel: Arc<AtomicBool>,
	feed_interval: Duration,
	lead: Duration,
	state: State
}

impl<D: OutputDevice, C: Clock> Transmitter<D, C> {
	/// Create a transmitter. Raising `cancel` ends [`run`](Transmitter::run) within one feed
	/// interval.
	pub fn new(config: Config, device: D, clock: C, cancel: Arc<AtomicBool>) -> Transmitter<D, C> {
		Transmitter {
			config,
			device,
			clock,
			cancel,
			feed_interval: FEED_INTERVAL,
			lead: DEFAULT_LEAD,
			state: State::Idle
		}
	}

	/// Override the feeder wakeup interval and the buffered lead.
	pub fn with_pacing(mut self, feed_interval: Duration, lead: Duration) -> Transmitter<D, C> {
		self.feed_interval = feed_interval;
		self.lead = lead;
		self
	}

	/// Current state.
	pub fn state(&self) -> State {
		self.state
	}

	fn set_state(&mut self, state: State) {
		debug!(from = ?self.state, to = ?state, "transmitter state");
		self.state = state;
	}

	fn cancelled(&self) -> bool {
		self.cancel.load(Ordering::Acquire)
	}

	/// Sleep for `duration` in slices of at most one feed interval. Returns `false` if cancelled.
	fn sleep(&self, duration: Duration) -> bool {
		let mut remaining = duration;
		while !remaining.is_zero() {
			if self.cancelled() {
				return false;
			}
			let slice = remaining.min(self.feed_interval);
			thread::sleep(slice);
			remaining -= slice;
		}
		!self.cancelled()
	}

	/// Adjusted time as transmitted: corrected clock plus local offset and manual delta.
	fn adjusted_now(&self) -> f64 {
		self.clock.now()
			+ self.config.local_offset_seconds as f64
			+ self.config.manual_delta_millis as f64 / 1000.
	}

	/// Build the schedule starting after the current second and sleep until that second begins.
	///
	/// Returns `None` if cancelled while waiting.
	fn align(&self) -> Option<VecDeque<Symbol>> {
		let c = &self.config;
		loop {
			let now = self.clock.now();
			let fields = normalize(now, c.local_offset_seconds, c.manual_delta_millis);
			let queue = schedule(&fields, c.duration_minutes);

			let boundary = fields.unix_seconds as f64 + 1.;
			let wait = (boundary - self.adjusted_now()).min(1.);
			if wait <= 0. {
				debug!("second boundary passed while building the schedule, rebuilding");
				continue;
			}
			debug!(symbols = queue.len(), wait, "schedule ready");
			return self.sleep(Duration::from_secs_f64(wait)).then_some(queue);
		}
	}

	/// Feed the stream until it finishes or the cancellation flag is raised.
	fn feed<S: OutputStream>(&self, feeder: &mut Feeder, stream: &S) -> Result<Outcome, AudioError> {
		loop {
			if self.cancelled() {
				return Ok(Outcome::Cancelled);
			}
			if !stream.is_active() {
				let buffer = feeder.buffer();
				return if buffer.is_closed() && buffer.buffered() == 0 {
					Ok(Outcome::Completed)
				} else {
					Err(AudioError::Interrupted)
				};
			}
			feeder.tick();
			let underruns = feeder.buffer().take_underruns();
			if underruns > 0 {
				warn!(underruns, "audio buffer underrun");
			}
			thread::sleep(self.feed_interval);
		}
	}

	/// Run the transmission to completion.
	///
	/// Blocks until every scheduled symbol has been played, the cancellation flag is raised, or the
	/// output fails.
	///
	/// # Errors
	///
	/// Returns [`TransmitError::Config`] if the configuration is invalid, and
	/// [`TransmitError::Audio`] if the device could not be opened or failed while streaming. The
	/// state is [`State::Stopped`] afterwards in every case.
	pub fn run(&mut self) -> Result<Outcome, TransmitError> {
		self.set_state(State::Idle);
		if let Err(e) = self.config.validate() {
			self.set_state(State::Stopped);
			return Err(e.into());
		}
		let tones = Arc::new(ToneBank::new(self.config.carrier.hz(), self.config.sample_rate));

		self.set_state(State::Aligning);
		let Some(queue) = self.align() else {
			self.set_state(State::Stopped);
			return Ok(Outcome::Cancelled);
		};

		self.set_state(State::Streaming);
		let buffer = Arc::new(StreamBuffer::new());
		let mut feeder = Feeder::new(buffer.clone(), tones, queue, self.lead);
		feeder.tick();

		let format = StreamFormat::mono(self.config.sample_rate);
		let mut stream = match self.device.open(format, Box::new(move |out: &mut [u8]| buffer.pull(out))) {
			Ok(s) => s,
			Err(e) => {
				self.set_state(State::Stopped);
				return Err(e.into());
			}
		};
		info!(minutes = self.config.duration_minutes, "transmission started");

		let result = self.feed(&mut feeder, &stream);

		self.set_state(State::Draining);
		let stopped = stream.stop();
		let closed = stream.close();
		self.set_state(State::Stopped);

		let outcome = result?;
		stopped?;
		closed?;
		Ok(outcome)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audio::PullCallback;
	use crate::config::Carrier;
	use crate::feeder::PullStatus;
	use parking_lot::Mutex;
	use std::thread::JoinHandle;

	const SAMPLE_RATE: u32 = 100;

	/// Jan 1, 2024. 00:00:00.99 UTC
	const START: f64 = 1704067200.99;

	struct FixedClock(f64);

	impl Clock for FixedClock {
		fn now(&self) -> f64 {
			self.0
		}
	}

	#[derive(Clone, Copy, PartialEq)]
	enum Mode {
		Normal,
		FailOpen,
		Die
	}

	struct MockDevice {
		mode: Mode,
		pull_size: usize,
		captured: Arc<Mutex<Vec<u8>>>,
		events: Arc<Mutex<Vec<&'static str>>>,
		format: Option<StreamFormat>
	}

	impl MockDevice {
		fn new(mode: Mode) -> MockDevice {
			MockDevice {
				mode,
				pull_size: 64,
				captured: Default::default(),
				events: Default::default(),
				format: None
			}
		}
	}

	struct MockStream {
		active: Arc<AtomicBool>,
		halt: Arc<AtomicBool>,
		handle: Option<JoinHandle<()>>,
		events: Arc<Mutex<Vec<&'static str>>>
	}

	impl OutputDevice for MockDevice {
		type Stream = MockStream;

		fn open(&mut self, format: StreamFormat, mut callback: PullCallback) -> Result<MockStream, AudioError> {
			if self.mode == Mode::FailOpen {
				return Err(AudioError::Other(String::from("no device")));
			}
			self.format = Some(format);
			self.events.lock().push("open");

			let active = Arc::new(AtomicBool::new(self.mode == Mode::Normal));
			let halt = Arc::new(AtomicBool::new(false));
			let (a, h, captured, size) = (active.clone(), halt.clone(), self.captured.clone(), self.pull_size);
			let handle = thread::spawn(move || {
				let mut scratch = vec![0; size];
				while a.load(Ordering::Acquire) && !h.load(Ordering::Acquire) {
					let (n, status) = callback(&mut scratch[..]);
					captured.lock().extend_from_slice(&scratch[..n]);
					if status == PullStatus::Complete {
						a.store(false, Ordering::Release);
					}
					thread::sleep(Duration::from_millis(1));
				}
			});
			Ok(MockStream { active, halt, handle: Some(handle), events: self.events.clone() })
		}
	}

	impl OutputStream for MockStream {
		fn is_active(&self) -> bool {
			self.active.load(Ordering::Acquire)
		}

		fn stop(&mut self) -> Result<(), AudioError> {
			self.halt.store(true, Ordering::Release);
			self.events.lock().push("stop");
			Ok(())
		}

		fn close(mut self) -> Result<(), AudioError> {
			if let Some(h) = self.handle.take() {
				h.join().map_err(|_| AudioError::Other(String::from("pull thread panicked")))?;
			}
			self.events.lock().push("close");
			Ok(())
		}
	}

	fn config(minutes: u32) -> Config {
		Config {
			sample_rate: SAMPLE_RATE,
			duration_minutes: minutes,
			local_offset_seconds: 9 * 3600,
			manual_delta_millis: 0,
			carrier: Carrier::Subharmonic
		}
	}

	fn transmitter(config: Config, device: MockDevice, cancel: Arc<AtomicBool>)
		-> Transmitter<MockDevice, FixedClock>
	{
		Transmitter::new(config, device, FixedClock(START), cancel)
			.with_pacing(Duration::from_millis(1), DEFAULT_LEAD)
	}

	#[test]
	fn complete_transmission_test() {
		let device = MockDevice::new(Mode::Normal);
		let (captured, events) = (device.captured.clone(), device.events.clone());
		let mut t = transmitter(config(1), device, Arc::new(AtomicBool::new(false)));
		assert_eq!(t.state(), State::Idle);

		assert_eq!(t.run().ok(), Some(Outcome::Completed));
		assert_eq!(t.state(), State::Stopped);
		assert_eq!(*events.lock(), vec!["open", "stop", "close"]);
		assert_eq!(t.device.format, Some(StreamFormat::mono(SAMPLE_RATE)));

		// The rest of 09:00 JST after second 0, then all of 09:01
		let tones = ToneBank::new(Carrier::Subharmonic.hz(), SAMPLE_RATE);
		let symbols = schedule(&normalize(START, 9 * 3600, 0), 1);
		assert_eq!(symbols.len(), 59 + 60);
		let expected: Vec<u8> = symbols.iter().flat_map(|&s| tones.chunk(s).iter().copied()).collect();
		let captured = captured.lock();
		assert_eq!(captured.len(), expected.len());
		assert!(*captured == expected);
	}

	#[test]
	fn cancel_while_streaming_test() {
		let device = MockDevice::new(Mode::Normal);
		let (captured, events) = (device.captured.clone(), device.events.clone());
		let cancel = Arc::new(AtomicBool::new(false));
		let mut t = transmitter(config(10), device, cancel.clone());

		let c = cancel.clone();
		let canceller = thread::spawn(move || {
			thread::sleep(Duration::from_millis(100));
			c.store(true, Ordering::Release);
		});

		assert_eq!(t.run().ok(), Some(Outcome::Cancelled));
		canceller.join().unwrap();
		assert_eq!(t.state(), State::Stopped);
		assert_eq!(*events.lock(), vec!["open", "stop", "close"]);
		assert!(captured.lock().len() < tones_len(10));
	}

	fn tones_len(minutes: usize) -> usize {
		(59 + 60 * minutes) * SAMPLE_RATE as usize * 2
	}

	#[test]
	fn cancel_while_aligning_test() {
		let device = MockDevice::new(Mode::Normal);
		let events = device.events.clone();
		let mut t = transmitter(config(1), device, Arc::new(AtomicBool::new(true)));
		assert_eq!(t.run().ok(), Some(Outcome::Cancelled));
		assert_eq!(t.state(), State::Stopped);
		assert!(events.lock().is_empty());
	}

	#[test]
	fn open_failure_test() {
		let device = MockDevice::new(Mode::FailOpen);
		let events = device.events.clone();
		let mut t = transmitter(config(1), device, Arc::new(AtomicBool::new(false)));
		assert!(matches!(t.run(), Err(TransmitError::Audio(AudioError::Other(_)))));
		assert_eq!(t.state(), State::Stopped);
		assert!(events.lock().is_empty());
	}

	#[test]
	fn device_failure_test() {
		let device = MockDevice::new(Mode::Die);
		let events = device.events.clone();
		let mut t = transmitter(config(1), device, Arc::new(AtomicBool::new(false)));
		assert!(matches!(t.run(), Err(TransmitError::Audio(AudioError::Interrupted))));
		assert_eq!(t.state(), State::Stopped);
		assert_eq!(*events.lock(), vec!["open", "stop", "close"]);
	}

	#[test]
	fn invalid_config_test() {
		let device = MockDevice::new(Mode::Normal);
		let events = device.events.clone();
		let mut t = transmitter(Config { sample_rate: 0, ..config(1) }, device, Arc::new(AtomicBool::new(false)));
		assert!(matches!(
			t.run(),
			Err(TransmitError::Config(crate::error::ConfigError::InvalidSampleRate(0)))
		));
		assert_eq!(t.state(), State::Stopped);
		assert!(events.lock().is_empty());
	}

	#[test]
	fn oversized_config_test() {
		// Rejected before the tone bank or the schedule is allocated
		let device = MockDevice::new(Mode::Normal);
		let events = device.events.clone();
		let huge = Config { duration_minutes: u32::MAX, sample_rate: u32::MAX, ..config(1) };
		let mut t = transmitter(huge, device, Arc::new(AtomicBool::new(false)));
		assert!(matches!(
			t.run(),
			Err(TransmitError::Config(crate::error::ConfigError::SampleRateTooHigh(u32::MAX)))
		));

		let device = MockDevice::new(Mode::Normal);
		let mut t = transmitter(
			Config { duration_minutes: u32::MAX, ..config(1) },
			device,
			Arc::new(AtomicBool::new(false))
		);
		assert!(matches!(
			t.run(),
			Err(TransmitError::Config(crate::error::ConfigError::DurationTooLong(u32::MAX)))
		));
		assert_eq!(t.state(), State::Stopped);
		assert!(events.lock().is_empty());
	}

	#[test]
	fn system_clock_test() {
		let a = SystemClock::default().now();
		let b = SystemClock::new(10.).now();
		assert!(a > 1.7e9);
		assert!(b - a > 9. && b - a < 11.);
	}
}
