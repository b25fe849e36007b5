//! Transmit the JJY40 time signal using simple audio output.
//!
//! This application encodes the current time as a [JJY] timecode and plays it through the
//! device's default audio output. Radio-controlled clocks listen on 40 kHz, so the tone is either
//! one third of that frequency (whose third harmonic lands on 40 kHz) or 40 kHz itself for output
//! chains fast enough to produce it. The clock picks up the stray RF radiated by the audio
//! hardware or by a coil attached to the output; the audible output itself is not useful.
//!
//! [JJY]: https://en.wikipedia.org/wiki/JJY
//!
//! # Command Line Arguments
//!
//! General form: `jjytx [options...]`
//!
//! | Short form | Long form       | Argument                      | Default       | Description                      |
//! | ---------- | --------------- | ----------------------------- | ------------- | -------------------------------- |
//! | `-t`       | `--duration`    | Integer 1-1380                | 240           | Minutes to transmit              |
//! | `-d`       | `--delta`       | Integer                       | 0             | Manual correction in ms          |
//! | `-o`       | `--tz-offset`   | Hours                         | 9             | Offset from UTC to transmit      |
//! | `-r`       | `--sample-rate` | Integer 1-384000              | 48000         | Output sample rate in Hz         |
//! | `-s`       | `--ntp-server`  | Hostname or IP                | None          | Use [NTP] to correct the clock   |
//! | `-n`       | `--ntp-version` | 1-4                           | 4             | NTP protocol version             |
//! | `-c`       | `--carrier`     | `subharmonic`, `fundamental`  | `subharmonic` | Carrier tone                     |
//! | `-v`       | `--verbose`     |                               |               | Debug logging                    |
//!
//! Transmission starts at the next second boundary and covers the rest of the current minute
//! followed by the requested number of whole minutes. Ctrl+C stops the transmission early.
//!
//! [NTP]: sntp
//!
//! # Examples
//!
//! Transmit Japan standard time for four hours using the local clock
//! ```sh
//! jjytx
//! ```
//!
//! Transmit for 10 minutes using NTP time, 300 ms late
//! ```sh
//! jjytx -t 10 -s ntp.nict.jp -d 300
//! ```
//!
//! Transmit the 40 kHz carrier directly at 192 kHz
//! ```sh
//! jjytx -r 192000 -c fundamental
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn, Level};

use args::{Arguments, ArgumentsError};
use audio::CpalDevice;
use transmit::{Clock, Outcome, SystemClock, Transmitter};

mod args;
mod audio;
mod config;
mod error;
mod feeder;
mod transmit;

const HELP: &str = "\
Transmit the JJY40 time signal for setting radio-controlled clocks with no extra hardware.

Usage: jjytx [OPTIONS]

Options:
  -t, --duration <MINUTES>     minutes to transmit (1-1380), default 240
  -d, --delta <MS>             manual clock correction in milliseconds, default 0
  -o, --tz-offset <HOURS>      offset from UTC to transmit, default 9 (JST)
  -r, --sample-rate <HZ>       output sample rate (up to 384000), default 48000
  -s, --ntp-server <SERVER>    the NTP server to use for time, default none
  -n, --ntp-version <VERSION>  NTP protocol version (1-4), default 4
  -c, --carrier <CARRIER>      subharmonic (40 kHz / 3) or fundamental (40 kHz), default subharmonic
  -v, --verbose                enable debug logging
  -h, --help                   print this help

Examples:
  jjytx
  jjytx -t 10 -s ntp.nict.jp -d 300
  jjytx -r 192000 -c fundamental\n";

/// Pick the clock correction, falling back to the local clock if NTP fails.
fn clock_offset(args: &Arguments) -> f64 {
	match &args.ntp_server {
		Some(server) => match sntp::clock_offset(server, args.ntp_version) {
			Ok(offset) => {
				info!(server = %server, offset, "using NTP time");
				offset
			},
			Err(e) => {
				warn!(server = %server, "NTP query failed, using local clock: {}", e);
				0.
			}
		},
		None => {
			info!("using local clock");
			0.
		}
	}
}

/// Transmit with the default audio output until done or interrupted.
fn play(args: Arguments) -> ExitCode {
	let config = args.config();
	let clock = SystemClock::new(clock_offset(&args));
	info!(
		unix_time = clock.now(),
		tz_offset_seconds = config.local_offset_seconds,
		delta_ms = config.manual_delta_millis,
		"fetched time"
	);

	let cancel = Arc::new(AtomicBool::new(false));
	let flag = cancel.clone();
	if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Release)) {
		warn!("Failed to install interrupt handler: {}", e);
	}

	let device = match CpalDevice::default_output() {
		Ok(d) => d,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::FAILURE;
		}
	};
	if let Some(name) = device.name() {
		info!(device = %name, "audio output");
	}

	info!(
		minutes = config.duration_minutes,
		carrier_hz = config.carrier.hz(),
		sample_rate = config.sample_rate,
		"transmitting JJY40"
	);
	match Transmitter::new(config, device, clock, cancel).run() {
		Ok(Outcome::Completed) => {
			info!("transmission complete");
			ExitCode::SUCCESS
		},
		Ok(Outcome::Cancelled) => {
			info!("interrupted by user");
			ExitCode::SUCCESS
		},
		Err(e) => {
			eprintln!("{}", e);
			ExitCode::FAILURE
		}
	}
}

/// Main program entry point.
///
/// Parses input arguments and plays time signal audio output. See [`crate`] documentation for
/// details.
fn main() -> ExitCode {
	let args = match Arguments::parse(std::env::args_os().skip(1)) {
		Ok(a) => a,
		Err(ArgumentsError::Help) => {
			println!("{}", HELP);
			return ExitCode::SUCCESS;
		},
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	tracing_subscriber::fmt()
		.with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
		.init();

	play(args)
}
