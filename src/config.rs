//! Transmission configuration.
//!
//! [`Config`] is the resolved record the transmitter runs from. It is built from command line
//! [`Arguments`](crate::args::Arguments) and checked once with [`Config::validate`] before any
//! audio is produced.

use std::str::FromStr;

use jjy::{JJY40_HZ, JJY40_SUBHARMONIC_HZ};
use tracing::warn;

use crate::args::ArgumentsError;
use crate::error::ConfigError;

/// Largest accepted local offset from UTC, in seconds.
pub const MAX_OFFSET_SECONDS: i64 = 24 * 3600;

/// Largest accepted sample rate, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384000;

/// Longest accepted transmission, in minutes (23 hours).
pub const MAX_DURATION_MINUTES: u32 = 23 * 60;

/// Largest accepted manual delta, in milliseconds.
pub const MAX_DELTA_MILLIS: i64 = 3600 * 1000;

/// Carrier tone choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Carrier {
	/// One third of 40 kHz. Its third harmonic lands on the JJY40 carrier.
	#[default]
	Subharmonic,
	/// 40 kHz itself. Needs a sample rate above 80 kHz.
	Fundamental
}

impl Carrier {
	/// The tone frequency in Hz.
	pub fn hz(self) -> f64 {
		match self {
			Carrier::Subharmonic => JJY40_SUBHARMONIC_HZ,
			Carrier::Fundamental => JJY40_HZ
		}
	}
}

impl FromStr for Carrier {
	type Err = ArgumentsError;

	/// Parse a carrier name, case insensitive.
	///
	/// # Examples
	///
	/// ```ignore
	/// assert_eq!(Carrier::from_str("subharmonic"), Ok(Carrier::Subharmonic));
	/// assert_eq!(Carrier::from_str("FUNDAMENTAL"), Ok(Carrier::Fundamental));
	/// ```
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"subharmonic" | "sub" => Ok(Carrier::Subharmonic),
			"fundamental" | "40k" => Ok(Carrier::Fundamental),
			_ => Err(ArgumentsError::InvalidCarrier(s.to_string()))
		}
	}
}

/// Resolved transmission settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
	/// Output sample rate in Hz.
	pub sample_rate: u32,
	/// Whole minutes to transmit after the current one.
	pub duration_minutes: u32,
	/// Offset added to UTC before encoding, in seconds. JST is `32400`.
	pub local_offset_seconds: i64,
	/// Manual correction added to the clock, in milliseconds.
	pub manual_delta_millis: i64,
	/// Carrier tone.
	pub carrier: Carrier
}

impl Default for Config {
	fn default() -> Config {
		Config {
			sample_rate: 48000,
			duration_minutes: 240,
			local_offset_seconds: 9 * 3600,
			manual_delta_millis: 0,
			carrier: Carrier::Subharmonic
		}
	}
}

impl Config {
	/// Check every field is in range.
	///
	/// A carrier at or above the Nyquist frequency is accepted (aliasing is sometimes the point) but
	/// logged as a warning.
	///
	/// # Errors
	///
	/// Returns the [`ConfigError`] for the first field found out of range.
	///
	/// # Examples
	///
	/// ```ignore
	/// assert!(Config::default().validate().is_ok());
	/// assert_eq!(
	/// 	Config { sample_rate: 0, ..Config::default() }.validate(),
	/// 	Err(ConfigError::InvalidSampleRate(0))
	/// );
	/// ```
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.sample_rate == 0 {
			return Err(ConfigError::InvalidSampleRate(self.sample_rate));
		}
		if self.sample_rate > MAX_SAMPLE_RATE {
			return Err(ConfigError::SampleRateTooHigh(self.sample_rate));
		}
		if self.duration_minutes < 1 {
			return Err(ConfigError::InvalidDuration(self.duration_minutes));
		}
		if self.duration_minutes > MAX_DURATION_MINUTES {
			return Err(ConfigError::DurationTooLong(self.duration_minutes));
		}
		if self.local_offset_seconds.abs() > MAX_OFFSET_SECONDS {
			return Err(ConfigError::OffsetOutOfRange(self.local_offset_seconds));
		}
		if self.manual_delta_millis.abs() > MAX_DELTA_MILLIS {
			return Err(ConfigError::DeltaOutOfRange(self.manual_delta_millis));
		}
		let hz = self.carrier.hz();
		if !hz.is_finite() || hz <= 0. {
			return Err(ConfigError::InvalidCarrier(hz));
		}
		if hz >= self.sample_rate as f64 / 2. {
			warn!(carrier_hz = hz, sample_rate = self.sample_rate, "carrier is at or above Nyquist");
		}
		Ok(())
	}
}
