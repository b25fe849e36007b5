//! Error types used across modules.
//!
//! This module contains the error types that may be created and used within this crate. See
//! individual error types for documentation.

use thiserror::Error;

/// The error type for validating a transmission [`Config`](crate::config::Config).
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
	/// The sample rate must be greater than zero. The supplied rate is provided in the payload.
	#[error("Invalid sample rate: {0} Hz")]
	InvalidSampleRate(u32),
	/// The sample rate must not exceed [`MAX_SAMPLE_RATE`](crate::config::MAX_SAMPLE_RATE). The
	/// supplied rate is provided in the payload.
	#[error("Sample rate too high: {0} Hz")]
	SampleRateTooHigh(u32),
	/// The duration must be at least one minute. The supplied duration is provided in the payload.
	#[error("Invalid duration: {0} minutes")]
	InvalidDuration(u32),
	/// The duration must not exceed [`MAX_DURATION_MINUTES`](crate::config::MAX_DURATION_MINUTES).
	/// The supplied duration is provided in the payload.
	#[error("Duration too long: {0} minutes")]
	DurationTooLong(u32),
	/// The local offset must be within +-24 hours. The supplied offset (in seconds) is provided in
	/// the payload.
	#[error("Unsupported local timezone offset: {0} seconds")]
	OffsetOutOfRange(i64),
	/// The manual delta must be within +-1 hour. The supplied delta (in milliseconds) is provided in
	/// the payload.
	#[error("Unsupported manual delta: {0} ms")]
	DeltaOutOfRange(i64),
	/// The carrier frequency must be positive and finite. The supplied frequency is provided in the
	/// payload.
	#[error("Invalid carrier frequency: {0} Hz")]
	InvalidCarrier(f64)
}

/// The error type for audio output.
#[derive(Error, Debug)]
pub enum AudioError {
	/// No default output device is available.
	#[error("Failed to get default audio output device")]
	NoDevice,
	/// The output stream could not be built.
	#[error("Failed to build audio stream: {0}")]
	Build(#[from] cpal::BuildStreamError),
	/// The output stream could not be started.
	#[error("Failed to start audio stream: {0}")]
	Play(#[from] cpal::PlayStreamError),
	/// The output stream could not be stopped.
	#[error("Failed to stop audio stream: {0}")]
	Pause(#[from] cpal::PauseStreamError),
	/// The stream stopped before every byte was played, e.g. after a device error.
	#[error("Audio stream stopped before transmission completed")]
	Interrupted,
	/// Error from a non-cpal output implementation.
	#[error("Audio output error: {0}")]
	Other(String)
}

/// The error type for a transmission attempt.
#[derive(Error, Debug)]
pub enum TransmitError {
	/// The configuration was rejected before transmission started.
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	/// The audio output failed.
	#[error("Audio error: {0}")]
	Audio(#[from] AudioError)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_test() {
		assert_eq!(ConfigError::InvalidSampleRate(0).to_string(), "Invalid sample rate: 0 Hz");
		assert_eq!(ConfigError::SampleRateTooHigh(384001).to_string(), "Sample rate too high: 384001 Hz");
		assert_eq!(ConfigError::DurationTooLong(1381).to_string(), "Duration too long: 1381 minutes");
		assert_eq!(
			TransmitError::from(ConfigError::InvalidDuration(0)).to_string(),
			"Configuration error: Invalid duration: 0 minutes"
		);
		assert_eq!(
			TransmitError::from(AudioError::NoDevice).to_string(),
			"Audio error: Failed to get default audio output device"
		);
	}
}
