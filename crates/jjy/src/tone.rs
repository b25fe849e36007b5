//! Tone synthesis for JJY symbols.
//!
//! JJY is amplitude modulated: every second starts at full power and drops to 10% power after a
//! symbol-dependent time (200 ms for a marker, 500 ms for a one, 800 ms for a zero). This module
//! renders one second of that envelope over a sine carrier as signed 16-bit little-endian mono
//! PCM.
//!
//! Common audio hardware cannot produce a clean 40 kHz tone, but it can produce a tone whose odd
//! harmonics land on 40 kHz. [`JJY40_SUBHARMONIC_HZ`] is the third subharmonic of the JJY40
//! carrier and is the default choice; [`JJY40_HZ`] renders the carrier itself for output chains
//! fast enough to reproduce it.

use crate::Symbol;
use std::f64::consts::PI;

/// The JJY40 transmitter carrier frequency, in Hz.
pub const JJY40_HZ: f64 = 40000.0;

/// One third of the JJY40 carrier, in Hz. Its third harmonic is exactly [`JJY40_HZ`].
pub const JJY40_SUBHARMONIC_HZ: f64 = JJY40_HZ / 3.0;

/// Amplitude multiplier for the reduced-power part of each second.
const REDUCED_POWER: f64 = 0.1;

/// Maximum gain applied when quantizing to 16 bits.
const FULL_SCALE: f64 = 32767.0;

/// Bytes per sample (signed 16-bit).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Synthesize one second of PCM for `symbol`.
///
/// Sample `k` is `sin(2π·k·carrier_hz/sample_rate)`, reduced to 10% once `k` passes the symbol's
/// full-power duration, scaled by 32767 and truncated to `i16`. The result holds `sample_rate`
/// samples encoded little-endian, i.e. `2 * sample_rate` bytes.
///
/// # Examples
///
/// ```
/// # use jjy::{synthesize, Symbol, JJY40_SUBHARMONIC_HZ};
/// let pcm = synthesize(Symbol::Marker, JJY40_SUBHARMONIC_HZ, 48000);
/// assert_eq!(pcm.len(), 96000);
/// ```
pub fn synthesize(symbol: Symbol, carrier_hz: f64, sample_rate: u32) -> Vec<u8> {
	let full_power = sample_rate as u64 * symbol.full_power_tenths() / 10;
	let step = 2. * PI * carrier_hz / sample_rate as f64;

	let mut pcm = Vec::with_capacity(sample_rate as usize * BYTES_PER_SAMPLE);
	for k in 0..sample_rate as u64 {
		let mut v = (step * k as f64).sin();
		if k > full_power {
			v *= REDUCED_POWER;
		}
		pcm.extend_from_slice(&((v * FULL_SCALE) as i16).to_le_bytes());
	}
	pcm
}

/// Precomputed one-second PCM chunks for every [`Symbol`].
///
/// Synthesis runs once per symbol when the bank is created, after which the chunks are only read.
#[derive(Clone, Debug)]
pub struct ToneBank {
	chunks: [Vec<u8>; 3],
	carrier_hz: f64,
	sample_rate: u32
}

impl ToneBank {
	/// Synthesize the chunks for `carrier_hz` at `sample_rate`.
	pub fn new(carrier_hz: f64, sample_rate: u32) -> ToneBank {
		ToneBank {
			chunks: Symbol::ALL.map(|s| synthesize(s, carrier_hz, sample_rate)),
			carrier_hz,
			sample_rate
		}
	}

	/// One second of PCM for `symbol`.
	#[inline(always)]
	pub fn chunk(&self, symbol: Symbol) -> &[u8] {
		&self.chunks[symbol.index()]
	}

	/// Length in bytes of every chunk.
	#[inline(always)]
	pub fn chunk_len(&self) -> usize {
		self.sample_rate as usize * BYTES_PER_SAMPLE
	}

	/// The carrier frequency the bank was synthesized with.
	pub fn carrier_hz(&self) -> f64 {
		self.carrier_hz
	}

	/// The sample rate the bank was synthesized with.
	pub fn sample_rate(&self) -> u32 {
		self.sample_rate
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	fn samples(pcm: &[u8]) -> Vec<i16> {
		pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
	}

	fn peak(samples: &[i16]) -> i32 {
		samples.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
	}

	#[test]
	fn constants_test() {
		assert_relative_eq!(JJY40_SUBHARMONIC_HZ * 3., JJY40_HZ);
		assert_relative_eq!(JJY40_SUBHARMONIC_HZ, 13333.333333333334);
	}

	#[test]
	fn length_test() {
		for sr in [8000, 44100, 48000, 96000] {
			for s in Symbol::ALL {
				let pcm = synthesize(s, JJY40_SUBHARMONIC_HZ, sr);
				assert_eq!(pcm.len(), sr as usize * 2);
				assert_eq!(samples(&pcm).len(), sr as usize);
			}
		}
	}

	#[test]
	fn envelope_test() {
		let sr = 48000;
		for (s, full) in [(Symbol::Marker, 9600), (Symbol::One, 24000), (Symbol::Zero, 38400)] {
			let x = samples(&synthesize(s, JJY40_SUBHARMONIC_HZ, sr));
			// Sample `full` itself is still at full power
			assert!(peak(&x[..=full]) > 32000, "{:?} full power peak", s);
			let low = peak(&x[full + 1..]);
			assert!(low <= 3277, "{:?} reduced power peak {}", s, low);
			assert!(low > 3000, "{:?} reduced power peak {}", s, low);
		}
	}

	#[test]
	fn attenuation_test() {
		// At 48 kHz the subharmonic carrier repeats exactly every 18 samples (5 cycles), so samples
		// 18 apart share the same phase.
		let sr = 48000;
		let x = samples(&synthesize(Symbol::Zero, JJY40_SUBHARMONIC_HZ, sr));
		let last = sr as usize - 1;
		let reference = last - 18 * 1000;
		assert!(reference < 38400);
		let (a, b) = ((x[last] as i32).abs(), (x[reference] as i32).abs());
		assert!(a <= b / 10 + 1, "attenuated {} vs full {}", a, b);

		for k in 38401..sr as usize {
			let r = k - 18 * ((k - 38401) / 18 + 1);
			let (a, b) = ((x[k] as i32).abs(), (x[r] as i32).abs());
			assert!(a <= b / 10 + 1, "sample {}: attenuated {} vs full {} at {}", k, a, b, r);
		}
	}

	#[test]
	fn carrier_test() {
		// A 1 kHz carrier at 8 kHz has a known sample sequence
		let x = samples(&synthesize(Symbol::Marker, 1000., 8000));
		assert_eq!(x[0], 0);
		assert_eq!(x[1], 23169);
		assert_eq!(x[2], 32767);
		assert_eq!(x[3], 23169);
		assert!(x[4].abs() <= 1);
		assert_eq!(x[6], -32767);
	}

	#[test]
	fn deterministic_test() {
		let a = synthesize(Symbol::One, JJY40_HZ, 192000);
		let b = synthesize(Symbol::One, JJY40_HZ, 192000);
		assert_eq!(a, b);
	}

	#[test]
	fn tone_bank_test() {
		let bank = ToneBank::new(JJY40_SUBHARMONIC_HZ, 8000);
		assert_eq!(bank.chunk_len(), 16000);
		assert_eq!(bank.sample_rate(), 8000);
		assert_relative_eq!(bank.carrier_hz(), JJY40_SUBHARMONIC_HZ);
		for s in Symbol::ALL {
			assert_eq!(bank.chunk(s), synthesize(s, JJY40_SUBHARMONIC_HZ, 8000).as_slice());
			assert_eq!(bank.chunk(s).len(), bank.chunk_len());
		}
		assert_ne!(bank.chunk(Symbol::Zero), bank.chunk(Symbol::One));
		assert_ne!(bank.chunk(Symbol::One), bank.chunk(Symbol::Marker));
	}
}
