//! Encode civil time as the JJY40 time signal.
//!
//! This crate turns a corrected Unix timestamp into the 60-symbol minute frames broadcast by the
//! Japanese [JJY] longwave time signal, and renders each symbol as one second of 16-bit PCM audio.
//! Played through a speaker or an induction coil, the audio is close enough to the real carrier
//! for JJY40 radio-controlled clocks to synchronize.
//!
//! The pipeline is split into small, pure pieces:
//! - [`bcd`]: binary-coded decimal packing and even parity.
//! - [`fields`]: normalization of a timestamp into [`TimeFields`].
//! - [`frame`]: the bit layout table and the [`Frame`] builder.
//! - [`tone`]: tone synthesis and the [`ToneBank`] cache.
//!
//! [JJY]: https://en.wikipedia.org/wiki/JJY
//!
//! # Examples
//! ```
//! # use jjy::{normalize, build_frame, Symbol, ToneBank, JJY40_SUBHARMONIC_HZ};
//! // Jan 1, 2024. 00:00:30 UTC, transmitted as JST (UTC+9)
//! let fields = normalize(1704067230.0, 32400, 0);
//! let frame = build_frame(&fields);
//! assert_eq!(frame[0], Symbol::Marker);
//!
//! // One second of audio for every symbol left in this minute
//! let tones = ToneBank::new(JJY40_SUBHARMONIC_HZ, 48000);
//! let pcm: Vec<u8> = frame.remaining_after(fields.second)
//! 	.iter()
//! 	.flat_map(|s| tones.chunk(*s).iter().copied())
//! 	.collect();
//! assert_eq!(pcm.len(), 29 * 48000 * 2);
//! ```

pub mod bcd;
pub mod fields;
pub mod frame;
pub mod tone;

pub use bcd::{parity, to_bcd, DomainError};
pub use fields::{normalize, TimeFields};
pub use frame::{build_frame, schedule, Frame, Layout, JJY40};
pub use tone::{synthesize, ToneBank, JJY40_HZ, JJY40_SUBHARMONIC_HZ};

/// A single JJY symbol, transmitted over exactly one second.
///
/// The three symbols share the same carrier and differ only in how long the carrier stays at full
/// power before dropping to 10%.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
	/// Binary 0, 800 ms of full power.
	Zero,
	/// Binary 1, 500 ms of full power.
	One,
	/// Position marker, 200 ms of full power.
	Marker
}

impl Symbol {
	/// All symbols, in [`Symbol::index`] order.
	pub const ALL: [Symbol; 3] = [Symbol::Zero, Symbol::One, Symbol::Marker];

	/// Convert a single bit into [`Symbol::Zero`] or [`Symbol::One`].
	#[inline(always)]
	pub fn from_bit(bit: bool) -> Symbol {
		if bit { Symbol::One } else { Symbol::Zero }
	}

	/// Stable index of the symbol: 0 for `Zero`, 1 for `One`, 2 for `Marker`.
	#[inline(always)]
	pub fn index(self) -> usize {
		match self {
			Symbol::Zero => 0,
			Symbol::One => 1,
			Symbol::Marker => 2
		}
	}

	/// Full-power duration of the symbol, in tenths of a second.
	#[inline(always)]
	pub fn full_power_tenths(self) -> u64 {
		match self {
			Symbol::Marker => 2,
			Symbol::One => 5,
			Symbol::Zero => 8
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn symbol_test() {
		assert_eq!(Symbol::from_bit(false), Symbol::Zero);
		assert_eq!(Symbol::from_bit(true), Symbol::One);
		for (i, s) in Symbol::ALL.iter().enumerate() {
			assert_eq!(s.index(), i);
		}
		assert_eq!(Symbol::Marker.full_power_tenths(), 2);
		assert_eq!(Symbol::One.full_power_tenths(), 5);
		assert_eq!(Symbol::Zero.full_power_tenths(), 8);
	}

	#[test]
	fn module_doctest() {
		let fields = normalize(1704067230.0, 32400, 0);
		let frame = build_frame(&fields);
		assert_eq!(frame[0], Symbol::Marker);
		assert_eq!(frame.remaining_after(fields.second).len(), 29);
	}
}
