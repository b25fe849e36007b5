//! JJY minute frames.
//!
//! A JJY frame is 60 symbols long, one per second, starting at the top of the minute. Seven
//! position markers split the minute into segments, and the calendar fields are scattered into
//! the slots between them MSB first. See [NICT's description] of the time code.
//!
//! Where each field lands is described by a [`Layout`] table rather than code, so the scatter
//! routine ([`Layout::build`]) is shared by any variant of the format. [`JJY40`] is the table used
//! for transmission.
//!
//! [NICT's description]: https://www.nict.go.jp/en/sts/jjy_signal.html

use crate::bcd::parity;
use crate::fields::TimeFields;
use crate::Symbol;
use std::collections::VecDeque;
use std::ops::Index;

/// Number of symbols (seconds) per frame.
pub const FRAME_LEN: usize = 60;

/// Calendar fields that can be placed in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
	/// [`TimeFields::minute_bcd`]
	Minute,
	/// [`TimeFields::hour_bcd`]
	Hour,
	/// [`TimeFields::yday_bcd`]
	YearDay,
	/// [`TimeFields::year_bcd`]
	Year,
	/// [`TimeFields::weekday`]
	Weekday
}

impl Field {
	/// Read the raw value of this field from `fields`.
	#[inline(always)]
	fn value(self, fields: &TimeFields) -> u16 {
		match self {
			Field::Minute => fields.minute_bcd as u16,
			Field::Hour => fields.hour_bcd as u16,
			Field::YearDay => fields.yday_bcd,
			Field::Year => fields.year_bcd,
			Field::Weekday => fields.weekday as u16
		}
	}
}

/// Placement of one field: the frame positions of its bits, MSB first.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
	/// The field to place.
	pub field: Field,
	/// Frame positions, most significant bit first. The field is truncated to this many bits.
	pub positions: &'static [usize]
}

/// A frame format: where markers, data bits and parity bits go.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
	/// Positions that always carry [`Symbol::Marker`].
	pub markers: &'static [usize],
	/// Data fields, scattered MSB first.
	pub fields: &'static [Placement],
	/// Positions that carry the even parity of a field's value.
	pub parity: &'static [(usize, Field)]
}

/// The JJY40 time code format.
///
/// | Field             | Positions (MSB → LSB)              |
/// | ----------------- | ---------------------------------- |
/// | minute (7 bits)   | 1, 2, 3, 5, 6, 7, 8                |
/// | hour (6 bits)     | 12, 13, 15, 16, 17, 18             |
/// | day of year (10)  | 22, 23, 25, 26, 27, 28, 30-33      |
/// | year (8 bits)     | 41-48                              |
/// | weekday (3 bits)  | 50, 51, 52                         |
/// | hour parity       | 36                                 |
/// | minute parity     | 37                                 |
///
/// Markers sit on seconds 0, 9, 19, 29, 39, 49 and 59. Every other position is zero.
pub const JJY40: Layout = Layout {
	markers: &[0, 9, 19, 29, 39, 49, 59],
	fields: &[
		Placement { field: Field::Minute, positions: &[1, 2, 3, 5, 6, 7, 8] },
		Placement { field: Field::Hour, positions: &[12, 13, 15, 16, 17, 18] },
		Placement { field: Field::YearDay, positions: &[22, 23, 25, 26, 27, 28, 30, 31, 32, 33] },
		Placement { field: Field::Year, positions: &[41, 42, 43, 44, 45, 46, 47, 48] },
		Placement { field: Field::Weekday, positions: &[50, 51, 52] }
	],
	parity: &[(36, Field::Hour), (37, Field::Minute)]
};

impl Layout {
	/// Build the frame for `fields` according to this layout.
	///
	/// Positions are filled in three passes: zeros everywhere, then data and parity bits, then
	/// markers, so a marker always wins over any other entry at the same position.
	pub fn build(&self, fields: &TimeFields) -> Frame {
		let mut symbols = [Symbol::Zero; FRAME_LEN];

		for placement in self.fields {
			let value = placement.field.value(fields);
			let n = placement.positions.len();
			for (offset, &pos) in placement.positions.iter().enumerate() {
				symbols[pos] = Symbol::from_bit((value >> (n - 1 - offset)) & 1 == 1);
			}
		}

		for &(pos, field) in self.parity {
			symbols[pos] = Symbol::from_bit(parity(field.value(fields) as u32) == 1);
		}

		for &pos in self.markers {
			symbols[pos] = Symbol::Marker;
		}

		Frame(symbols)
	}
}

/// One minute of JJY symbols.
///
/// Index `i` is the symbol transmitted during second `i` of the minute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame([Symbol; FRAME_LEN]);

impl Frame {
	/// All 60 symbols.
	#[inline(always)]
	pub fn symbols(&self) -> &[Symbol; FRAME_LEN] {
		&self.0
	}

	/// The symbols still to be transmitted after `second` has started, i.e. `frame[second+1..]`.
	///
	/// Returns an empty slice for `second >= 59`.
	pub fn remaining_after(&self, second: u8) -> &[Symbol] {
		let start = (second as usize + 1).min(FRAME_LEN);
		&self.0[start..]
	}
}

impl Index<usize> for Frame {
	type Output = Symbol;

	fn index(&self, index: usize) -> &Self::Output {
		&self.0[index]
	}
}

/// Build the JJY40 frame for `fields`.
///
/// # Examples
///
/// ```
/// # use jjy::{build_frame, normalize, Symbol};
/// // Jan 1, 2024. 09:00:00 JST
/// let frame = build_frame(&normalize(1704067200.0, 32400, 0));
/// // Hour 09 => 00 1001 on positions 12, 13, 15, 16, 17, 18
/// assert_eq!(frame[15], Symbol::One);
/// assert_eq!(frame[18], Symbol::One);
/// ```
#[inline(always)]
pub fn build_frame(fields: &TimeFields) -> Frame {
	JJY40.build(fields)
}

/// Build the queue of symbols to transmit, starting right after the current second.
///
/// The queue holds the rest of the minute `fields` belongs to, followed by `minutes` complete
/// frames for the minutes after it.
///
/// # Examples
///
/// ```
/// # use jjy::{normalize, schedule};
/// // 10 seconds into the minute, then 2 more minutes
/// let fields = normalize(1704067210.0, 0, 0);
/// assert_eq!(schedule(&fields, 2).len(), 49 + 120);
/// ```
pub fn schedule(fields: &TimeFields, minutes: u32) -> VecDeque<Symbol> {
	let current = build_frame(fields);
	let rest = current.remaining_after(fields.second);
	let mut queue = VecDeque::with_capacity(rest.len() + minutes as usize * FRAME_LEN);
	queue.extend(rest.iter().copied());

	let mut minute = fields.minute_start();
	for _ in 0..minutes {
		minute = minute.saturating_add(60);
		queue.extend(build_frame(&TimeFields::from_local_seconds(minute)).symbols().iter().copied());
	}
	queue
}
