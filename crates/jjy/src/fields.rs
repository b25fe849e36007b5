//! Normalization of timestamps into the fields JJY transmits.

use crate::bcd::pack;
use time::Tm;

/// Milliseconds per second.
const MILLIS_PER_SECOND: f64 = 1000.0;

/// The minimal set of calendar fields needed to build one JJY frame.
///
/// All `*_bcd` fields are packed binary-coded decimal (see [`crate::bcd`]), while `second` and
/// `weekday` are plain integers.
///
/// # Examples
///
/// ```
/// # use jjy::fields::TimeFields;
/// // Sat, July 4, 2020. 11:36:58 (already shifted to local time)
/// let f = TimeFields::from_local_seconds(1593862618);
/// assert_eq!(f.minute_bcd, 0x36);
/// assert_eq!(f.hour_bcd, 0x11);
/// assert_eq!(f.yday_bcd, 0x186);
/// assert_eq!(f.year_bcd, 0x20);
/// assert_eq!(f.second, 58);
/// assert_eq!(f.weekday, 6); // Saturday
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeFields {
	/// Two-digit year (year mod 100), packed BCD.
	pub year_bcd: u16,
	/// Day of the year, 1-indexed, packed BCD.
	pub yday_bcd: u16,
	/// Hour of the day, packed BCD.
	pub hour_bcd: u8,
	/// Minute of the hour, packed BCD.
	pub minute_bcd: u8,
	/// Second of the minute, ranged [0, 59].
	pub second: u8,
	/// Day of the week, ranged [0, 6] => [Sunday, Saturday].
	pub weekday: u8,
	/// The adjusted timestamp these fields were computed from, floored to whole seconds.
	pub unix_seconds: i64
}

impl TimeFields {
	/// Compute the fields for a timestamp that already includes the local offset.
	///
	/// The calendar conversion accepts every `i64`, so this function cannot fail.
	pub fn from_local_seconds(seconds: i64) -> TimeFields {
		let tm = Tm::new(seconds);
		// Tm keeps every field below 1000, which is all `to_bcd` would check
		TimeFields {
			year_bcd: pack(tm.year.rem_euclid(100) as u16),
			yday_bcd: pack(tm.yday),
			hour_bcd: pack(tm.hour as u16) as u8,
			minute_bcd: pack(tm.min as u16) as u8,
			second: tm.sec,
			// The calendar counts from Monday, JJY counts from Sunday
			weekday: (tm.weekday + 1) % 7,
			unix_seconds: seconds
		}
	}

	/// Start of the minute these fields belong to, in adjusted seconds.
	#[inline(always)]
	pub fn minute_start(&self) -> i64 {
		self.unix_seconds - self.second as i64
	}
}

/// Normalize a corrected Unix timestamp into [`TimeFields`].
///
/// The transmitted time is `unix_seconds + local_offset_seconds + manual_delta_millis / 1000`,
/// interpreted as UTC calendar time. Non-finite inputs saturate like any `f64` to `i64` cast.
///
/// # Examples
///
/// ```
/// # use jjy::fields::normalize;
/// // Jan 1, 2024. 00:00:00 UTC, transmitted as JST (UTC+9)
/// let f = normalize(1704067200.0, 32400, 0);
/// assert_eq!(f.hour_bcd, 0x09);
/// assert_eq!(f.minute_bcd, 0x00);
/// assert_eq!(f.yday_bcd, 0x001);
/// assert_eq!(f.year_bcd, 0x24);
/// assert_eq!(f.weekday, 1); // Monday
/// ```
pub fn normalize(unix_seconds: f64, local_offset_seconds: i64, manual_delta_millis: i64) -> TimeFields {
	let adjusted = unix_seconds
		+ local_offset_seconds as f64
		+ manual_delta_millis as f64 / MILLIS_PER_SECOND;
	TimeFields::from_local_seconds(adjusted.floor() as i64)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bcd::to_bcd;

	#[test]
	fn checked_bcd_test() {
		// Every field agrees with the range-checked conversion, including before the epoch
		for t in (-3_000_000_000i64..4_000_000_000).step_by(7_919_993) {
			let f = TimeFields::from_local_seconds(t);
			let tm = Tm::new(t);
			assert_eq!(Ok(f.year_bcd), to_bcd(tm.year.rem_euclid(100)), "year at {}", t);
			assert_eq!(Ok(f.yday_bcd), to_bcd(tm.yday as i64), "yday at {}", t);
			assert_eq!(Ok(f.hour_bcd as u16), to_bcd(tm.hour as i64), "hour at {}", t);
			assert_eq!(Ok(f.minute_bcd as u16), to_bcd(tm.min as i64), "minute at {}", t);
		}
	}

	#[test]
	fn known_vector_test() {
		// Jan 1, 2024. 00:00:00 UTC => 09:00:00 JST
		let f = normalize(1704067200.0, 32400, 0);
		assert_eq!(f, TimeFields {
			year_bcd: 0x24,
			yday_bcd: 0x001,
			hour_bcd: 0x09,
			minute_bcd: 0x00,
			second: 0,
			weekday: 1,
			unix_seconds: 1704099600
		});
	}

	#[test]
	fn jst_test() {
		// Fri, Jun 10 2016 08:15:18 UTC => 17:15:18 JST
		let f = normalize(1465546518.0, 32400, 0);
		assert_eq!(f.minute_bcd, 0x15);
		assert_eq!(f.hour_bcd, 0x17);
		assert_eq!(f.yday_bcd, 0x162);
		assert_eq!(f.year_bcd, 0x16);
		assert_eq!(f.second, 18);
		assert_eq!(f.weekday, 5);
		assert_eq!(f.minute_start(), 1465578900);
	}

	#[test]
	fn weekday_remap_test() {
		// Sun, Jan 7, 2024
		assert_eq!(TimeFields::from_local_seconds(1704585600).weekday, 0);
		// Mon, Jan 8, 2024
		assert_eq!(TimeFields::from_local_seconds(1704672000).weekday, 1);
		// Sat, Jan 6, 2024
		assert_eq!(TimeFields::from_local_seconds(1704499200).weekday, 6);
	}

	#[test]
	fn delta_test() {
		// A delta rolls the transmitted time over to the next second and minute
		let f = normalize(1704067259.5, 0, 600);
		assert_eq!(f.second, 0);
		assert_eq!(f.minute_bcd, 0x01);
		assert_eq!(f.unix_seconds, 1704067260);

		// Negative deltas move backwards
		let f = normalize(1704067200.2, 0, -400);
		assert_eq!(f.second, 59);
		assert_eq!(f.hour_bcd, 0x23);
		assert_eq!(f.yday_bcd, 0x365);
		assert_eq!(f.year_bcd, 0x23);
	}

	#[test]
	fn negative_offset_test() {
		// Jan 1, 2024. 02:00:00 UTC at UTC-5 is still 2023
		let f = normalize(1704074400.0, -18000, 0);
		assert_eq!(f.hour_bcd, 0x21);
		assert_eq!(f.yday_bcd, 0x365);
		assert_eq!(f.year_bcd, 0x23);
		assert_eq!(f.weekday, 0); // Sunday
	}

	#[test]
	fn leap_year_test() {
		// Dec 31, 2024 is day 366
		let f = normalize(1735603200.0, 0, 0);
		assert_eq!(f.yday_bcd, 0x366);
	}

	#[test]
	fn extreme_inputs_test() {
		for t in [f64::MIN, -1e300, -1.0, 0.0, 1e300, f64::MAX, f64::NAN, f64::INFINITY] {
			let f = normalize(t, 86400, i64::MAX);
			assert!(f.second < 60);
			assert!(f.weekday < 7);
			assert!(f.year_bcd <= 0x99);
		}
		let f = TimeFields::from_local_seconds(i64::MIN);
		assert!(f.weekday < 7);
	}
}
