//! Utilities for dealing with time (UTC and Unix timestamps), unaware of timezone.
//!
//! This module converts Unix timestamps into UTC calendar fields and, with the `now` feature,
//! reads the current system time with nanosecond granularity. The calendar functions do not rely
//! on libc's `gmtime`, so they are thread safe and accept every `i64` timestamp, including times
//! before the Unix epoch.
//!
//! # Examples
//!
//! ```
//! # use time::time::Tm;
//! let date = Tm::new(1718617807);
//! assert_eq!(date, Tm {
//! 	sec: 7,
//! 	min: 50,
//! 	hour: 9,
//! 	day: 17,
//! 	mon: 6,
//! 	year: 2024,
//! 	weekday: 0,
//! 	yday: 169
//! });
//! ```

#[cfg(feature = "now")]
use core::mem::MaybeUninit;
#[cfg(feature = "now")]
use libc::{timespec, clock_gettime, CLOCK_REALTIME};

/// Unix time with nanosecond granularity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSpec {
	/// Seconds since the Unix epoch
	pub sec: i64,
	/// Nanoseconds since the beginning of `sec`, ranging [0-999999999]
	pub nsec: i64
}

impl TimeSpec {
	/// Seconds since the Unix epoch as a floating point value, including the fractional part.
	///
	/// # Examples
	///
	/// ```
	/// # use time::time::TimeSpec;
	/// let t = TimeSpec { sec: 1704067200, nsec: 250000000 };
	/// assert_eq!(t.as_secs_f64(), 1704067200.25);
	/// ```
	pub fn as_secs_f64(&self) -> f64 {
		self.sec as f64 + self.nsec as f64 / 1e9
	}
}

#[cfg_attr(docsrs, doc(cfg(feature = "now")))]
#[cfg(feature = "now")]
impl From<timespec> for TimeSpec {
	/// Convert from `libc::timespec` to [`TimeSpec`].
	fn from(value: timespec) -> Self {
		TimeSpec {
			sec: value.tv_sec as i64,
			nsec: value.tv_nsec as i64
		}
	}
}

/// Get the current time as a Unix timestamp with nanosecond granularity.
///
/// This function will return `None` if `libc::clock_gettime` fails.
///
/// # Examples
///
/// ```
/// # use time::time::now;
/// let c = now().expect("Failed to get current time");
/// assert!(c.sec > 0);
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "now")))]
#[cfg(feature = "now")]
pub fn now() -> Option<TimeSpec> {
	let mut time = MaybeUninit::<timespec>::uninit();
	// Safety:
	// - clock_gettime does not read time, only writes
	// - if clock_gettime returns zero, time is successfully initialized
	unsafe {
		match clock_gettime(CLOCK_REALTIME, time.as_mut_ptr()) {
			0 => Some(time.assume_init().into()),
			_ => None
		}
	}
}

/// Seconds per minute.
const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds per hour.
const SECONDS_PER_HOUR: i64 = SECONDS_PER_MINUTE * 60;
/// Seconds per day.
const SECONDS_PER_DAY: i64 = SECONDS_PER_HOUR * 24;
/// Days per non-leap year.
const DAYS_PER_NON_LEAP_YEAR: i64 = 365;
/// Number of years per era.
const YEARS_PER_ERA: i64 = 400;
/// Number of days every era (400 years).
const DAYS_PER_ERA: i64 = 146097;
/// Days from March 1, 0000 to January 1, 1970.
const DAYS_FROM_MARCH_0000_TO_JAN_1970: i64 = 719468;
/// Days from March 1 to December 31, inclusive.
const DAYS_FROM_MAR_TO_DEC: i64 = 306;
/// Days per week.
const DAYS_PER_WEEK: i64 = 7;
/// Day of the week of January 1, 1970 (a Thursday), counted from Monday.
const EPOCH_WEEKDAY: i64 = 3;

/// Gregorian calendar date in UTC.
///
/// Differences from `libc::tm`:
/// - `mon` is [1, 12] rather than [0, 11].
/// - `yday` is [1, 366] rather than [0, 365].
/// - `year` is the absolute (proleptic) Gregorian year rather than years since 1900.
/// - `weekday` counts from Monday (0) to Sunday (6), like ISO 8601 minus one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tm {
	/// Seconds, ranged [0, 59]
	pub sec: u8,
	/// Minutes, ranged [0, 59]
	pub min: u8,
	/// Hours, ranged [0, 23]
	pub hour: u8,
	/// Day of the month, ranged [1, 31]
	pub day: u8,
	/// Month of the year, ranged [1, 12]
	pub mon: u8,
	/// Absolute Gregorian year, may be zero or negative for very early timestamps
	pub year: i64,
	/// Day of the week, ranged [0, 6] => [Monday, Sunday]
	pub weekday: u8,
	/// Day of the year, ranged [1, 366]
	pub yday: u16
}

impl Tm {
	/// Convert a Unix timestamp into a calendar date.
	///
	/// Every `i64` input is accepted. Seconds before the epoch are floored toward negative
	/// infinity, so `-1` is 23:59:59 on December 31, 1969.
	pub fn new(unixtimestamp: i64) -> Tm {
		// The Gregorian calendar repeats every 400 years. Rotating the year to start in March puts
		// the leap day at the end of the rotated year, which makes the month and day a pair of linear
		// equations. Euclidean division keeps every intermediate value in range for negative inputs.
		//
		// More details: http://howardhinnant.github.io/date_algorithms.html#civil_from_days
		let days = unixtimestamp.div_euclid(SECONDS_PER_DAY);
		let rem = unixtimestamp.rem_euclid(SECONDS_PER_DAY);
		let z = days + DAYS_FROM_MARCH_0000_TO_JAN_1970;
		let era = z.div_euclid(DAYS_PER_ERA);
		let doe = z.rem_euclid(DAYS_PER_ERA);
		let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / DAYS_PER_NON_LEAP_YEAR;
		let doy = doe - (DAYS_PER_NON_LEAP_YEAR * yoe + yoe / 4 - yoe / 100);
		let mp = (5 * doy + 2) / 153;
		let day = doy - (153 * mp + 2) / 5 + 1;
		let (mon, year) = if mp < 10 {
			(mp + 3, yoe + era * YEARS_PER_ERA)
		} else {
			(mp - 9, yoe + era * YEARS_PER_ERA + 1)
		};

		// Day of the year, counted from January 1 instead of March 1
		let yday = if doy >= DAYS_FROM_MAR_TO_DEC {
			doy - DAYS_FROM_MAR_TO_DEC
		} else {
			doy + 59 + isleapyear(year) as i64
		};

		Tm {
			sec: (rem % SECONDS_PER_MINUTE) as u8,
			min: ((rem % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u8,
			hour: (rem / SECONDS_PER_HOUR) as u8,
			day: day as u8,
			mon: mon as u8,
			year,
			weekday: (days + EPOCH_WEEKDAY).rem_euclid(DAYS_PER_WEEK) as u8,
			yday: (yday + 1) as u16
		}
	}
}

/// Check whether a given absolute Gregorian `year` is a leap year.
///
/// # Examples
///
/// ```
/// # use time::time::isleapyear;
/// assert_eq!(isleapyear(1900), false);
/// assert_eq!(isleapyear(2000), true);
/// assert_eq!(isleapyear(2024), true);
/// assert_eq!(isleapyear(-4), true);
/// ```
#[inline(always)]
pub fn isleapyear(year: i64) -> bool {
	year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0)
}
