//! Binary-coded decimal and parity helpers.
//!
//! JJY transmits every calendar field as packed BCD, one nibble per decimal digit, and protects
//! the hour and minute fields with even parity.

use thiserror::Error;

/// Largest value [`to_bcd`] can pack (three decimal digits).
pub const BCD_MAX: i64 = 999;

/// The error type for values outside the BCD domain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
	/// The value is negative. The value is provided in the payload.
	#[error("Cannot encode negative value as BCD: {0}")]
	Negative(i64),
	/// The value has more than three decimal digits. The value is provided in the payload.
	#[error("Cannot encode more than three decimal digits as BCD: {0}")]
	TooLarge(i64)
}

/// Pack a value known to be in [0, 999] into BCD.
///
/// Bits 0-3 hold the ones digit, bits 4-7 the tens digit and bits 8-11 the hundreds digit.
#[inline(always)]
pub(crate) fn pack(value: u16) -> u16 {
	(value % 10) | ((value / 10 % 10) << 4) | ((value / 100 % 10) << 8)
}

/// Convert `value` to packed binary-coded decimal.
///
/// # Errors
///
/// Returns [`DomainError::Negative`] if `value < 0` and [`DomainError::TooLarge`] if
/// `value > 999`.
///
/// # Examples
///
/// ```
/// # use jjy::bcd::to_bcd;
/// assert_eq!(to_bcd(0), Ok(0x0));
/// assert_eq!(to_bcd(59), Ok(0x59));
/// assert_eq!(to_bcd(366), Ok(0x366));
/// assert!(to_bcd(1000).is_err());
/// ```
pub fn to_bcd(value: i64) -> Result<u16, DomainError> {
	if value < 0 {
		Err(DomainError::Negative(value))
	} else if value > BCD_MAX {
		Err(DomainError::TooLarge(value))
	} else {
		Ok(pack(value as u16))
	}
}

/// Even parity of `value`: 0 if the number of set bits is even, 1 otherwise.
///
/// # Examples
///
/// ```
/// # use jjy::bcd::parity;
/// assert_eq!(parity(0), 0);
/// assert_eq!(parity(1), 1);
/// assert_eq!(parity(3), 0);
/// ```
#[inline(always)]
pub fn parity(value: u32) -> u8 {
	(value.count_ones() & 0x1) as u8
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn to_bcd_test() {
		assert_eq!(to_bcd(0), Ok(0));
		assert_eq!(to_bcd(99), Ok(0x99));
		assert_eq!(to_bcd(100), Ok(0x100));
		assert_eq!(to_bcd(162), Ok(0x162));
		assert_eq!(to_bcd(999), Ok(0x999));

		for v in 0..100 {
			let b = to_bcd(v).unwrap();
			assert_eq!((b & 0xf) as i64, v % 10, "ones digit of {}", v);
			assert_eq!(((b >> 4) & 0xf) as i64, v / 10, "tens digit of {}", v);
			assert_eq!(b >> 8, 0, "hundreds digit of {}", v);
		}
	}

	#[test]
	fn to_bcd_nibbles_test() {
		for v in 0..=BCD_MAX {
			let b = to_bcd(v).unwrap();
			for shift in [0, 4, 8] {
				assert!((b >> shift) & 0xf <= 9, "nibble out of range for {}", v);
			}
		}
	}

	#[test]
	fn to_bcd_domain_test() {
		assert_eq!(to_bcd(-1), Err(DomainError::Negative(-1)));
		assert_eq!(to_bcd(i64::MIN), Err(DomainError::Negative(i64::MIN)));
		assert_eq!(to_bcd(1000), Err(DomainError::TooLarge(1000)));
		assert_eq!(to_bcd(i64::MAX), Err(DomainError::TooLarge(i64::MAX)));
	}

	#[test]
	fn parity_test() {
		assert_eq!(parity(0), 0);
		assert_eq!(parity(1), 1);
		assert_eq!(parity(3), 0);
		assert_eq!(parity(0x17), 0);
		assert_eq!(parity(0x15), 1);
		assert_eq!(parity(u32::MAX), 0);

		for v in 0..4096u32 {
			let mut x = v;
			let mut p = 0;
			while x != 0 {
				p ^= x & 1;
				x >>= 1;
			}
			assert_eq!(parity(v) as u32, p, "parity of {}", v);
		}
	}
}
