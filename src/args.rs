//! Support for command line argument parsing.
//!
//! See [crate] documentation for details on command line arguments and examples.

use std::ffi::OsString;
use std::str::FromStr;

use thiserror::Error;

use crate::config::{Carrier, Config};

/// The error type for parsing command line arguments.
#[derive(Error, Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ArgumentsError {
	/// The option was unrecognized. The option is returned as the payload of this variant.
	#[error("Unrecognized option: {0}")]
	UnrecognizedOption(String),
	/// A positional argument was supplied. None are accepted. The argument is returned as the
	/// payload of this variant.
	#[error("Unexpected argument: {0}")]
	UnexpectedArgument(String),
	/// Error converting an option or parameter to UTF-8. The argument index and original
	/// [`OsString`] that could not be converted are returned as the payload of this variant.
	#[error("Invalid UTF-8 in argument {0}: {1:?}")]
	InvalidUTF8(usize, OsString),
	/// The parameter for an option was not supplied. The option is returned as the payload for this
	/// variant.
	#[error("Missing parameter for option {0}")]
	MissingParameter(String),
	/// The parameter for an option could not be parsed as a number in range. The option and the
	/// supplied parameter are returned as the payload of this variant.
	#[error("Invalid value for option {0}: {1}")]
	InvalidNumber(String, String),
	/// The carrier name was not recognized. The supplied name is returned as the payload of this
	/// variant.
	#[error("Invalid carrier: {0}")]
	InvalidCarrier(String),
	/// The NTP version was outside [1, 4]. The supplied version is returned as the payload of this
	/// variant.
	#[error("Unsupported NTP version: {0}")]
	InvalidNtpVersion(String),
	/// Help option (-h) was included, so print help details and exit.
	#[error("Help requested")]
	Help
}

/// Convert an argument to [`&str`].
///
/// The function takes the argument index `i`, optional argument name `a`, and the argument `s`.
///
/// # Errors
///
/// Returns [`ArgumentsError::InvalidUTF8`] if the argument could not be converted to UTF-8 or
/// [`ArgumentsError::MissingParameter`] if the argument is `None`.
fn arg_to_str<'b>(i: usize, a: Option<&str>, s: Option<&'b OsString>) -> Result<&'b str, ArgumentsError> {
	match s {
		Some(v) => v.to_str().ok_or_else(|| ArgumentsError::InvalidUTF8(i, v.clone())),
		None => Err(ArgumentsError::MissingParameter(a.map(String::from).unwrap_or_default()))
	}
}

/// Parse the parameter of option `a`.
///
/// # Errors
///
/// As [`arg_to_str`], plus [`ArgumentsError::InvalidNumber`] if the parameter does not parse as `T`.
fn parse_param<T: FromStr>(i: usize, a: &str, s: Option<&OsString>) -> Result<T, ArgumentsError> {
	let v = arg_to_str(i, Some(a), s)?;
	v.parse().map_err(|_| ArgumentsError::InvalidNumber(a.to_string(), v.to_string()))
}

/// Parsed command line arguments.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Arguments {
	/// Whole minutes to transmit after the current one.
	pub duration: u32,
	/// Manual clock correction in milliseconds.
	pub delta_millis: i64,
	/// Offset from UTC in hours.
	pub tz_offset_hours: f64,
	/// Output sample rate in Hz.
	pub sample_rate: u32,
	/// The configured NTP server (if provided).
	pub ntp_server: Option<String>,
	/// NTP protocol version, ranged [1, 4].
	pub ntp_version: u8,
	/// Carrier tone.
	pub carrier: Carrier,
	/// Enable debug logging.
	pub verbose: bool
}

impl Default for Arguments {
	fn default() -> Arguments {
		let c = Config::default();
		Arguments {
			duration: c.duration_minutes,
			delta_millis: c.manual_delta_millis,
			tz_offset_hours: c.local_offset_seconds as f64 / 3600.,
			sample_rate: c.sample_rate,
			ntp_server: None,
			ntp_version: 4,
			carrier: c.carrier,
			verbose: false
		}
	}
}

impl Arguments {
	/// Parse command line arguments.
	///
	/// The input can be any type that implements [`Iterator`] that yields [`OsString`], though
	/// typically this would be [`std::env::args_os`]. This function assumes that the application
	/// name is **not** supplied as the first item yielded by `args`, see examples for common use.
	///
	/// # Errors
	///
	/// This function can return any of the variants in [`ArgumentsError`]. See that documentation
	/// for more details.
	///
	/// # Examples
	///
	/// ```ignore
	/// let args = match Arguments::parse(std::env::args_os().skip(1)) {
	/// 	Ok(a) => a,
	/// 	Err(e) => {
	/// 		// Handle error
	/// 		panic!("{}", e);
	/// 	}
	/// };
	/// ```
	pub fn parse(mut args: impl Iterator<Item = OsString>) -> Result<Arguments, ArgumentsError> {
		let mut parsed = Arguments::default();
		let mut i = 0;
		while let Some(arg) = args.next() {
			match arg_to_str(i, None, Some(&arg))? {
				n @ ("-t" | "--duration") => {
					parsed.duration = parse_param(i + 1, n, args.next().as_ref())?;
					// Increment because we called args.next()
					i += 1;
				},
				n @ ("-d" | "--delta") => {
					parsed.delta_millis = parse_param(i + 1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ ("-o" | "--tz-offset") => {
					let v = args.next();
					let hours: f64 = parse_param(i + 1, n, v.as_ref())?;
					if !hours.is_finite() {
						return Err(ArgumentsError::InvalidNumber(n.to_string(), hours.to_string()));
					}
					parsed.tz_offset_hours = hours;
					i += 1;
				},
				n @ ("-r" | "--sample-rate") => {
					parsed.sample_rate = parse_param(i + 1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ ("-s" | "--ntp-server") => {
					parsed.ntp_server = Some(String::from(arg_to_str(i + 1, Some(n), args.next().as_ref())?));
					i += 1;
				},
				n @ ("-n" | "--ntp-version") => {
					let v = arg_to_str(i + 1, Some(n), args.next().as_ref())?.to_string();
					parsed.ntp_version = match v.parse() {
						Ok(version @ 1..=4) => version,
						_ => return Err(ArgumentsError::InvalidNtpVersion(v))
					};
					i += 1;
				},
				n @ ("-c" | "--carrier") => {
					parsed.carrier = Carrier::from_str(arg_to_str(i + 1, Some(n), args.next().as_ref())?)?;
					i += 1;
				},
				"-v" | "--verbose" => parsed.verbose = true,
				"-h" | "--help" => return Err(ArgumentsError::Help),
				v => {
					if v.starts_with('-') {
						return Err(ArgumentsError::UnrecognizedOption(v.to_string()));
					}
					return Err(ArgumentsError::UnexpectedArgument(v.to_string()));
				}
			}
			i += 1;
		}
		Ok(parsed)
	}

	/// The transmission [`Config`] described by these arguments.
	///
	/// The hour offset is rounded to the nearest second. Range checks are left to
	/// [`Config::validate`].
	pub fn config(&self) -> Config {
		Config {
			sample_rate: self.sample_rate,
			duration_minutes: self.duration,
			local_offset_seconds: (self.tz_offset_hours * 3600.).round() as i64,
			manual_delta_millis: self.delta_millis,
			carrier: self.carrier
		}
	}
}
