//! Support for measuring the system clock offset against an NTP server.
//!
//! This crate provides a single public function ([`clock_offset`]) that asks an NTP server (or
//! pool) how far the local clock is off. It makes five requests and keeps the response with the
//! smallest error bound, which is typically accurate to a few tens of milliseconds. If the address
//! resolves to multiple IPs, up to five different IPs will be tried, cycling if fewer than five.
//!
//! The returned offset is meant to be added to the system time, so that a corrected clock can be
//! read repeatedly without querying the server again.
//!
//! # Examples
//!
//! ```
//! # use sntp::clock_offset;
//! match clock_offset("pool.ntp.org", 4) {
//! 	Ok(offset) => println!("System clock is off by {offset:.3}s"),
//! 	Err(e) => eprintln!("Error querying pool.ntp.org: {e}")
//! }
//! assert!(clock_offset("invalid address", 4).is_err());
//! ```

use std::{
	io,
	net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
	ops::Sub,
	time::Duration
};
use time::{now, TimeSpec};

/// Offset to adjust a Unix timestamp (epoch Jan 1, 1970) to NTP time stamp (epoch Jan 1, 1900)
const UNIX_TO_NTP_EPOCH_ADJUST: i64 = (70 * 365 + 17) * 86400; // 17 leap years between 1900-1970

/// Size of an NTP packet without extensions, in bytes.
const PACKET_LEN: usize = 48;

/// Default NTP port.
const NTP_PORT: u16 = 123;

/// Number of queries made by [`clock_offset`].
const QUERIES: usize = 5;

/// Client mode, as set in the low 3 bits of the first byte.
const MODE_CLIENT: u8 = 3;

/// Server mode, as set in the low 3 bits of the first byte.
const MODE_SERVER: u8 = 4;

/// Shorthand for an [`io::ErrorKind::Other`] error.
fn other(msg: &str) -> io::Error {
	io::Error::new(io::ErrorKind::Other, msg.to_string())
}

/// An NTP timestamp in seconds since Jan 1, 1900.
///
/// NTP uses a 64-bit fixed point format, with 32 bits before the binary point and 32 bits after.
/// Internally, the value is stored system-endian for simpler math.
#[derive(Clone, Copy, Debug, PartialEq)]
struct NtpTimestamp(u64);

impl NtpTimestamp {
	/// Create a new NTP timestamp from whole seconds and a binary fraction of a second.
	fn new(sec: u32, frac: u32) -> Self {
		Self((sec as u64) << 32 | frac as u64)
	}

	/// Read a 64-bit timestamp from wire format (big endian) at `bytes[0..8]`.
	fn read(bytes: &[u8]) -> Self {
		let mut b = [0u8; 8];
		b.copy_from_slice(&bytes[..8]);
		Self(u64::from_be_bytes(b))
	}

	/// Read a short 32-bit timestamp (16.16 fixed point) from wire format at `bytes[0..4]`.
	///
	/// The value is widened to the 32.32 format so it can be combined with regular timestamps.
	fn read_short(bytes: &[u8]) -> Self {
		let mut b = [0u8; 4];
		b.copy_from_slice(&bytes[..4]);
		Self((u32::from_be_bytes(b) as u64) << 16)
	}

	/// Write the timestamp in wire format (big endian) to `bytes[0..8]`.
	fn write(self, bytes: &mut [u8]) {
		bytes[..8].copy_from_slice(&self.0.to_be_bytes());
	}
}

impl Sub for NtpTimestamp {
	type Output = NtpTimestampDiff;

	/// Subtract two timestamps, generating an [`NtpTimestampDiff`].
	fn sub(self, rhs: Self) -> Self::Output {
		// Wrapping sub to enable reinterpretation of overflow as negative numbers
		NtpTimestampDiff(self.0.wrapping_sub(rhs.0) as i64)
	}
}

impl From<TimeSpec> for NtpTimestamp {
	/// Convert from a [`TimeSpec`] representing time since the Unix epoch.
	fn from(time: TimeSpec) -> Self {
		let sec = time.sec + UNIX_TO_NTP_EPOCH_ADJUST;
		let frac = (time.nsec << 32) / 1000000000;
		NtpTimestamp::new(sec as u32, frac as u32)
	}
}

/// A signed difference between two [`NtpTimestamp`]s, in the same 32.32 fixed point format.
///
/// Differences of up to +-68 years can be represented, far more than any clock offset worth
/// correcting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct NtpTimestampDiff(i64);

impl NtpTimestampDiff {
	/// Convert to (fractional) seconds.
	fn as_secs_f64(self) -> f64 {
		self.0 as f64 / 4294967296.0
	}
}

impl Sub for NtpTimestampDiff {
	type Output = Self;

	fn sub(self, rhs: Self) -> Self::Output {
		// Only meaningless, invalid packets can get close to overflow
		Self(self.0.wrapping_sub(rhs.0))
	}
}

/// One measurement against a server.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
	/// Amount to add to the local clock.
	offset: NtpTimestampDiff,
	/// Bound on the error of `offset` (always positive).
	error: NtpTimestampDiff
}

impl Sample {
	/// Compute a sample from the four timestamps of an exchange and the server's root error terms.
	///
	/// - `t1`: request left the client (client clock)
	/// - `t2`: request reached the server (server clock)
	/// - `t3`: response left the server (server clock)
	/// - `t4`: response reached the client (client clock)
	///
	/// The offset is `((t2 - t1) + (t3 - t4)) / 2` and the error bound is half the round trip
	/// delay plus the server's own root delay and dispersion.
	fn new(t1: NtpTimestamp, t2: NtpTimestamp, t3: NtpTimestamp, t4: NtpTimestamp,
	       root_delay: NtpTimestamp, root_dispersion: NtpTimestamp) -> Sample
	{
		let offset = NtpTimestampDiff(((t2 - t1).0 / 2).wrapping_add((t3 - t4).0 / 2));
		let delay = (t4 - t1) - (t3 - t2);
		let error = NtpTimestampDiff(
			(delay.0.wrapping_abs() / 2)
				.wrapping_add((root_delay.0 / 2) as i64)
				.wrapping_add(root_dispersion.0 as i64)
		);
		Sample { offset, error }
	}
}

/// Build a client request packet for NTP `version`, stamped with the transmit time `tx`.
fn request(version: u8, tx: NtpTimestamp) -> [u8; PACKET_LEN] {
	let mut packet = [0u8; PACKET_LEN];
	packet[0] = (version & 0x7) << 3 | MODE_CLIENT;
	tx.write(&mut packet[40..48]);
	packet
}

/// The fields of a server response used to compute a [`Sample`].
#[derive(Debug, PartialEq)]
struct Response {
	root_delay: NtpTimestamp,
	root_dispersion: NtpTimestamp,
	origin: NtpTimestamp,
	rx: NtpTimestamp,
	tx: NtpTimestamp
}

impl Response {
	/// Parse a server response.
	///
	/// # Errors
	///
	/// Returns [`io::Error`] if the packet is too short, is not a server response, comes from an
	/// unsynchronized server (stratum 0, e.g. a kiss-o'-death packet) or does not answer the
	/// request stamped with `sent`.
	fn parse(packet: &[u8], sent: NtpTimestamp) -> Result<Response, io::Error> {
		if packet.len() < PACKET_LEN {
			return Err(other("Invalid message returned from NTP server"));
		}
		if packet[0] & 0x7 != MODE_SERVER {
			return Err(other("NTP response is not in server mode"));
		}
		if packet[1] == 0 {
			return Err(other("NTP server is not synchronized"));
		}
		let response = Response {
			root_delay: NtpTimestamp::read_short(&packet[4..8]),
			root_dispersion: NtpTimestamp::read_short(&packet[8..12]),
			origin: NtpTimestamp::read(&packet[24..32]),
			rx: NtpTimestamp::read(&packet[32..40]),
			tx: NtpTimestamp::read(&packet[40..48])
		};
		if response.origin != sent {
			return Err(other("NTP response does not match request"));
		}
		Ok(response)
	}
}

/// A client service to query NTP servers.
///
/// Using this type enables the reuse of sockets (IPv4 and IPv6), but it is **not** thread safe.
struct NtpService {
	/// NTP protocol version to request.
	version: u8,
	/// IPv4 socket, initialized on first use.
	sockv4: Option<UdpSocket>,
	/// IPv6 socket, initialized on first use.
	sockv6: Option<UdpSocket>
}

impl NtpService {
	/// Construct a new `NtpService` speaking NTP `version`.
	fn new(version: u8) -> Self {
		Self { version, sockv4: None, sockv6: None }
	}

	/// Get the appropriate socket (IPv4 or IPv6) for the given address, binding it on first use.
	///
	/// # Errors
	///
	/// This function will return [`io::Error`] if the socket fails to initialize.
	fn get_or_init_socket<T>(socket: &mut Option<UdpSocket>, addr: T) -> Result<&UdpSocket, io::Error>
	where (T, u16): ToSocketAddrs
	{
		if socket.is_none() {
			let s = UdpSocket::bind((addr, 0))?;
			s.set_read_timeout(Some(Duration::from_secs(1)))?;
			s.set_write_timeout(Some(Duration::from_secs(1)))?;
			*socket = Some(s);
		}
		socket.as_ref().ok_or_else(|| other("Socket should always be set"))
	}

	/// Query an NTP server once.
	///
	/// # Errors
	///
	/// This function will return [`io::Error`] if any error occurs during the request, including
	/// issues initializing the socket, getting the current time, sending or receiving on the
	/// socket, or an invalid response.
	fn query_server(&mut self, addr: &SocketAddr) -> Result<Sample, io::Error> {
		let socket = if addr.is_ipv4() {
			Self::get_or_init_socket(&mut self.sockv4, Ipv4Addr::UNSPECIFIED)?
		} else {
			Self::get_or_init_socket(&mut self.sockv6, Ipv6Addr::UNSPECIFIED)?
		};

		socket.connect(addr)?;
		let t1 = NtpTimestamp::from(now().ok_or_else(|| other("Failed to get current time"))?);
		socket.send(&request(self.version, t1))?;

		let mut packet = [0u8; PACKET_LEN];
		let bytes = socket.recv(&mut packet)?;
		let t4 = NtpTimestamp::from(now().ok_or_else(|| other("Failed to get current time"))?);

		let r = Response::parse(&packet[..bytes], t1)?;
		Ok(Sample::new(t1, r.rx, r.tx, t4, r.root_delay, r.root_dispersion))
	}
}

/// Normalize an address for use by [`ToSocketAddrs::to_socket_addrs`].
///
/// Adds the default NTP port (123) if none is given, and wraps bare IPv6 addresses in brackets.
///
/// # Errors
///
/// Returns [`io::Error`] if `addr` is empty.
fn normalize_address(addr: &str) -> Result<String, io::Error> {
	if addr.is_empty() {
		return Err(other("Empty SNTP server address"));
	}

	let colons = addr.matches(':').count();
	if addr.starts_with('[') {
		// Bracketed IPv6, the port (if any) follows the closing bracket
		if addr.rsplit_once(']').is_some_and(|(_, port)| port.starts_with(':')) {
			Ok(addr.to_string())
		} else {
			Ok(format!("{addr}:{NTP_PORT}"))
		}
	} else if colons > 1 {
		// Bare IPv6, can't carry a port
		Ok(format!("[{addr}]:{NTP_PORT}"))
	} else if colons == 1 {
		Ok(addr.to_string())
	} else {
		Ok(format!("{addr}:{NTP_PORT}"))
	}
}

/// Measure how far the system clock is off, according to an NTP server.
///
/// Returns the offset in seconds to add to the system time. `version` is the NTP protocol version
/// to request, 1 through 4.
///
/// # Errors
///
/// Returns [`io::Error`] if `version` is out of range, the address is empty or does not resolve,
/// or none of the five queries succeed.
pub fn clock_offset(addr: &str, version: u8) -> Result<f64, io::Error> {
	if !(1..=4).contains(&version) {
		return Err(io::Error::new(
			io::ErrorKind::InvalidInput,
			format!("Unsupported NTP version: {version}")
		));
	}

	let addrs: Vec<SocketAddr> = normalize_address(addr)?.to_socket_addrs()?.collect();
	if addrs.is_empty() {
		return Err(other("Address did not resolve to any IPs"));
	}

	let mut ntp = NtpService::new(version);
	let mut best: Option<Sample> = None;
	let mut last_error = None;
	for addr in addrs.iter().cycle().take(QUERIES) {
		match ntp.query_server(addr) {
			Ok(s) => {
				if best.is_none_or(|b| s.error < b.error) {
					best = Some(s);
				}
			},
			Err(e) => last_error = Some(e)
		}
	}

	match (best, last_error) {
		(Some(s), _) => Ok(s.offset.as_secs_f64()),
		(None, Some(e)) => Err(e),
		(None, None) => Err(other("No NTP responses"))
	}
}
