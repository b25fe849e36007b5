//! Utilities for dealing with time.
//!
//! This crate converts between Unix timestamps and UTC calendar time with no understanding of
//! timezones. Timezone handling for JJY is a fixed offset applied by the caller before conversion.
//!
//! The crate is `no_std`. If the `now` feature is enabled, [`time::now`] reads the current system
//! time through libc.
//!
//! # Examples
//!
//! Basic conversion from Unix time to UTC calendar time.
//! ```
//! # use time::time::Tm;
//! let date = Tm::new(1704067200);
//! assert_eq!((date.year, date.mon, date.day), (2024, 1, 1));
//! assert_eq!(date.yday, 1);
//! assert_eq!(date.weekday, 0); // Monday
//! ```

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod time;

pub use time::*;
