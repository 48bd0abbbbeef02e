//!
//! Contains a number of tools that are useful when working with EBML encoded payloads.
//!

use std::convert::TryInto;
use std::io::{self, ErrorKind, Read};

use chrono::{DateTime, Utc};

///
/// Nanoseconds between the unix epoch and the EBML date epoch (2001-01-01T00:00:00Z).
///
pub const EBML_EPOCH_UNIX_NANOS: i64 = 978_307_200_000_000_000;

///
/// Reads from `source` until `buffer` is full or the source is exhausted.
///
/// Unlike [`Read::read_exact`], a short read is not an error here; the number of bytes actually read is returned so the caller can decide whether hitting the end of the source is acceptable.  Interrupted reads are retried.
///
/// # Errors
///
/// Returns any error other than [`ErrorKind::Interrupted`] produced by the source.
///
pub fn read_fully<R: Read + ?Sized>(source: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        match source.read(&mut buffer[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

///
/// Reads a `u64` value from any length array slice.
///
/// Rather than forcing the input to be a `[u8; 8]` like standard library methods, this can interpret a `u64` from a slice of any length <= 8.  Bytes are big endian - i.e. an array of `[4, 0]` would return a value of `1024`.  An empty slice is zero.
///
/// Returns `None` if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_stream::tools::arr_to_u64;
/// assert_eq!(Some(4096), arr_to_u64(&[16,0]));
/// ```
///
pub fn arr_to_u64(arr: &[u8]) -> Option<u64> {
    if arr.len() > 8 {
        return None;
    }

    let mut val = 0u64;
    for byte in arr {
        val <<= 8;
        val |= *byte as u64;
    }
    Some(val)
}

///
/// Reads an `i64` value from any length array slice.
///
/// The slice is interpreted as a big endian two's complement number of `arr.len()` bytes, so `[0xFF]` is `-1` and `[0x00, 0xFF]` is `255`.  An empty slice is zero.
///
/// Returns `None` if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_stream::tools::arr_to_i64;
/// assert_eq!(Some(1024), arr_to_i64(&[4,0]));
/// assert_eq!(Some(-129), arr_to_i64(&[0xFF,0x7F]));
/// ```
///
pub fn arr_to_i64(arr: &[u8]) -> Option<i64> {
    let unsigned = arr_to_u64(arr)?;
    if arr.is_empty() || arr.len() == 8 {
        return Some(unsigned as i64);
    }

    // sign extend from the top bit of the first byte
    let shift = 64 - arr.len() * 8;
    Some(((unsigned << shift) as i64) >> shift)
}

///
/// Reads an `f64` value from an array slice of length 4 or 8.
///
/// This method wraps `f32` and `f64` conversions from big endian byte arrays and casts the result as an `f64`.  Returns `None` for any other length.
///
pub fn arr_to_f64(arr: &[u8]) -> Option<f64> {
    match arr.len() {
        4 => Some(f32::from_be_bytes(arr.try_into().ok()?) as f64),
        8 => Some(f64::from_be_bytes(arr.try_into().ok()?)),
        _ => None,
    }
}

///
/// Returns the fewest bytes needed to hold `value` as a big endian two's complement number.  Zero needs no bytes at all.
///
pub fn signed_width(value: i64) -> usize {
    if value == 0 {
        return 0;
    }

    let mut width = 1;
    let mut mask = 0xffff_ffff_ffff_ff80u64 as i64;
    while width < 8 {
        let masked = value & mask;
        if masked == 0 || masked == mask {
            break;
        }
        mask <<= 8;
        width += 1;
    }
    width
}

///
/// Returns the fewest bytes needed to hold `value` as a big endian unsigned number.  Zero needs no bytes at all.
///
pub fn unsigned_width(value: u64) -> usize {
    (64 - value.leading_zeros() as usize + 7) / 8
}

///
/// Converts a date into signed nanoseconds relative to the EBML epoch.  Returns `None` when the result does not fit in an `i64`.
///
pub fn date_to_ebml_nanos(date: &DateTime<Utc>) -> Option<i64> {
    date.timestamp_nanos_opt()?.checked_sub(EBML_EPOCH_UNIX_NANOS)
}

///
/// Converts signed nanoseconds relative to the EBML epoch into a date.  Returns `None` when the date is not representable.
///
pub fn ebml_nanos_to_date(nanos: i64) -> Option<DateTime<Utc>> {
    nanos
        .checked_add(EBML_EPOCH_UNIX_NANOS)
        .map(DateTime::from_timestamp_nanos)
}

///
/// The EBML date epoch, 2001-01-01T00:00:00Z.
///
pub fn ebml_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(EBML_EPOCH_UNIX_NANOS)
}
