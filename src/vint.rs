use std::fmt;
use std::io::{Read, Write};

use super::errors::vint::VintError;
use super::tools::read_fully;

///
/// Largest value that can be encoded as a size.  The all-ones pattern at length 8 is reserved for "unknown size".
///
pub const MAX_SIZE_VALUE: u64 = (1 << 56) - 2;

///
/// Largest value that can be used as an element id.  Ids are limited to 4 octets and the all-ones pattern is reserved.
///
pub const MAX_ELEMENT_ID: u32 = (1 << 28) - 2;

// Maps length to data bits mask.
const DATA_BITS_MASK: [u64; 9] = [
    0,
    (1 << 7) - 1,
    (1 << 14) - 1,
    (1 << 21) - 1,
    (1 << 28) - 1,
    (1 << 35) - 1,
    (1 << 42) - 1,
    (1 << 49) - 1,
    (1 << 56) - 1,
];

///
/// A variable size integer as described in [RFC8794](https://datatracker.ietf.org/doc/rfc8794/).
///
/// The length of a vint is given by the position of the marker bit in its first octet: `1xxx xxxx` is one octet long, `01xx xxxx xxxx xxxx` is two, and so on up to eight octets.  Every bit after the marker is a data bit.  A vint whose data bits are all ones is "reserved" and is used to mark elements of unknown size.
///
/// The same type is used for element ids and element sizes.  Ids keep their marker bit when represented as numbers (e.g. `0x1A45DFA3`), so [`VInt::encoded_value`] is usually what you want for an id, and [`VInt::value`] for a size.
///
/// ## Example
///
/// ```
/// use ebml_stream::VInt;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let size = VInt::encode_size(127, None)?;
/// assert_eq!(2, size.length());
/// assert_eq!(0x407F, size.encoded_value());
///
/// let id = VInt::from_encoded(0x1A45DFA3)?;
/// assert_eq!(4, id.length());
/// assert!(id.is_valid_identifier());
/// # Ok(())
/// # }
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VInt {
    encoded_value: u64,
    length: usize,
}

impl VInt {
    ///
    /// Encodes `value` as a size.  When `length` is `None` the shortest possible length is used.
    ///
    /// # Errors
    ///
    /// Fails if `value` exceeds [`MAX_SIZE_VALUE`], if `length` is outside of 1..=8, or if the forced `length` cannot hold `value`.
    ///
    pub fn encode_size(value: u64, length: Option<usize>) -> Result<VInt, VintError> {
        if value > MAX_SIZE_VALUE {
            return Err(VintError::ValueTooLarge(value));
        }

        let length = match length {
            Some(length) => {
                if !(1..=8).contains(&length) {
                    return Err(VintError::LengthOutOfRange(length));
                }
                if DATA_BITS_MASK[length] <= value {
                    return Err(VintError::InsufficientLength { value, length });
                }
                length
            }
            None => {
                let mut length = 1;
                while DATA_BITS_MASK[length] <= value {
                    length += 1;
                }
                length
            }
        };

        Ok(VInt {
            encoded_value: value | 1 << (7 * length),
            length,
        })
    }

    ///
    /// Encodes an element id given by its data bits (i.e. without the marker).
    ///
    /// # Errors
    ///
    /// Fails if `id` is larger than [`MAX_ELEMENT_ID`].
    ///
    pub fn make_id(id: u32) -> Result<VInt, VintError> {
        if id > MAX_ELEMENT_ID {
            return Err(VintError::IdOutOfRange(id));
        }
        VInt::encode_size(id as u64, None)
    }

    ///
    /// Returns the reserved "unknown size" vint of the given length.
    ///
    /// # Errors
    ///
    /// Fails if `length` is outside of 1..=8.
    ///
    pub fn unknown_size(length: usize) -> Result<VInt, VintError> {
        if !(1..=8).contains(&length) {
            return Err(VintError::LengthOutOfRange(length));
        }
        Ok(VInt {
            encoded_value: 1 << (7 * length) | DATA_BITS_MASK[length],
            length,
        })
    }

    ///
    /// Reconstructs a vint from its encoded form, marker bit included.  The length is taken from the position of the marker in the most significant nonzero octet.
    ///
    /// # Errors
    ///
    /// Fails if `encoded` is zero or if the marker does not sit at the position its octet implies.
    ///
    pub fn from_encoded(encoded: u64) -> Result<VInt, VintError> {
        if encoded == 0 {
            return Err(VintError::InvalidEncoding(encoded));
        }

        let octet_index = (63 - encoded.leading_zeros() as usize) / 8;
        let marker = (encoded >> (octet_index * 8)) as u8;
        let extra_bytes = marker.leading_zeros() as usize;

        if extra_bytes != octet_index {
            return Err(VintError::InvalidEncoding(encoded));
        }

        Ok(VInt {
            encoded_value: encoded,
            length: extra_bytes + 1,
        })
    }

    ///
    /// Reads a vint from `source`, allowing at most `max_length` octets.
    ///
    /// Returns `Ok(None)` if the source is already exhausted, so the caller can tell a clean end of data from a truncated vint.
    ///
    /// # Errors
    ///
    /// Fails if the first octet is zero, if the vint is longer than `max_length`, if the source ends partway through the vint, or if reading fails.
    ///
    pub fn read<R: Read + ?Sized>(source: &mut R, max_length: usize) -> Result<Option<VInt>, VintError> {
        let mut buffer = [0u8; 8];
        if read_fully(source, &mut buffer[..1]).map_err(|source| VintError::ReadError { source })? == 0 {
            return Ok(None);
        }

        if buffer[0] == 0 {
            return Err(VintError::InvalidMarker);
        }

        let length = buffer[0].leading_zeros() as usize + 1;
        if length > max_length {
            return Err(VintError::TooLong { length, max_length });
        }

        let extra_bytes = length - 1;
        if read_fully(source, &mut buffer[1..length]).map_err(|source| VintError::ReadError { source })? != extra_bytes {
            return Err(VintError::UnexpectedEof);
        }

        let encoded_value = buffer[..length]
            .iter()
            .fold(0u64, |acc, byte| acc << 8 | *byte as u64);

        Ok(Some(VInt { encoded_value, length }))
    }

    ///
    /// Writes the `length` big endian octets of this vint to `dest`, returning the number of bytes written.
    ///
    pub fn write<W: Write + ?Sized>(&self, dest: &mut W) -> std::io::Result<usize> {
        dest.write_all(&self.as_bytes())?;
        Ok(self.length)
    }

    ///
    /// Returns the encoded octets of this vint.
    ///
    pub fn as_bytes(&self) -> Vec<u8> {
        Vec::from(&self.encoded_value.to_be_bytes()[(8 - self.length)..])
    }

    ///
    /// The data bits of this vint.
    ///
    pub fn value(&self) -> u64 {
        self.encoded_value & DATA_BITS_MASK[self.length]
    }

    ///
    /// The full encoded value including the marker bit.
    ///
    pub fn encoded_value(&self) -> u64 {
        self.encoded_value
    }

    pub fn length(&self) -> usize {
        self.length
    }

    ///
    /// True when all data bits are ones, the pattern used for "unknown size".
    ///
    pub fn is_reserved(&self) -> bool {
        self.value() == DATA_BITS_MASK[self.length]
    }

    ///
    /// True when this vint is in shortest form and is not reserved.
    ///
    pub fn is_valid_identifier(&self) -> bool {
        let is_shortest = self.length == 1 || self.value() > DATA_BITS_MASK[self.length - 1];
        is_shortest && !self.is_reserved()
    }

    ///
    /// The value of this vint as a size, or `None` when it is the reserved "unknown size" pattern.
    ///
    pub fn as_size(&self) -> Option<u64> {
        if self.is_reserved() {
            None
        } else {
            Some(self.value())
        }
    }
}

impl fmt::Display for VInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VInt, value = {}, length = {}, encoded = {:X}", self.value(), self.length, self.encoded_value)
    }
}
