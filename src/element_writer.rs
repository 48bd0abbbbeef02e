use std::io::{Seek, Write};

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;

use super::errors::writer::WriterError;
use super::master_writer::{start_master, MasterElementWriter, DEFAULT_HYBRID_BUFFER_LIMIT, DEFAULT_SIZE_FIELD_LENGTH};
use super::tools::{self, signed_width, unsigned_width};
use super::vint::VInt;

///
/// How a master element works out the size it writes in its header.
///
/// * `Buffered` keeps all children in memory and writes the element with a minimal size field once it is finished.
/// * `Backpatching` writes the header straight away with a fixed width size field full of zeros, streams children to the destination, and seeks back to fill in the size when finished.  Needs a seekable destination.
/// * `Hybrid` buffers like `Buffered` until the buffer limit would be exceeded, then moves to the `Backpatching` layout for the rest of the element.  Needs a seekable destination.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MasterElementSizeStrategy {
    Buffered,
    Backpatching,
    Hybrid,
}

///
/// Emits EBML elements.  Implemented by [`EbmlWriter`] and by the [`MasterElementWriter`]s it hands out, so children are written the same way at every level.
///
/// Every method returns the number of bytes written for the element, header included.
///
pub trait ElementWrite {
    ///
    /// The destination for the next element.
    ///
    /// # Errors
    ///
    /// Fails with [`WriterError::ElementFinished`] if this is a master element that has already been finished.
    ///
    fn sink(&mut self) -> Result<&mut dyn Write, WriterError>;

    ///
    /// Writes `data` as-is, without any element header.
    ///
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, WriterError> {
        self.sink()?.write_all(data)?;
        Ok(data.len())
    }

    ///
    /// Writes an element id followed by a size.  The payload is up to the caller.
    ///
    fn write_element_header(&mut self, id: VInt, size: VInt) -> Result<usize, WriterError> {
        let sink = self.sink()?;
        let written = id.write(&mut *sink)? + size.write(&mut *sink)?;
        Ok(written)
    }

    ///
    /// Writes a complete element with `data` as its payload.
    ///
    fn write_binary(&mut self, id: VInt, data: &[u8]) -> Result<usize, WriterError> {
        let size = VInt::encode_size(data.len() as u64, None)?;
        let header = self.write_element_header(id, size)?;
        Ok(header + self.write_raw(data)?)
    }

    ///
    /// Writes an unsigned integer element using as few bytes as possible.  `0` has an empty payload.
    ///
    fn write_unsigned(&mut self, id: VInt, value: u64) -> Result<usize, WriterError> {
        let width = unsigned_width(value);
        self.write_binary(id, &value.to_be_bytes()[(8 - width)..])
    }

    ///
    /// Writes a signed integer element using the fewest bytes that still sign-extend back to `value`.  `0` has an empty payload.
    ///
    fn write_signed(&mut self, id: VInt, value: i64) -> Result<usize, WriterError> {
        let width = signed_width(value);
        self.write_binary(id, &value.to_be_bytes()[(8 - width)..])
    }

    fn write_f32(&mut self, id: VInt, value: f32) -> Result<usize, WriterError> {
        self.write_binary(id, &value.to_be_bytes())
    }

    fn write_f64(&mut self, id: VInt, value: f64) -> Result<usize, WriterError> {
        self.write_binary(id, &value.to_be_bytes())
    }

    ///
    /// Writes a date element as 8 bytes of nanoseconds relative to 2001-01-01T00:00:00Z.
    ///
    /// # Errors
    ///
    /// Fails with [`WriterError::DateOutOfRange`] if the offset does not fit in an `i64`.
    ///
    fn write_date(&mut self, id: VInt, value: &DateTime<Utc>) -> Result<usize, WriterError> {
        let nanos = tools::date_to_ebml_nanos(value).ok_or(WriterError::DateOutOfRange)?;
        self.write_binary(id, &nanos.to_be_bytes())
    }

    ///
    /// Writes an ASCII string element.  Characters outside of the ASCII range are written as `?`.
    ///
    fn write_ascii(&mut self, id: VInt, value: &str) -> Result<usize, WriterError> {
        let data: Vec<u8> = value
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect();
        self.write_binary(id, &data)
    }

    ///
    /// Writes a UTF-8 string element.  The string is normalized to NFC before being encoded.
    ///
    fn write_utf8(&mut self, id: VInt, value: &str) -> Result<usize, WriterError> {
        let normalized: String = value.nfc().collect();
        self.write_binary(id, normalized.as_bytes())
    }
}

///
/// Provides a tool to write EBML elements to a destination that implements [`std::io::Write`].
///
/// Master elements are written through the [`MasterElementWriter`] returned by the `start_*` methods.  Buffered master elements work with any destination.  Backpatching and hybrid master elements need to seek back into the destination, so they are only available when it also implements [`std::io::Seek`].
///
/// ## Example
///
/// ```
/// use std::io::Cursor;
/// use ebml_stream::{EbmlWriter, ElementWrite, MasterElementSizeStrategy, VInt};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut writer = EbmlWriter::new(Cursor::new(Vec::new()));
/// {
///     let mut segment = writer.start_master_element(VInt::make_id(0x08538067)?, MasterElementSizeStrategy::Backpatching)?;
///     segment.write_utf8(VInt::make_id(0x3BA9)?, "My title")?;
///     segment.finish()?;
/// }
/// let data = writer.into_inner().into_inner();
/// assert_eq!(&[0x18, 0x53, 0x80, 0x67], &data[..4]);
/// # Ok(())
/// # }
/// ```
///
pub struct EbmlWriter<W: Write> {
    dest: W,
}

impl<W: Write> EbmlWriter<W> {
    pub fn new(dest: W) -> Self {
        EbmlWriter { dest }
    }

    ///
    /// Starts a master element that collects its children in memory.  This works with any destination.
    ///
    pub fn start_buffered_master_element(&mut self, id: VInt) -> Result<MasterElementWriter<'_>, WriterError> {
        Ok(MasterElementWriter::buffered(&mut self.dest, id))
    }

    pub fn get_ref(&self) -> &W {
        &self.dest
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dest
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}

impl<W: Write + Seek> EbmlWriter<W> {
    ///
    /// Starts a master element with the given strategy, reserving [`DEFAULT_SIZE_FIELD_LENGTH`] bytes for the size where the strategy needs it.
    ///
    pub fn start_master_element(&mut self, id: VInt, strategy: MasterElementSizeStrategy) -> Result<MasterElementWriter<'_>, WriterError> {
        start_master(&mut self.dest, id, strategy, DEFAULT_SIZE_FIELD_LENGTH, DEFAULT_HYBRID_BUFFER_LIMIT)
    }

    ///
    /// Starts a master element with the given strategy and size field width.
    ///
    /// # Errors
    ///
    /// Fails if `size_field_length` is outside of 1..=8 for a backpatching or hybrid element.  Buffered elements ignore it.
    ///
    pub fn start_master_element_with_size_length(&mut self, id: VInt, strategy: MasterElementSizeStrategy, size_field_length: usize) -> Result<MasterElementWriter<'_>, WriterError> {
        start_master(&mut self.dest, id, strategy, size_field_length, DEFAULT_HYBRID_BUFFER_LIMIT)
    }

    ///
    /// Starts a hybrid master element that buffers up to `buffer_limit` bytes before switching to backpatching.
    ///
    pub fn start_hybrid_master_element(&mut self, id: VInt, size_field_length: usize, buffer_limit: usize) -> Result<MasterElementWriter<'_>, WriterError> {
        start_master(&mut self.dest, id, MasterElementSizeStrategy::Hybrid, size_field_length, buffer_limit)
    }
}

impl<W: Write> ElementWrite for EbmlWriter<W> {
    fn sink(&mut self) -> Result<&mut dyn Write, WriterError> {
        Ok(&mut self.dest)
    }
}
