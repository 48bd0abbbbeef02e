use std::io::{self, Read, Seek, SeekFrom};

use chrono::{DateTime, Utc};
use log::{debug, trace};

use super::errors::reader::{CorruptedDataError, InvalidOperationError, ReaderError};
use super::errors::vint::VintError;
use super::reader_util::{
    ContainerFrame, CurrentElement, DeclaredSize, PayloadState, DEFAULT_MAX_ID_LENGTH, DEFAULT_MAX_SIZE_LENGTH,
};
use super::tools::{self, arr_to_f64, arr_to_i64, arr_to_u64, read_fully};
use super::vint::VInt;

///
/// A pull-based cursor over an EBML stream.
///
/// The reader walks a source one element at a time with [`EbmlReader::read_next`].  It never needs to know what an element id means: a consumer that knows an element is a master element calls [`EbmlReader::enter_container`] to walk its children, and [`EbmlReader::leave_container`] to get back to the parent level.  Payloads are read lazily through the typed accessors (`read_uint`, `read_utf8`, ...) or incrementally with [`EbmlReader::read_binary`].  Anything a consumer doesn't read is skipped.
///
/// Elements with an "unknown" size are allowed anywhere below the root.  Their size is taken to be the distance to the nearest enclosing boundary that *is* known (or the end of the source).
///
/// ## Example
///
/// ```
/// use std::io::Cursor;
/// use ebml_stream::{EbmlReader, VInt};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Segment(0x18538067) { Title(0x7BA9) = "hi" }
/// let data = vec![0x18, 0x53, 0x80, 0x67, 0x85, 0x7B, 0xA9, 0x82, b'h', b'i'];
/// let mut reader = EbmlReader::new(Cursor::new(data))?;
///
/// assert!(reader.read_next()?);
/// assert_eq!(0x18538067, reader.element_id()?.encoded_value());
/// reader.enter_container()?;
///
/// assert!(reader.read_next()?);
/// assert_eq!("hi", reader.read_utf8()?);
/// assert!(!reader.read_next()?);
///
/// reader.leave_container()?;
/// assert!(!reader.read_next()?);
/// # Ok(())
/// # }
/// ```
///
pub struct EbmlReader<R: Read + Seek> {
    source: R,
    position: u64,
    frames: Vec<ContainerFrame>,
    current: Option<CurrentElement>,
    max_id_length: usize,
    max_size_length: usize,
}

impl<R: Read + Seek> EbmlReader<R> {
    ///
    /// Returns a new reader that starts at the current position of `source` and reads until the end of the source.
    ///
    /// # Errors
    ///
    /// Fails if the current position of `source` cannot be determined.
    ///
    pub fn new(mut source: R) -> Result<Self, ReaderError> {
        let position = source.stream_position()?;
        Ok(Self::with_frame(source, position, ContainerFrame::root(None)))
    }

    ///
    /// Returns a new reader that starts at the current position of `source` and treats the next `size` bytes as the root level.
    ///
    /// # Errors
    ///
    /// Fails if the current position of `source` cannot be determined.
    ///
    pub fn with_size(mut source: R, size: u64) -> Result<Self, ReaderError> {
        let position = source.stream_position()?;
        Ok(Self::with_frame(source, position, ContainerFrame::root(Some(position.saturating_add(size)))))
    }

    fn with_frame(source: R, position: u64, root: ContainerFrame) -> Self {
        EbmlReader {
            source,
            position,
            frames: vec![root],
            current: None,
            max_id_length: DEFAULT_MAX_ID_LENGTH,
            max_size_length: DEFAULT_MAX_SIZE_LENGTH,
        }
    }

    ///
    /// Sets the widest element id (in octets) the reader will accept.  Defaults to 4.
    ///
    /// # Errors
    ///
    /// Fails if `length` is outside of 1..=8.
    ///
    pub fn set_max_id_length(&mut self, length: usize) -> Result<(), ReaderError> {
        self.max_id_length = check_limit(length)?;
        Ok(())
    }

    ///
    /// Sets the widest element size (in octets) the reader will accept.  Defaults to 8.
    ///
    /// # Errors
    ///
    /// Fails if `length` is outside of 1..=8.
    ///
    pub fn set_max_size_length(&mut self, length: usize) -> Result<(), ReaderError> {
        self.max_size_length = check_limit(length)?;
        Ok(())
    }

    ///
    /// Moves to the next element at the current level, skipping whatever is left of the current element.
    ///
    /// Returns `false` when there are no more elements in the current container, or when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Fails with [`ReaderError::CorruptedData`] if the element header is malformed, if its id is not a valid identifier, if an unknown-size element is found at the root level, or if a known-size element overruns its parent.
    ///
    pub fn read_next(&mut self) -> Result<bool, ReaderError> {
        self.skip_current()?;
        self.read_header()
    }

    ///
    /// Seeks to the absolute `position` and reads the element header found there.
    ///
    /// The container stack is left untouched; it is up to the caller to pick a position that makes sense at the current level.
    ///
    /// # Errors
    ///
    /// Fails if `position` is negative, and for any reason [`EbmlReader::read_next`] would fail.
    ///
    pub fn read_at(&mut self, position: i64) -> Result<bool, ReaderError> {
        if position < 0 {
            return Err(CorruptedDataError::NegativePosition { position }.into());
        }
        self.current = None;
        self.seek_to(position as u64)?;
        self.read_header()
    }

    ///
    /// Treats the current element as a master element and moves inside it.  The next call to [`EbmlReader::read_next`] returns its first child.
    ///
    /// # Errors
    ///
    /// Fails if there is no current element, or if part of its payload has already been read.
    ///
    pub fn enter_container(&mut self) -> Result<(), ReaderError> {
        let current = self.current.ok_or(InvalidOperationError::NoCurrentElement)?;
        if current.state != PayloadState::Unread {
            return Err(InvalidOperationError::NotAContainer { id: current.id.encoded_value() }.into());
        }

        let end = match current.declared_size {
            DeclaredSize::Known(_) => Some(current.data_end()),
            DeclaredSize::Unknown => None,
        };
        self.frames.push(ContainerFrame { id: Some(current.id), end });
        self.current = None;
        Ok(())
    }

    ///
    /// Moves back to the parent level.
    ///
    /// For a container with a known size, any unread elements left in it are skipped and the reader is positioned right after it.  An unknown-size container has no end other than where its children stop, so only the remainder of the current child is skipped and the parent continues from there.
    ///
    /// # Errors
    ///
    /// Fails if the reader is at the root level.
    ///
    pub fn leave_container(&mut self) -> Result<(), ReaderError> {
        if self.frames.len() <= 1 {
            return Err(InvalidOperationError::AtRootLevel.into());
        }

        if let Some(frame) = self.frames.pop() {
            let id = frame.id.map(|id| id.encoded_value()).unwrap_or_default();
            match frame.end {
                Some(end) => {
                    if self.position != end {
                        debug!("Leaving container {:#x}, skipping to {}", id, end);
                        self.seek_to(end)?;
                    }
                }
                None => {
                    debug!("Leaving unknown-size container {:#x} at {}", id, self.position);
                    self.skip_current()?;
                }
            }
        }
        self.current = None;
        Ok(())
    }

    ///
    /// Reads forward through the current level until an element with the given id is found.
    ///
    /// Returns `false` if the end of the container is reached first.
    ///
    pub fn locate_element(&mut self, id: VInt) -> Result<bool, ReaderError> {
        while self.read_next()? {
            if self.element_id()? == id {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn element_id(&self) -> Result<VInt, ReaderError> {
        Ok(self.current()?.id)
    }

    ///
    /// The size of the current element's payload.  For an unknown-size element this is the distance to the nearest known boundary.
    ///
    pub fn element_size(&self) -> Result<u64, ReaderError> {
        Ok(self.current()?.size)
    }

    pub fn declared_size(&self) -> Result<DeclaredSize, ReaderError> {
        Ok(self.current()?.declared_size)
    }

    ///
    /// Absolute position of the first byte of the current element's header.
    ///
    pub fn element_position(&self) -> Result<u64, ReaderError> {
        Ok(self.current()?.header_start)
    }

    ///
    /// Number of containers currently entered.  Zero at the root level.
    ///
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    ///
    /// Reads the current element as a signed integer.  An empty payload is `0`.
    ///
    /// # Errors
    ///
    /// Fails if the payload is wider than 8 bytes or has already been consumed.
    ///
    pub fn read_int(&mut self) -> Result<i64, ReaderError> {
        let (data, position) = self.read_typed_payload(|size| size <= 8, "a signed integer")?;
        arr_to_i64(&data).ok_or_else(|| invalid_size(position, &data, "a signed integer"))
    }

    ///
    /// Reads the current element as an unsigned integer.  An empty payload is `0`.
    ///
    /// # Errors
    ///
    /// Fails if the payload is wider than 8 bytes or has already been consumed.
    ///
    pub fn read_uint(&mut self) -> Result<u64, ReaderError> {
        let (data, position) = self.read_typed_payload(|size| size <= 8, "an unsigned integer")?;
        arr_to_u64(&data).ok_or_else(|| invalid_size(position, &data, "an unsigned integer"))
    }

    ///
    /// Reads the current element as a float.  4 byte payloads are widened to `f64`.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not exactly 4 or 8 bytes wide.
    ///
    pub fn read_float(&mut self) -> Result<f64, ReaderError> {
        let (data, position) = self.read_typed_payload(|size| matches!(size, 4 | 8), "a float")?;
        arr_to_f64(&data).ok_or_else(|| invalid_size(position, &data, "a float"))
    }

    ///
    /// Reads the current element as a date.  An empty payload is the EBML epoch, 2001-01-01T00:00:00Z.
    ///
    pub fn read_date(&mut self) -> Result<DateTime<Utc>, ReaderError> {
        let (data, position) = self.read_typed_payload(|size| size == 0 || size == 8, "a date")?;
        let nanos = arr_to_i64(&data).ok_or_else(|| invalid_size(position, &data, "a date"))?;
        Ok(tools::ebml_nanos_to_date(nanos).ok_or(CorruptedDataError::DateOutOfRange { position })?)
    }

    ///
    /// Reads the current element as an ASCII string, stopping at the first NUL byte.  Bytes outside of the ASCII range are replaced with `?`.
    ///
    pub fn read_ascii(&mut self) -> Result<String, ReaderError> {
        let (data, _) = self.read_typed_payload(|_| true, "a string")?;
        Ok(until_nul(&data)
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect())
    }

    ///
    /// Reads the current element as a UTF-8 string, stopping at the first NUL byte.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not valid UTF-8.
    ///
    pub fn read_utf8(&mut self) -> Result<String, ReaderError> {
        let (mut data, position) = self.read_typed_payload(|_| true, "a string")?;
        let len = until_nul(&data).len();
        data.truncate(len);
        String::from_utf8(data).map_err(|source| CorruptedDataError::InvalidUtf8 { position, source }.into())
    }

    ///
    /// Copies the next part of the current element's payload into `buffer`.
    ///
    /// This can be called repeatedly to read a large payload in pieces.  Returns the number of bytes copied, which is less than `buffer.len()` when the element has fewer bytes left.  Returns `None` once the payload is exhausted; a zero-size element returns `None` straight away.
    ///
    /// # Errors
    ///
    /// Fails if the element has already been read with a typed accessor, or if the source ends before the element does.
    ///
    pub fn read_binary(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, ReaderError> {
        let current = self.current()?;
        let consumed = match current.state {
            PayloadState::Unread => 0,
            PayloadState::ReadAsBinary { consumed } => consumed,
            PayloadState::ReadAsTyped => {
                return Err(InvalidOperationError::PayloadAlreadyConsumed { id: current.id.encoded_value() }.into());
            }
        };

        let remaining = current.size - consumed;
        if remaining == 0 {
            self.set_state(PayloadState::ReadAsBinary { consumed });
            return Ok(None);
        }

        let wanted = remaining.min(buffer.len() as u64) as usize;
        let read = read_fully(&mut self.source, &mut buffer[..wanted])?;
        self.position += read as u64;
        if read < wanted {
            self.current = None;
            return Err(CorruptedDataError::UnexpectedEof { position: self.position }.into());
        }

        self.set_state(PayloadState::ReadAsBinary { consumed: consumed + read as u64 });
        Ok(Some(read))
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    ///
    /// Gives mutable access to the underlying source.  Moving the source's position behind the reader's back will confuse it; use [`EbmlReader::read_at`] to reposition.
    ///
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn current(&self) -> Result<CurrentElement, ReaderError> {
        self.current.ok_or_else(|| InvalidOperationError::NoCurrentElement.into())
    }

    fn set_state(&mut self, state: PayloadState) {
        if let Some(current) = self.current.as_mut() {
            current.state = state;
        }
    }

    fn seek_to(&mut self, position: u64) -> Result<(), ReaderError> {
        self.position = self.source.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn skip_current(&mut self) -> Result<(), ReaderError> {
        if let Some(current) = self.current.take() {
            let end = current.data_end();
            if self.position != end {
                trace!("Skipping {} unread bytes of element {:#x}", end.saturating_sub(self.position), current.id.encoded_value());
                self.seek_to(end)?;
            }
        }
        Ok(())
    }

    ///
    /// The boundary children of the innermost container must stay within, if any.
    ///
    fn current_limit(&self) -> Option<u64> {
        self.frames.iter().rev().find_map(|frame| frame.end)
    }

    fn stream_len(&mut self) -> Result<u64, ReaderError> {
        let len = self.source.seek(SeekFrom::End(0))?;
        self.source.seek(SeekFrom::Start(self.position))?;
        Ok(len)
    }

    fn read_vint(&mut self, max_length: usize) -> Result<Option<VInt>, ReaderError> {
        let position = self.position;
        let vint = VInt::read(&mut self.source, max_length).map_err(|err| vint_error(err, position))?;
        if let Some(vint) = vint {
            self.position += vint.length() as u64;
        }
        Ok(vint)
    }

    fn read_header(&mut self) -> Result<bool, ReaderError> {
        self.current = None;

        let limit = self.current_limit();
        if let Some(limit) = limit {
            if self.position >= limit {
                return Ok(false);
            }
        }

        let header_start = self.position;
        let id = match self.read_vint(self.max_id_length)? {
            Some(id) => id,
            None => return Ok(false),
        };

        if !id.is_valid_identifier() || id.value() == 0 {
            return Err(CorruptedDataError::InvalidElementId { id: id.encoded_value(), position: header_start }.into());
        }

        let size = self
            .read_vint(self.max_size_length)?
            .ok_or(CorruptedDataError::UnexpectedEof { position: self.position })?;
        let data_start = self.position;
        let declared_size = DeclaredSize::new(&size);

        let size = match declared_size {
            DeclaredSize::Known(size) => {
                if let Some(limit) = limit {
                    if data_start.saturating_add(size) > limit {
                        return Err(CorruptedDataError::OversizedChildElement { id: id.encoded_value(), position: header_start, size }.into());
                    }
                }
                size
            }
            DeclaredSize::Unknown => {
                if self.depth() == 0 {
                    return Err(CorruptedDataError::UnknownSizeAtRoot { id: id.encoded_value(), position: header_start }.into());
                }
                let bound = match limit {
                    Some(limit) => limit,
                    None => self.stream_len()?,
                };
                bound.saturating_sub(data_start)
            }
        };

        trace!("Read element {:#x} at {} with size {} ({:?})", id.encoded_value(), header_start, size, declared_size);
        self.current = Some(CurrentElement {
            id,
            declared_size,
            size,
            header_start,
            data_start,
            state: PayloadState::Unread,
        });
        Ok(true)
    }

    fn read_typed_payload<F>(&mut self, valid_size: F, expected: &'static str) -> Result<(Vec<u8>, u64), ReaderError>
    where
        F: Fn(u64) -> bool,
    {
        let current = self.current()?;
        if current.state != PayloadState::Unread {
            return Err(InvalidOperationError::PayloadAlreadyConsumed { id: current.id.encoded_value() }.into());
        }
        if !valid_size(current.size) {
            return Err(CorruptedDataError::InvalidPayloadSize { position: current.header_start, size: current.size, expected }.into());
        }

        let mut data = Vec::new();
        let read = (&mut self.source).take(current.size).read_to_end(&mut data)?;
        self.position += read as u64;
        if (read as u64) < current.size {
            self.current = None;
            return Err(CorruptedDataError::UnexpectedEof { position: self.position }.into());
        }

        self.set_state(PayloadState::ReadAsTyped);
        Ok((data, current.header_start))
    }
}

fn check_limit(length: usize) -> Result<usize, ReaderError> {
    if (1..=8).contains(&length) {
        Ok(length)
    } else {
        Err(InvalidOperationError::InvalidLimit(length).into())
    }
}

fn invalid_size(position: u64, data: &[u8], expected: &'static str) -> ReaderError {
    CorruptedDataError::InvalidPayloadSize { position, size: data.len() as u64, expected }.into()
}

fn until_nul(data: &[u8]) -> &[u8] {
    match data.iter().position(|&b| b == 0) {
        Some(end) => &data[..end],
        None => data,
    }
}

fn vint_error(err: VintError, position: u64) -> ReaderError {
    match err {
        VintError::TooLong { length, max_length } => CorruptedDataError::VintTooLong { position, length, max_length }.into(),
        VintError::UnexpectedEof => CorruptedDataError::UnexpectedEof { position }.into(),
        VintError::ReadError { source } => ReaderError::ReadError { source },
        _ => CorruptedDataError::InvalidVint { position }.into(),
    }
}

impl<R: Read + Seek> Read for EbmlReader<R> {
    ///
    /// Reads the current element's payload as binary.  Returns `Ok(0)` once the payload is exhausted.
    ///
    /// Fails with [`io::ErrorKind::InvalidInput`] if there is no current element, and with [`io::ErrorKind::InvalidData`] if the payload was already read as a typed value or the source is corrupted.
    ///
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_binary(buf) {
            Ok(read) => Ok(read.unwrap_or(0)),
            Err(ReaderError::ReadError { source }) => Err(source),
            Err(err @ ReaderError::InvalidOperation(InvalidOperationError::NoCurrentElement)) => Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err)),
        }
    }
}
