use std::cmp;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::mem;

use log::{debug, error, trace};

use super::element_writer::{ElementWrite, MasterElementSizeStrategy};
use super::errors::writer::WriterError;
use super::vint::VInt;

///
/// Width of the size field reserved by backpatching and hybrid master elements unless told otherwise.
///
pub const DEFAULT_SIZE_FIELD_LENGTH: usize = 8;

///
/// Number of bytes a hybrid master element buffers before it switches to backpatching, unless told otherwise.
///
pub const DEFAULT_HYBRID_BUFFER_LIMIT: usize = 128;

///
/// A destination that can be written to and repositioned.  Backpatching needs both.
///
/// This is implemented for everything that is [`Write`] + [`Seek`], including [`MasterElementWriter`]'s own sink, so backpatched elements can be nested in any master element.
///
pub trait SeekableWrite: Write + Seek {
    fn as_write(&mut self) -> &mut dyn Write;
}

impl<T: Write + Seek> SeekableWrite for T {
    fn as_write(&mut self) -> &mut dyn Write {
        self
    }
}

pub(crate) fn start_master<'a>(
    parent: &'a mut dyn SeekableWrite,
    id: VInt,
    strategy: MasterElementSizeStrategy,
    size_field_length: usize,
    buffer_limit: usize,
) -> Result<MasterElementWriter<'a>, WriterError> {
    if strategy != MasterElementSizeStrategy::Buffered && !(1..=8).contains(&size_field_length) {
        return Err(WriterError::InvalidSizeFieldLength(size_field_length));
    }

    match strategy {
        MasterElementSizeStrategy::Buffered => Ok(MasterElementWriter::buffered(parent.as_write(), id)),
        MasterElementSizeStrategy::Backpatching => {
            let (size_position, content_start) = reserve_header(&mut *parent, id, size_field_length)?;
            trace!("Started backpatching master element {:#x}, size field at {}", id.encoded_value(), size_position);
            Ok(MasterElementWriter::from_state(id, size_field_length, SinkState::Backpatching { parent, size_position, content_start }))
        }
        MasterElementSizeStrategy::Hybrid => Ok(MasterElementWriter::from_state(
            id,
            size_field_length,
            SinkState::HybridBuffering { parent, buffer: Cursor::new(Vec::new()), buffer_limit },
        )),
    }
}

enum SinkState<'a> {
    Buffered {
        parent: &'a mut dyn Write,
        buffer: Cursor<Vec<u8>>,
    },
    Backpatching {
        parent: &'a mut dyn SeekableWrite,
        size_position: u64,
        content_start: u64,
    },
    HybridBuffering {
        parent: &'a mut dyn SeekableWrite,
        buffer: Cursor<Vec<u8>>,
        buffer_limit: usize,
    },
    Finished,
}

///
/// Where the children of a master element go.
///
/// Positions reported through [`Seek`] are relative to the start of the element's content whatever the strategy, and stay valid when a hybrid element switches to backpatching.  That lets a backpatching child record its size field position inside a parent that is still buffering.
///
struct MasterSink<'a> {
    id: VInt,
    size_field_length: usize,
    state: SinkState<'a>,
}

impl<'a> MasterSink<'a> {
    fn is_finished(&self) -> bool {
        matches!(self.state, SinkState::Finished)
    }

    fn switch_to_backpatching(&mut self) -> io::Result<()> {
        if let SinkState::HybridBuffering { parent, buffer, buffer_limit } = mem::replace(&mut self.state, SinkState::Finished) {
            debug!("Master element {:#x} exceeded {} buffered bytes, switching to backpatching", self.id.encoded_value(), buffer_limit);

            let (size_position, content_start) = reserve_header(&mut *parent, self.id, self.size_field_length)?;
            parent.write_all(buffer.get_ref())?;

            let offset = buffer.position();
            if offset != buffer.get_ref().len() as u64 {
                parent.seek(SeekFrom::Start(content_start + offset))?;
            }

            self.state = SinkState::Backpatching { parent, size_position, content_start };
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriterError> {
        match mem::replace(&mut self.state, SinkState::Finished) {
            SinkState::Buffered { parent, buffer } => flush_buffered(parent, self.id, buffer.get_ref()),
            SinkState::HybridBuffering { parent, buffer, .. } => flush_buffered(parent, self.id, buffer.get_ref()),
            SinkState::Backpatching { parent, size_position, content_start } => {
                backpatch(parent, self.id, size_position, content_start, self.size_field_length)
            }
            SinkState::Finished => Ok(()),
        }
    }
}

impl<'a> Write for MasterSink<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            SinkState::Buffered { buffer, .. } => return buffer.write(buf),
            SinkState::Backpatching { parent, .. } => return parent.write(buf),
            SinkState::HybridBuffering { buffer, buffer_limit, .. } => {
                let end = cmp::max(buffer.get_ref().len() as u64, buffer.position() + buf.len() as u64);
                if end <= *buffer_limit as u64 {
                    return buffer.write(buf);
                }
            }
            SinkState::Finished => return Err(finished_error(self.id)),
        }

        self.switch_to_backpatching()?;
        self.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            SinkState::Backpatching { parent, .. } => parent.flush(),
            SinkState::Finished => Err(finished_error(self.id)),
            _ => Ok(()),
        }
    }
}

impl<'a> Seek for MasterSink<'a> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.state {
            SinkState::Buffered { buffer, .. } | SinkState::HybridBuffering { buffer, .. } => buffer.seek(pos),
            SinkState::Backpatching { parent, content_start, .. } => {
                let target = match pos {
                    SeekFrom::Start(offset) => SeekFrom::Start(*content_start + offset),
                    other => other,
                };
                let absolute = parent.seek(target)?;
                absolute
                    .checked_sub(*content_start)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek to before the start of the master element"))
            }
            SinkState::Finished => Err(finished_error(self.id)),
        }
    }
}

///
/// Writes the children of one master element.
///
/// Obtained from [`EbmlWriter`][`crate::EbmlWriter`] or from another `MasterElementWriter`, and written to through [`ElementWrite`].  A child borrows its parent mutably, so it must be finished (or dropped) before the parent can be written to again.
///
/// Call [`MasterElementWriter::finish`] to flush the element or fill in its size.  Finishing is idempotent.  If the writer is dropped without being finished, it is finished then and any error is logged.  Writing to a finished writer fails with [`WriterError::ElementFinished`], regardless of strategy.
///
pub struct MasterElementWriter<'a> {
    sink: MasterSink<'a>,
}

impl<'a> MasterElementWriter<'a> {
    pub(crate) fn buffered(parent: &'a mut dyn Write, id: VInt) -> Self {
        Self::from_state(id, DEFAULT_SIZE_FIELD_LENGTH, SinkState::Buffered { parent, buffer: Cursor::new(Vec::new()) })
    }

    fn from_state(id: VInt, size_field_length: usize, state: SinkState<'a>) -> Self {
        MasterElementWriter {
            sink: MasterSink { id, size_field_length, state },
        }
    }

    ///
    /// The id this master element was started with.
    ///
    pub fn id(&self) -> VInt {
        self.sink.id
    }

    pub fn is_finished(&self) -> bool {
        self.sink.is_finished()
    }

    ///
    /// Starts a child master element that collects its children in memory.
    ///
    pub fn start_buffered_master_element(&mut self, id: VInt) -> Result<MasterElementWriter<'_>, WriterError> {
        self.check_open()?;
        Ok(MasterElementWriter::buffered(&mut self.sink, id))
    }

    ///
    /// Starts a child master element with the given strategy, reserving [`DEFAULT_SIZE_FIELD_LENGTH`] bytes for the size where the strategy needs it.
    ///
    pub fn start_master_element(&mut self, id: VInt, strategy: MasterElementSizeStrategy) -> Result<MasterElementWriter<'_>, WriterError> {
        self.start_master_element_with_size_length(id, strategy, DEFAULT_SIZE_FIELD_LENGTH)
    }

    pub fn start_master_element_with_size_length(&mut self, id: VInt, strategy: MasterElementSizeStrategy, size_field_length: usize) -> Result<MasterElementWriter<'_>, WriterError> {
        self.check_open()?;
        start_master(&mut self.sink, id, strategy, size_field_length, DEFAULT_HYBRID_BUFFER_LIMIT)
    }

    pub fn start_hybrid_master_element(&mut self, id: VInt, size_field_length: usize, buffer_limit: usize) -> Result<MasterElementWriter<'_>, WriterError> {
        self.check_open()?;
        start_master(&mut self.sink, id, MasterElementSizeStrategy::Hybrid, size_field_length, buffer_limit)
    }

    ///
    /// Completes the element: buffered content is written out with its header, and a reserved size field is filled in.
    ///
    /// # Errors
    ///
    /// Fails if the destination cannot be written or repositioned, or if the content is too large for the reserved size field.
    ///
    pub fn finish(&mut self) -> Result<(), WriterError> {
        self.sink.finish()
    }

    fn check_open(&self) -> Result<(), WriterError> {
        if self.sink.is_finished() {
            Err(WriterError::ElementFinished { id: self.sink.id.encoded_value() })
        } else {
            Ok(())
        }
    }
}

impl<'a> ElementWrite for MasterElementWriter<'a> {
    fn sink(&mut self) -> Result<&mut dyn Write, WriterError> {
        self.check_open()?;
        Ok(&mut self.sink)
    }
}

impl<'a> Drop for MasterElementWriter<'a> {
    fn drop(&mut self) {
        if !self.sink.is_finished() {
            if let Err(e) = self.sink.finish() {
                error!("Failed to finish master element {:#x}: {}", self.sink.id.encoded_value(), e);
            }
        }
    }
}

fn reserve_header<W: Write + Seek + ?Sized>(parent: &mut W, id: VInt, size_field_length: usize) -> io::Result<(u64, u64)> {
    id.write(parent)?;
    let size_position = parent.stream_position()?;
    parent.write_all(&[0u8; 8][..size_field_length])?;
    let content_start = parent.stream_position()?;
    Ok((size_position, content_start))
}

fn flush_buffered<W: Write + ?Sized>(parent: &mut W, id: VInt, data: &[u8]) -> Result<(), WriterError> {
    let size = VInt::encode_size(data.len() as u64, None)?;
    trace!("Flushing buffered master element {:#x} with {} bytes", id.encoded_value(), data.len());
    id.write(parent)?;
    size.write(parent)?;
    parent.write_all(data)?;
    Ok(())
}

fn backpatch<W: Write + Seek + ?Sized>(parent: &mut W, id: VInt, size_position: u64, content_start: u64, size_field_length: usize) -> Result<(), WriterError> {
    let end = parent.stream_position()?;
    let size = VInt::encode_size(end.saturating_sub(content_start), Some(size_field_length))?;
    trace!("Backpatching master element {:#x} at {} with size {}", id.encoded_value(), size_position, size.value());

    parent.seek(SeekFrom::Start(size_position))?;
    size.write(parent)?;
    parent.seek(SeekFrom::Start(end))?;
    Ok(())
}

fn finished_error(id: VInt) -> io::Error {
    io::Error::new(io::ErrorKind::Other, WriterError::ElementFinished { id: id.encoded_value() })
}
