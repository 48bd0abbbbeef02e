//! This crate provides a reader and a writer for [EBML][EBML] streams.  Its primary goal is to walk and emit EBML elements without needing to know the schema they belong to.
//!
//! [EBML][EBML] stands for Extensible Binary Meta-Language and is somewhat of a
//! binary version of XML. It's used for container formats like [WebM][webm] or
//! [MKV][mkv].
//!
//! # Reading
//! [`EbmlReader`] is a pull-based cursor.  Each call to [`EbmlReader::read_next`] moves to the next element at the current level, and the consumer decides whether to step into it as a master element, read its payload as a typed value, or skip it.  Element sizes marked as "unknown" (as described in [RFC8794][rfc8794]) are supported anywhere below the root level.
//!
//! # Writing
//! [`EbmlWriter`] writes elements to any [`std::io::Write`] destination through the [`ElementWrite`] trait.  Master elements are written through a nested [`MasterElementWriter`] using one of three [`MasterElementSizeStrategy`]s: buffered in memory, backpatched in place, or a hybrid of the two.
//!
//! [EBML]: http://ebml.sourceforge.net/
//! [webm]: https://www.webmproject.org/
//! [mkv]: http://www.matroska.org/technical/specs/index.html
//! [rfc8794]: https://datatracker.ietf.org/doc/rfc8794/
//!

mod element_reader;
mod element_writer;
mod errors;
mod master_writer;
mod reader_util;
pub mod tools;
mod vint;

pub use self::element_reader::EbmlReader;
pub use self::element_writer::{EbmlWriter, ElementWrite, MasterElementSizeStrategy};
pub use self::master_writer::{MasterElementWriter, SeekableWrite, DEFAULT_HYBRID_BUFFER_LIMIT, DEFAULT_SIZE_FIELD_LENGTH};
pub use self::reader_util::{DeclaredSize, DEFAULT_MAX_ID_LENGTH, DEFAULT_MAX_SIZE_LENGTH};
pub use self::vint::{VInt, MAX_ELEMENT_ID, MAX_SIZE_VALUE};

pub mod error {
    //!
    //! Contains the error types produced by this crate.
    //!
    pub use super::errors::reader::{CorruptedDataError, InvalidOperationError, ReaderError};
    pub use super::errors::vint::VintError;
    pub use super::errors::writer::WriterError;
}
