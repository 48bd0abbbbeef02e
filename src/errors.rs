pub mod vint {
    use std::io;
    use thiserror::Error;

    ///
    /// Errors that can occur while building, decoding, or reading a [`VInt`][`crate::VInt`].
    ///
    #[derive(Debug, Error)]
    pub enum VintError {
        #[error("Value too large to be written as a vint: {0}")]
        ValueTooLarge(u64),

        #[error("Vint length must be between 1 and 8, got {0}")]
        LengthOutOfRange(usize),

        #[error("Value {value} does not fit in a vint of length {length}")]
        InsufficientLength { value: u64, length: usize },

        #[error("Value {0:#x} is not a valid encoded vint")]
        InvalidEncoding(u64),

        #[error("Value {0:#x} is outside of the range allowed for element ids")]
        IdOutOfRange(u32),

        #[error("Vint marker octet is zero, lengths over 8 octets are not supported")]
        InvalidMarker,

        #[error("Vint of length {length} exceeds the maximum allowed length of {max_length}")]
        TooLong { length: usize, max_length: usize },

        #[error("Source ended in the middle of a vint")]
        UnexpectedEof,

        #[error("Error reading vint from source.")]
        ReadError {
            #[source]
            source: io::Error,
        },
    }
}

pub mod reader {
    use std::io;
    use std::string;
    use thiserror::Error;

    ///
    /// Describes a violation of the EBML format found in the source data.
    ///
    /// Every variant carries the absolute byte position where the problem was detected.
    ///
    #[derive(Debug, Error)]
    pub enum CorruptedDataError {
        #[error("Invalid vint at position {position}: marker octet is zero")]
        InvalidVint { position: u64 },

        #[error("Vint at position {position} has length {length}, more than the allowed {max_length}")]
        VintTooLong { position: u64, length: usize, max_length: usize },

        #[error("Invalid element id {id:#x} at position {position}")]
        InvalidElementId { id: u64, position: u64 },

        #[error("Element {id:#x} at position {position} has unknown size; unknown-size elements are not allowed at root level")]
        UnknownSizeAtRoot { id: u64, position: u64 },

        #[error("Element {id:#x} at position {position} with size {size} overruns its parent")]
        OversizedChildElement { id: u64, position: u64, size: u64 },

        #[error("Unexpected end of data at position {position}")]
        UnexpectedEof { position: u64 },

        #[error("Element at position {position} has a {size} byte payload, which is invalid for {expected}")]
        InvalidPayloadSize { position: u64, size: u64, expected: &'static str },

        #[error("Cannot read at negative position {position}")]
        NegativePosition { position: i64 },

        #[error("Element at position {position} does not contain valid utf-8")]
        InvalidUtf8 {
            position: u64,
            #[source]
            source: string::FromUtf8Error,
        },

        #[error("Date in element at position {position} is outside of the representable range")]
        DateOutOfRange { position: u64 },
    }

    ///
    /// Describes an incorrect use of the reader api.  These indicate a bug in the calling code rather than bad data.
    ///
    #[derive(Debug, Error)]
    pub enum InvalidOperationError {
        #[error("No current element, call `read_next` first")]
        NoCurrentElement,

        #[error("Element {id:#x} has already been accessed as a payload and cannot be entered as a container")]
        NotAContainer { id: u64 },

        #[error("Cannot leave the root level")]
        AtRootLevel,

        #[error("Payload of element {id:#x} has already been consumed")]
        PayloadAlreadyConsumed { id: u64 },

        #[error("Vint length limit must be between 1 and 8, got {0}")]
        InvalidLimit(usize),
    }

    #[derive(Debug, Error)]
    pub enum ReaderError {
        #[error("Encountered corrupted data. {0}")]
        CorruptedData(#[from] CorruptedDataError),

        #[error("Invalid operation. {0}")]
        InvalidOperation(#[from] InvalidOperationError),

        #[error("Error reading from source.")]
        ReadError {
            #[source]
            source: io::Error,
        },
    }

    impl From<io::Error> for ReaderError {
        fn from(source: io::Error) -> Self {
            ReaderError::ReadError { source }
        }
    }
}

pub mod writer {
    use std::io;
    use thiserror::Error;

    use super::vint::VintError;

    #[derive(Debug, Error)]
    pub enum WriterError {
        #[error("Problem writing element size. {0}")]
        Vint(#[from] VintError),

        #[error("Master element {id:#x} has already been finished")]
        ElementFinished { id: u64 },

        #[error("Size field length must be between 1 and 8, got {0}")]
        InvalidSizeFieldLength(usize),

        #[error("Date cannot be represented as nanoseconds from the EBML epoch")]
        DateOutOfRange,

        #[error("Error writing to destination.")]
        WriteError {
            #[source]
            source: io::Error,
        },
    }

    impl From<io::Error> for WriterError {
        fn from(source: io::Error) -> Self {
            WriterError::WriteError { source }
        }
    }
}
