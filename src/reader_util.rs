use crate::vint::VInt;

///
/// The size declared in an element header.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DeclaredSize {
    Known(u64),
    Unknown,
}

impl DeclaredSize {
    pub fn new(size: &VInt) -> Self {
        match size.as_size() {
            Some(value) => DeclaredSize::Known(value),
            None => DeclaredSize::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DeclaredSize::Unknown)
    }
}

///
/// How much of the current element's payload has been handed out.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum PayloadState {
    Unread,
    ReadAsBinary { consumed: u64 },
    ReadAsTyped,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct CurrentElement {
    pub id: VInt,
    pub declared_size: DeclaredSize,
    pub size: u64,
    pub header_start: u64,
    pub data_start: u64,
    pub state: PayloadState,
}

impl CurrentElement {
    pub fn data_end(&self) -> u64 {
        self.data_start.saturating_add(self.size)
    }
}

///
/// One open container.  `end` is `None` when the container has no boundary of its own: an unknown-size master, or an unbounded root.
///
#[derive(Copy, Clone, Debug)]
pub(crate) struct ContainerFrame {
    pub id: Option<VInt>,
    pub end: Option<u64>,
}

impl ContainerFrame {
    pub fn root(end: Option<u64>) -> Self {
        ContainerFrame { id: None, end }
    }
}

///
/// Default upper bound on element id width (EBMLMaxIDLength).
///
pub const DEFAULT_MAX_ID_LENGTH: usize = 4;

///
/// Default upper bound on element size width (EBMLMaxSizeLength).
///
pub const DEFAULT_MAX_SIZE_LENGTH: usize = 8;
