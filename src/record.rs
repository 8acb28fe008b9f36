//! Record framing shared by the file store writer and reader.

/// Bytes of a record header.
pub const HEADER_SIZE: usize = 4;

/// Value of the reserved byte in every valid header.
pub const HEADER_MARKER: u8 = 0xA5;

/// Position of a fragment within its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordFlag {
    /// No more data in this file.
    Empty = 0,
    /// First fragment of a record that continues on the next page.
    First = 1,
    Middle = 2,
    /// Final fragment of a record that started on an earlier page.
    Last = 3,
    /// A whole record within one page.
    Full = 4,
}

impl RecordFlag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordFlag::Empty),
            1 => Some(RecordFlag::First),
            2 => Some(RecordFlag::Middle),
            3 => Some(RecordFlag::Last),
            4 => Some(RecordFlag::Full),
            _ => None,
        }
    }

    /// Flag of a fragment given whether it opens and whether it closes its record.
    pub fn for_fragment(opens: bool, closes: bool) -> Self {
        match (opens, closes) {
            (true, true) => RecordFlag::Full,
            (true, false) => RecordFlag::First,
            (false, true) => RecordFlag::Last,
            (false, false) => RecordFlag::Middle,
        }
    }

    /// Whether a record starts with this fragment.
    pub fn opens_record(self) -> bool {
        matches!(self, RecordFlag::First | RecordFlag::Full)
    }

    /// Whether the record ends with this fragment.
    pub fn closes_record(self) -> bool {
        matches!(self, RecordFlag::Last | RecordFlag::Full)
    }
}

/// `[reserved:1][flag:1][size:2]`, size counting the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub reserved: u8,
    pub flag: u8,
    pub size: u16,
}

impl RecordHeader {
    pub fn new(flag: RecordFlag, size: u16) -> Self {
        Self {
            reserved: HEADER_MARKER,
            flag: flag as u8,
            size,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_le_bytes();
        [self.reserved, self.flag, size[0], size[1]]
    }

    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            reserved: bytes[0],
            flag: bytes[1],
            size: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Flag of a header carrying the marker, `None` for garbage.
    pub fn valid_flag(&self) -> Option<RecordFlag> {
        if self.reserved != HEADER_MARKER {
            return None;
        }
        RecordFlag::from_u8(self.flag)
    }

    /// Whether this header ends the data of a file.
    ///
    /// An explicit `Empty` flag and the zeroed tail of an unfinished page
    /// both qualify.
    pub fn is_end_of_data(&self) -> bool {
        self.flag == RecordFlag::Empty as u8 && (self.reserved == HEADER_MARKER || self.size == 0)
    }
}
