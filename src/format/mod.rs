//! Field-level layout of the PWS3 stream.
//!
//! After the prologue the file is a sequence of encrypted 16-byte blocks carrying
//! length-prefixed fields, closed by an unencrypted sentinel block and the HMAC:
//! ```text
//! PROLOGUE (152) | FIELD BLOCKS (16 * N) | "PWS3-EOFPWS3-EOF" (16) | HMAC (32)
//! ```

pub mod framer;
pub mod record;

pub use framer::{FieldReader, FieldWriter};

/// Unencrypted marker closing the field stream.
pub const SENTINEL: &[u8; 16] = b"PWS3-EOFPWS3-EOF";
/// Field type closing a header group or a record group.
pub const END_OF_ENTRY: u8 = 0xFF;
/// Payload bytes carried inside the first block of a field.
pub const INLINE_LEN: usize = 11;
/// Length prefix (4) plus type byte (1).
pub const FIELD_PREFIX_LEN: usize = 5;

/// One decoded field: a type code and its payload.
///
/// The same code means different things in header and record context; see
/// [`HeaderField`] and [`RecordField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl Field {
    pub fn is_end_of_entry(&self) -> bool {
        self.kind == END_OF_ENTRY
    }
}

/// Field codes of the header group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderField {
    Version = 0x00,
    Uuid = 0x01,
    NonDefaultPrefs = 0x02,
    TreeDisplayStatus = 0x03,
    LastSaveTime = 0x04,
    LastSaveProgram = 0x06,
    LastSaveUser = 0x07,
    LastSaveHost = 0x08,
    DatabaseName = 0x09,
    DatabaseDescription = 0x0a,
    DatabaseFilters = 0x0b,
    RecentlyUsed = 0x0f,
    PasswordPolicies = 0x10,
    EmptyGroups = 0x11,
}

impl HeaderField {
    pub fn from_code(code: u8) -> Option<Self> {
        use HeaderField::*;
        Some(match code {
            0x00 => Version,
            0x01 => Uuid,
            0x02 => NonDefaultPrefs,
            0x03 => TreeDisplayStatus,
            0x04 => LastSaveTime,
            0x06 => LastSaveProgram,
            0x07 => LastSaveUser,
            0x08 => LastSaveHost,
            0x09 => DatabaseName,
            0x0a => DatabaseDescription,
            0x0b => DatabaseFilters,
            0x0f => RecentlyUsed,
            0x10 => PasswordPolicies,
            0x11 => EmptyGroups,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Field codes of a record group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordField {
    Uuid = 0x01,
    Group = 0x02,
    Title = 0x03,
    Username = 0x04,
    Notes = 0x05,
    Password = 0x06,
    CreationTime = 0x07,
    Url = 0x0d,
    Email = 0x14,
}

impl RecordField {
    pub fn from_code(code: u8) -> Option<Self> {
        use RecordField::*;
        Some(match code {
            0x01 => Uuid,
            0x02 => Group,
            0x03 => Title,
            0x04 => Username,
            0x05 => Notes,
            0x06 => Password,
            0x07 => CreationTime,
            0x0d => Url,
            0x14 => Email,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}
