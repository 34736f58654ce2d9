use crate::err::DeserializationResult;
use crate::utils::{ByteCursor, bytes};

pub const EVT_END_OF_FILE_RECORD_SIZE: usize = 40;

pub const EVT_END_OF_FILE_SIGNATURE1: [u8; 4] = [0x11; 4];
pub const EVT_END_OF_FILE_SIGNATURE2: [u8; 4] = [0x22; 4];
pub const EVT_END_OF_FILE_SIGNATURE3: [u8; 4] = [0x33; 4];
pub const EVT_END_OF_FILE_SIGNATURE4: [u8; 4] = [0x44; 4];

/// The sentinel that terminates the circular record region.
///
/// Its offsets and record numbers mirror the file header, and are authoritative when the
/// header was not flushed (dirty logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfFileRecord {
    pub size: u32,
    pub first_record_offset: u32,
    pub end_of_file_record_offset: u32,
    pub last_record_number: u32,
    pub first_record_number: u32,
    pub copy_of_size: u32,
}

impl EndOfFileRecord {
    pub fn from_bytes(data: &[u8]) -> DeserializationResult<EndOfFileRecord> {
        // A short declared size is a size mismatch, not a truncated read.
        let declared = bytes::read_u32_le_r(data, 0, "end of file record size")?;
        bytes::ensure_size(
            u64::from(declared),
            EVT_END_OF_FILE_RECORD_SIZE as u64,
            "end of file record size",
        )?;

        let data = bytes::slice_r(data, 0, EVT_END_OF_FILE_RECORD_SIZE, "end of file record")?;
        let mut cursor = ByteCursor::new(data);

        let size = cursor.u32_named("end of file record size")?;

        for (expected, what) in [
            (EVT_END_OF_FILE_SIGNATURE1, "end of file record signature1"),
            (EVT_END_OF_FILE_SIGNATURE2, "end of file record signature2"),
            (EVT_END_OF_FILE_SIGNATURE3, "end of file record signature3"),
            (EVT_END_OF_FILE_SIGNATURE4, "end of file record signature4"),
        ] {
            bytes::ensure_sig(cursor.array::<4>(what)?, expected, what)?;
        }

        let first_record_offset = cursor.u32_named("first_record_offset")?;
        let end_of_file_record_offset = cursor.u32_named("end_of_file_record_offset")?;
        let last_record_number = cursor.u32_named("last_record_number")?;
        let first_record_number = cursor.u32_named("first_record_number")?;
        let copy_of_size = cursor.u32_named("end of file record copy_of_size")?;

        bytes::ensure_size(
            u64::from(copy_of_size),
            u64::from(size),
            "end of file record copy_of_size",
        )?;

        Ok(EndOfFileRecord {
            size,
            first_record_offset,
            end_of_file_record_offset,
            last_record_number,
            first_record_number,
            copy_of_size,
        })
    }

    /// Whether `data` starts like an end of file record (size field followed by the first
    /// signature). Used to dispatch on the bytes following a record's size.
    pub(crate) fn is_candidate(data: &[u8]) -> bool {
        bytes::read_array::<4>(data, 4) == Some(EVT_END_OF_FILE_SIGNATURE1)
    }
}
