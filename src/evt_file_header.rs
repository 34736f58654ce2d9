use crate::err::DeserializationResult;
use crate::utils::{ByteCursor, bytes};

use bitflags::bitflags;

pub const EVT_FILE_HEADER_SIZE: usize = 48;
pub const EVT_SIGNATURE: [u8; 4] = *b"LfLe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvtFileHeader {
    pub size: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub first_record_offset: u32,
    pub end_of_file_record_offset: u32,
    /// Number that will be assigned to the next record written.
    pub last_record_number: u32,
    /// Number of the oldest record still in the file.
    pub first_record_number: u32,
    pub maximum_file_size: u32,
    pub flags: FileFlags,
    /// Retention period, in seconds.
    pub retention: u32,
    pub copy_of_size: u32,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct FileFlags: u32 {
        /// The log was not closed properly, header offsets may be stale.
        const DIRTY = 0x0000_0001;
        /// The record region has wrapped around.
        const WRAPPED = 0x0000_0002;
        /// A record could not be written because the log was full.
        const FULL = 0x0000_0004;
        /// The log was archived since it was last cleared.
        const ARCHIVE = 0x0000_0008;
    }
}

impl EvtFileHeader {
    pub fn from_bytes(data: &[u8]) -> DeserializationResult<EvtFileHeader> {
        let data = bytes::slice_r(data, 0, EVT_FILE_HEADER_SIZE, "file header")?;
        let mut cursor = ByteCursor::new(data);

        let size = cursor.u32_named("file header size")?;
        let signature = cursor.array::<4>("file header signature")?;
        bytes::ensure_sig(signature, EVT_SIGNATURE, "file header signature")?;

        let major_version = cursor.u32_named("major_version")?;
        let minor_version = cursor.u32_named("minor_version")?;
        let first_record_offset = cursor.u32_named("first_record_offset")?;
        let end_of_file_record_offset = cursor.u32_named("end_of_file_record_offset")?;
        let last_record_number = cursor.u32_named("last_record_number")?;
        let first_record_number = cursor.u32_named("first_record_number")?;
        let maximum_file_size = cursor.u32_named("maximum_file_size")?;
        let flags = FileFlags::from_bits_retain(cursor.u32_named("file_flags")?);
        let retention = cursor.u32_named("retention")?;
        let copy_of_size = cursor.u32_named("file header copy_of_size")?;

        bytes::ensure_size(
            u64::from(size),
            EVT_FILE_HEADER_SIZE as u64,
            "file header size",
        )?;
        bytes::ensure_size(
            u64::from(copy_of_size),
            u64::from(size),
            "file header copy_of_size",
        )?;

        Ok(EvtFileHeader {
            size,
            major_version,
            minor_version,
            first_record_offset,
            end_of_file_record_offset,
            last_record_number,
            first_record_number,
            maximum_file_size,
            flags,
            retention,
            copy_of_size,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(FileFlags::DIRTY)
    }

    pub fn is_wrapped(&self) -> bool {
        self.flags.contains(FileFlags::WRAPPED)
    }
}
