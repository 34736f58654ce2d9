use crate::codepage::AsciiCodepage;
use crate::err::{DeserializationError, DeserializationResult, SerializationResult};
use crate::evt_file_header::EVT_SIGNATURE;
use crate::evt_parser::ParserSettings;
use crate::json_output;
use crate::ntsid::Sid;
use crate::strings_array::StringsArray;
use crate::utils::{
    ByteCursor, bytes, decode_utf16le_z, timestamp_from_posix_seconds, utf8_size_z, utf16_size_z,
    utf16le_units_z,
};
use crate::xml_output::XmlOutput;

use bitflags::bitflags;
use jiff::Timestamp;
use log::trace;
use std::fmt;
use std::ops::Range;

/// Size of the fixed part of an event record, up to and including `data_offset`.
pub const EVT_EVENT_RECORD_FIXED_SIZE: usize = 56;
/// Smallest possible event record: the fixed part plus the trailing copy of the size.
pub const EVT_EVENT_RECORD_MIN_SIZE: usize = EVT_EVENT_RECORD_FIXED_SIZE + 4;

bitflags! {
    /// `EVENTLOG_*_TYPE` values. An empty set is a success event.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct EventType: u16 {
        const ERROR = 0x0001;
        const WARNING = 0x0002;
        const INFORMATION = 0x0004;
        const AUDIT_SUCCESS = 0x0008;
        const AUDIT_FAILURE = 0x0010;
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Success");
        }

        let mut first = true;
        for (flag, name) in [
            (EventType::ERROR, "Error"),
            (EventType::WARNING, "Warning"),
            (EventType::INFORMATION, "Information"),
            (EventType::AUDIT_SUCCESS, "Audit Success"),
            (EventType::AUDIT_FAILURE, "Audit Failure"),
        ] {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }

        let unknown = self.bits() & !EventType::all().bits();
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "0x{:04x}", unknown)?;
        }

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Informational,
    Warning,
    Error,
}

/// The 32-bit event identifier, laid out like an `NTSTATUS` value.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EventIdentifier(pub u32);

impl EventIdentifier {
    pub fn code(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    pub fn facility(self) -> u16 {
        ((self.0 >> 16) & 0x0fff) as u16
    }

    /// The upper 16 bits, shown as `Qualifiers` by the Windows event viewer.
    pub fn qualifiers(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn is_reserved_set(self) -> bool {
        self.0 & 0x1000_0000 != 0
    }

    pub fn is_customer_defined(self) -> bool {
        self.0 & 0x2000_0000 != 0
    }

    pub fn severity(self) -> Severity {
        match self.0 >> 30 {
            0 => Severity::Success,
            1 => Severity::Informational,
            2 => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Debug for EventIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventIdentifier")
            .field("value", &format_args!("0x{:08x}", self.0))
            .field("code", &self.code())
            .field("facility", &self.facility())
            .field("customer", &self.is_customer_defined())
            .field("severity", &self.severity())
            .finish()
    }
}

/// A decoded event record.
///
/// The raw layout fields (`strings_offset`, `user_sid_size`, ...) are kept as they were read;
/// the variable-length members they describe are owned by the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Absolute file offset of the record's first byte.
    pub offset: u64,
    pub size: u32,
    pub record_number: u32,
    /// POSIX seconds.
    pub creation_time: u32,
    /// POSIX seconds.
    pub written_time: u32,
    pub event_identifier: EventIdentifier,
    pub event_type: EventType,
    /// Number of strings as declared by the record header.
    pub number_of_strings: u16,
    pub event_category: u16,
    pub event_flags: u16,
    pub closing_record_number: u32,
    pub strings_offset: u32,
    pub user_sid_size: u32,
    pub user_sid_offset: u32,
    pub data_size: u32,
    pub data_offset: u32,
    pub copy_of_size: u32,
    source_name: Vec<u8>,
    computer_name: Vec<u8>,
    user_security_identifier: Option<Vec<u8>>,
    strings: Option<StringsArray>,
    data: Vec<u8>,
}

/// Validated byte ranges of the variable-length regions, relative to the record start.
#[derive(Debug, PartialEq, Eq)]
struct RecordLayout {
    members: Range<usize>,
    user_sid: Option<Range<usize>>,
    strings: Option<Range<usize>>,
    data: Option<Range<usize>>,
}

impl RecordLayout {
    /// Regions must appear in order (members, SID, strings, data), each starting at or after
    /// the end of the previous one, and all of them before the trailing size copy.
    fn validate(
        size: u32,
        user_sid_size: u32,
        user_sid_offset: u32,
        number_of_strings: u16,
        strings_offset: u32,
        data_size: u32,
        data_offset: u32,
    ) -> DeserializationResult<RecordLayout> {
        let limit = size as usize - 4;

        let members_end = if user_sid_size != 0 {
            user_sid_offset
        } else {
            strings_offset
        };
        if (members_end as usize) < EVT_EVENT_RECORD_FIXED_SIZE {
            return Err(DeserializationError::OutOfBounds {
                what: "members",
                offset: u64::from(members_end),
                size: 0,
                limit: limit as u64,
            });
        }
        let members = region(
            "members",
            EVT_EVENT_RECORD_FIXED_SIZE as u64,
            u64::from(members_end) - EVT_EVENT_RECORD_FIXED_SIZE as u64,
            EVT_EVENT_RECORD_FIXED_SIZE,
            limit,
        )?;
        let mut lower = members.end;

        let user_sid = if user_sid_size != 0 {
            let r = region(
                "user security identifier",
                u64::from(user_sid_offset),
                u64::from(user_sid_size),
                lower,
                limit,
            )?;
            lower = r.end;
            Some(r)
        } else {
            None
        };

        let strings = if number_of_strings != 0 {
            if data_offset < strings_offset {
                return Err(DeserializationError::OutOfBounds {
                    what: "strings",
                    offset: u64::from(strings_offset),
                    size: 0,
                    limit: u64::from(data_offset),
                });
            }
            let r = region(
                "strings",
                u64::from(strings_offset),
                u64::from(data_offset - strings_offset),
                lower,
                limit,
            )?;
            lower = r.end;
            Some(r)
        } else {
            None
        };

        let data = if data_size != 0 {
            Some(region(
                "data",
                u64::from(data_offset),
                u64::from(data_size),
                lower,
                limit,
            )?)
        } else {
            None
        };

        Ok(RecordLayout {
            members,
            user_sid,
            strings,
            data,
        })
    }
}

fn region(
    what: &'static str,
    offset: u64,
    size: u64,
    lower: usize,
    limit: usize,
) -> DeserializationResult<Range<usize>> {
    let end = offset + size;
    if offset < lower as u64 || end > limit as u64 {
        return Err(DeserializationError::OutOfBounds {
            what,
            offset,
            size,
            limit: limit as u64,
        });
    }
    Ok(offset as usize..end as usize)
}

impl EventRecord {
    /// Decodes a complete event record. `data` must hold exactly `record_size` bytes.
    pub fn from_bytes(data: &[u8]) -> DeserializationResult<EventRecord> {
        let _ = bytes::slice_r(data, 0, EVT_EVENT_RECORD_MIN_SIZE, "event record")?;
        let mut cursor = ByteCursor::new(data);

        let size = cursor.u32_named("event record size")?;
        bytes::ensure_size(u64::from(size), data.len() as u64, "event record size")?;

        let signature = cursor.array::<4>("event record signature")?;
        bytes::ensure_sig(signature, EVT_SIGNATURE, "event record signature")?;

        let record_number = cursor.u32_named("record_number")?;
        let creation_time = cursor.u32_named("creation_time")?;
        let written_time = cursor.u32_named("written_time")?;
        let event_identifier = EventIdentifier(cursor.u32_named("event_identifier")?);
        let event_type = EventType::from_bits_retain(cursor.u16_named("event_type")?);
        let number_of_strings = cursor.u16_named("number_of_strings")?;
        let event_category = cursor.u16_named("event_category")?;
        let event_flags = cursor.u16_named("event_flags")?;
        let closing_record_number = cursor.u32_named("closing_record_number")?;
        let strings_offset = cursor.u32_named("strings_offset")?;
        let user_sid_size = cursor.u32_named("user_sid_size")?;
        let user_sid_offset = cursor.u32_named("user_sid_offset")?;
        let data_size = cursor.u32_named("data_size")?;
        let data_offset = cursor.u32_named("data_offset")?;

        trace!(
            "Record {} - strings at {} (x{}), sid at {} ({} bytes), data at {} ({} bytes)",
            record_number,
            strings_offset,
            number_of_strings,
            user_sid_offset,
            user_sid_size,
            data_offset,
            data_size
        );

        let layout = RecordLayout::validate(
            size,
            user_sid_size,
            user_sid_offset,
            number_of_strings,
            strings_offset,
            data_size,
            data_offset,
        )?;

        let source_name = cursor.utf16_z(layout.members.end, "source_name")?.to_vec();
        let computer_name = cursor.utf16_z(layout.members.end, "computer_name")?.to_vec();

        let user_security_identifier = layout.user_sid.map(|r| data[r].to_vec());

        let strings = match layout.strings {
            Some(r) => Some(StringsArray::from_bytes(&data[r])?),
            None => None,
        };

        let data_blob = match layout.data {
            Some(r) => {
                let mut blob = bytes::try_alloc(r.len(), "event record data")?;
                blob.copy_from_slice(&data[r]);
                blob
            }
            None => Vec::new(),
        };

        let copy_of_size = bytes::read_u32_le_r(data, data.len() - 4, "event record copy_of_size")?;
        bytes::ensure_size(
            u64::from(copy_of_size),
            u64::from(size),
            "event record copy_of_size",
        )?;

        Ok(EventRecord {
            offset: 0,
            size,
            record_number,
            creation_time,
            written_time,
            event_identifier,
            event_type,
            number_of_strings,
            event_category,
            event_flags,
            closing_record_number,
            strings_offset,
            user_sid_size,
            user_sid_offset,
            data_size,
            data_offset,
            copy_of_size,
            source_name,
            computer_name,
            user_security_identifier,
            strings,
            data: data_blob,
        })
    }

    pub fn creation_timestamp(&self) -> DeserializationResult<Timestamp> {
        timestamp_from_posix_seconds(self.creation_time)
    }

    pub fn written_timestamp(&self) -> DeserializationResult<Timestamp> {
        timestamp_from_posix_seconds(self.written_time)
    }

    pub fn source_name(&self) -> DeserializationResult<String> {
        decode_utf16le_z(&self.source_name, "source_name")
    }

    /// Size of the UTF-8 source name, including the terminating NUL byte.
    pub fn utf8_source_name_size(&self) -> DeserializationResult<usize> {
        utf8_size_z(&self.source_name, "source_name")
    }

    pub fn utf16_source_name_size(&self) -> usize {
        utf16_size_z(&self.source_name)
    }

    pub fn utf16_source_name(&self) -> Vec<u16> {
        utf16le_units_z(&self.source_name)
    }

    pub fn narrow_source_name(&self, codepage: AsciiCodepage) -> DeserializationResult<Vec<u8>> {
        codepage.encode(&self.source_name()?)
    }

    pub fn computer_name(&self) -> DeserializationResult<String> {
        decode_utf16le_z(&self.computer_name, "computer_name")
    }

    /// Size of the UTF-8 computer name, including the terminating NUL byte.
    pub fn utf8_computer_name_size(&self) -> DeserializationResult<usize> {
        utf8_size_z(&self.computer_name, "computer_name")
    }

    pub fn utf16_computer_name_size(&self) -> usize {
        utf16_size_z(&self.computer_name)
    }

    pub fn utf16_computer_name(&self) -> Vec<u16> {
        utf16le_units_z(&self.computer_name)
    }

    pub fn narrow_computer_name(&self, codepage: AsciiCodepage) -> DeserializationResult<Vec<u8>> {
        codepage.encode(&self.computer_name()?)
    }

    /// The raw user security identifier, if the record has one.
    pub fn user_sid_bytes(&self) -> Option<&[u8]> {
        self.user_security_identifier.as_deref()
    }

    pub fn user_sid(&self) -> DeserializationResult<Option<Sid>> {
        self.user_security_identifier
            .as_deref()
            .map(Sid::from_bytes)
            .transpose()
    }

    pub fn strings(&self) -> Option<&StringsArray> {
        self.strings.as_ref()
    }

    fn strings_or_err(&self, index: usize) -> DeserializationResult<&StringsArray> {
        self.strings
            .as_ref()
            .ok_or(DeserializationError::OutOfBounds {
                what: "strings array index",
                offset: index as u64,
                size: 1,
                limit: 0,
            })
    }

    pub fn string(&self, index: usize) -> DeserializationResult<String> {
        self.strings_or_err(index)?.utf8_string(index)
    }

    pub fn utf8_string_size(&self, index: usize) -> DeserializationResult<usize> {
        self.strings_or_err(index)?.utf8_string_size(index)
    }

    pub fn narrow_string(
        &self,
        index: usize,
        codepage: AsciiCodepage,
    ) -> DeserializationResult<Vec<u8>> {
        self.strings_or_err(index)?.narrow_string(index, codepage)
    }

    /// The opaque event data. Empty when the record carries none.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_json_value(&self) -> SerializationResult<serde_json::Value> {
        json_output::record_to_json_value(self)
    }

    /// Renders the record as JSON, indented according to `settings`.
    pub fn to_json(&self, settings: &ParserSettings) -> SerializationResult<String> {
        let value = self.to_json_value()?;

        let data = if settings.should_indent() {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };

        Ok(data)
    }

    pub fn to_xml(&self, settings: &ParserSettings) -> SerializationResult<String> {
        let mut output = XmlOutput::with_writer(Vec::new(), settings);
        output.write_record(self)?;

        Ok(String::from_utf8(output.into_writer())?)
    }

    /// Byte ranges (absolute file offsets) occupied by this record. A record that wrapped
    /// around the end of the file occupies two ranges.
    pub(crate) fn file_ranges(&self, ring_start: u64, ring_end: u64) -> Vec<Range<u64>> {
        let end = self.offset + u64::from(self.size);
        if end <= ring_end {
            vec![self.offset..end]
        } else {
            vec![self.offset..ring_end, ring_start..ring_start + (end - ring_end)]
        }
    }
}
