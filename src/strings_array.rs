use crate::codepage::AsciiCodepage;
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::{bytes, decode_utf16le_z, utf8_size_z, utf16_size_z, utf16le_units_z};

use log::trace;
use std::ops::Range;

/// The packed string table of an event record: consecutive NUL-terminated UTF-16LE strings.
///
/// The table owns a single buffer; individual strings are ranges into it and are only
/// transcoded when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringsArray {
    data: Vec<u8>,
    entries: Vec<Range<usize>>,
}

impl StringsArray {
    pub fn from_bytes(data: &[u8]) -> DeserializationResult<StringsArray> {
        if data.len() < 2 || data.len() % 2 != 0 {
            return Err(DeserializationError::OutOfBounds {
                what: "strings array",
                offset: 0,
                size: data.len() as u64,
                limit: data.len() as u64,
            });
        }

        let number_of_strings = data.chunks_exact(2).filter(|unit| *unit == [0, 0]).count();

        let mut entries = Vec::with_capacity(number_of_strings);
        let mut start = 0;
        for (i, unit) in data.chunks_exact(2).enumerate() {
            if unit == [0, 0] {
                let end = i * 2 + 2;
                entries.push(start..end);
                start = end;
            }
        }

        if start < data.len() {
            trace!(
                "strings array has {} trailing unterminated bytes",
                data.len() - start
            );
        }

        let mut owned = bytes::try_alloc(data.len(), "strings array")?;
        owned.copy_from_slice(data);

        Ok(StringsArray {
            data: owned,
            entries,
        })
    }

    pub fn number_of_strings(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The raw UTF-16LE bytes of the string at `index`, including its terminator.
    pub fn string_bytes(&self, index: usize) -> Option<&[u8]> {
        self.entries
            .get(index)
            .and_then(|range| self.data.get(range.clone()))
    }

    fn entry(&self, index: usize) -> DeserializationResult<&[u8]> {
        self.string_bytes(index)
            .ok_or_else(|| DeserializationError::OutOfBounds {
                what: "strings array index",
                offset: index as u64,
                size: 1,
                limit: self.entries.len() as u64,
            })
    }

    /// Size of the UTF-8 representation of the string at `index`, including a NUL byte.
    pub fn utf8_string_size(&self, index: usize) -> DeserializationResult<usize> {
        utf8_size_z(self.entry(index)?, "strings array string")
    }

    pub fn utf8_string(&self, index: usize) -> DeserializationResult<String> {
        decode_utf16le_z(self.entry(index)?, "strings array string")
    }

    /// Size of the UTF-16 representation of the string at `index` in code units,
    /// including the terminator.
    pub fn utf16_string_size(&self, index: usize) -> DeserializationResult<usize> {
        Ok(utf16_size_z(self.entry(index)?))
    }

    /// The UTF-16 code units of the string at `index`, without the terminator.
    pub fn utf16_string(&self, index: usize) -> DeserializationResult<Vec<u16>> {
        Ok(utf16le_units_z(self.entry(index)?))
    }

    pub fn narrow_string(
        &self,
        index: usize,
        codepage: AsciiCodepage,
    ) -> DeserializationResult<Vec<u8>> {
        codepage.encode(&self.utf8_string(index)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = DeserializationResult<String>> + '_ {
        (0..self.entries.len()).map(move |i| self.utf8_string(i))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
