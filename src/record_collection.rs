use crate::evt_record::EventRecord;

use std::ops::Index;
use std::slice;

/// An ordered, owned sequence of decoded records, in the order the scan produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordCollection {
    records: Vec<EventRecord>,
}

impl RecordCollection {
    pub fn new() -> Self {
        RecordCollection::default()
    }

    pub(crate) fn push(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EventRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, EventRecord> {
        self.records.iter()
    }

    /// Whether a record with the given number was collected.
    pub fn contains_record_number(&self, record_number: u32) -> bool {
        self.records.iter().any(|r| r.record_number == record_number)
    }
}

impl Index<usize> for RecordCollection {
    type Output = EventRecord;

    fn index(&self, index: usize) -> &EventRecord {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a EventRecord;
    type IntoIter = slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for RecordCollection {
    type Item = EventRecord;
    type IntoIter = std::vec::IntoIter<EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
