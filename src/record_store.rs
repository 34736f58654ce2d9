use crate::end_of_file_record::{EVT_END_OF_FILE_RECORD_SIZE, EndOfFileRecord};
use crate::err::{DeserializationError, DeserializationResult, EvtError, EvtResult};
use crate::evt_file_header::{EVT_FILE_HEADER_SIZE, EVT_SIGNATURE, EvtFileHeader};
use crate::evt_parser::AbortHandle;
use crate::evt_record::EventRecord;
use crate::record_collection::RecordCollection;
use crate::utils::{bytes, hexdump};

use log::Level::Trace;
use log::{debug, log_enabled, trace, warn};
use memchr::memmem;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

/// Recovery reads the ring in blocks of this many bytes.
pub const RECOVERY_BLOCK_SIZE: usize = 65536;

/// Smallest declared size that still holds a size field and a signature.
const MIN_DECLARED_SIZE: u32 = 8;

/// Any seekable byte source a log can be read from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScanState {
    HeaderValidated,
    Scanning,
    /// The primary scan reached the end of file record.
    Complete,
    Cancelled,
    Recovering,
    RecoveryComplete,
    Closed,
}

/// How a scan pass ended.
#[derive(Debug)]
pub enum ScanOutcome {
    Complete,
    /// The abort handle was signalled. Records decoded before that are kept.
    Cancelled,
    /// The scan stopped at `offset` because the bytes there could not be decoded.
    Corrupted {
        offset: u64,
        error: DeserializationError,
    },
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanOutcome::Complete)
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, ScanOutcome::Corrupted { .. })
    }
}

enum ScannedRecord {
    Event(EventRecord),
    EndOfFile(EndOfFileRecord),
}

/// Owns the byte source and walks the circular record region.
pub(crate) struct RecordStore {
    source: Box<dyn ReadSeek>,
    length: u64,
    header: EvtFileHeader,
    abort: AbortHandle,
    state: ScanState,
    end_of_file_record: Option<(u64, EndOfFileRecord)>,
}

impl RecordStore {
    /// Reads and validates the file header. A failure here is fatal to opening the file.
    pub(crate) fn open(mut source: Box<dyn ReadSeek>, abort: AbortHandle) -> EvtResult<Self> {
        let length = source.seek(SeekFrom::End(0))?;
        debug!("Opened byte source of {} bytes", length);

        let mut header_bytes = [0_u8; EVT_FILE_HEADER_SIZE];
        read_exact_at(&mut source, length, 0, &mut header_bytes, "file header")
            .map_err(|source| EvtError::FailedToReadFileHeader { source })?;

        let header = EvtFileHeader::from_bytes(&header_bytes)
            .map_err(|source| EvtError::FailedToReadFileHeader { source })?;

        debug!("EVT Header: {:#?}", header);

        Ok(RecordStore {
            source,
            length,
            header,
            abort,
            state: ScanState::HeaderValidated,
            end_of_file_record: None,
        })
    }

    pub(crate) fn header(&self) -> &EvtFileHeader {
        &self.header
    }

    pub(crate) fn state(&self) -> ScanState {
        self.state
    }

    pub(crate) fn length(&self) -> u64 {
        self.length
    }

    pub(crate) fn end_of_file_record(&self) -> Option<&EndOfFileRecord> {
        self.end_of_file_record.as_ref().map(|(_, record)| record)
    }

    fn ring_start(&self) -> u64 {
        EVT_FILE_HEADER_SIZE as u64
    }

    fn ring_end(&self) -> u64 {
        self.length
    }

    fn ring_size(&self) -> u64 {
        self.ring_end().saturating_sub(self.ring_start())
    }

    fn in_ring(&self, offset: u64) -> bool {
        offset >= self.ring_start() && offset < self.ring_end()
    }

    /// Reads `size` bytes of the ring starting at `offset`, continuing right after the file
    /// header when the read runs past the end of the file.
    fn read_ring(&mut self, offset: u64, size: usize) -> DeserializationResult<Vec<u8>> {
        if !self.in_ring(offset) || size as u64 > self.ring_size() {
            return Err(DeserializationError::OutOfBounds {
                what: "record ring",
                offset,
                size: size as u64,
                limit: self.ring_end(),
            });
        }

        let mut buf = bytes::try_alloc(size, "record")?;
        let contiguous = (self.ring_end() - offset).min(size as u64) as usize;

        read_exact_at(
            &mut self.source,
            self.length,
            offset,
            &mut buf[..contiguous],
            "record",
        )?;

        if contiguous < size {
            debug!(
                "Record at offset {} wraps around, reading remaining {} bytes at {}",
                offset,
                size - contiguous,
                self.ring_start()
            );
            let ring_start = self.ring_start();
            read_exact_at(
                &mut self.source,
                self.length,
                ring_start,
                &mut buf[contiguous..],
                "wrapped record",
            )?;
        }

        Ok(buf)
    }

    fn read_record_at(&mut self, offset: u64) -> DeserializationResult<ScannedRecord> {
        let size_bytes = self.read_ring(offset, 4)?;
        let size = bytes::read_u32_le_r(&size_bytes, 0, "record size")?;

        if size < MIN_DECLARED_SIZE || u64::from(size) > self.ring_size() {
            return Err(DeserializationError::OutOfBounds {
                what: "record size",
                offset,
                size: u64::from(size),
                limit: self.ring_size(),
            });
        }

        let data = self.read_ring(offset, size as usize)?;

        let result = if EndOfFileRecord::is_candidate(&data) {
            EndOfFileRecord::from_bytes(&data).map(ScannedRecord::EndOfFile)
        } else {
            EventRecord::from_bytes(&data).map(|mut record| {
                record.offset = offset;
                ScannedRecord::Event(record)
            })
        };

        if result.is_err() && log_enabled!(Trace) {
            trace!("Rejected bytes at offset {}:\n{}", offset, hexdump(&data, offset));
        }

        result
    }

    fn next_offset(&self, offset: u64, size: u32) -> u64 {
        let next = offset + u64::from(size);
        if next >= self.ring_end() {
            self.ring_start() + (next - self.ring_end())
        } else {
            next
        }
    }

    /// Walks the ring from `first_record_offset` until the end of file record, appending every
    /// event record to `records`.
    pub(crate) fn scan(&mut self, records: &mut RecordCollection) -> ScanOutcome {
        self.state = ScanState::Scanning;
        self.end_of_file_record = None;

        let first = u64::from(self.header.first_record_offset);
        let end_of_file = u64::from(self.header.end_of_file_record_offset);

        if !self.in_ring(first) || !self.in_ring(end_of_file) {
            warn!(
                "Header offsets (first record: {}, end of file record: {}) are outside the record region [{}, {})",
                first,
                end_of_file,
                self.ring_start(),
                self.ring_end()
            );
            self.state = ScanState::Complete;
            return ScanOutcome::Corrupted {
                offset: first,
                error: DeserializationError::OutOfBounds {
                    what: "first_record_offset",
                    offset: first,
                    size: 0,
                    limit: self.ring_end(),
                },
            };
        }

        let mut offset = first;
        let mut consumed = 0_u64;

        loop {
            if self.abort.is_signalled() {
                debug!("Scan aborted at offset {}", offset);
                self.state = ScanState::Cancelled;
                return ScanOutcome::Cancelled;
            }

            match self.read_record_at(offset) {
                Ok(ScannedRecord::Event(record)) => {
                    if consumed + u64::from(record.size) > self.ring_size() {
                        warn!(
                            "Read the whole record region without finding the end of file record"
                        );
                        self.state = ScanState::Complete;
                        return ScanOutcome::Corrupted {
                            offset,
                            error: DeserializationError::OutOfBounds {
                                what: "record ring",
                                offset,
                                size: consumed + u64::from(record.size),
                                limit: self.ring_size(),
                            },
                        };
                    }

                    trace!(
                        "Record {} at offset {} ({} bytes)",
                        record.record_number, offset, record.size
                    );
                    consumed += u64::from(record.size);
                    offset = self.next_offset(offset, record.size);
                    records.push(record);
                }
                Ok(ScannedRecord::EndOfFile(end_of_file_record)) => {
                    debug!(
                        "Found end of file record at offset {} after {} records",
                        offset,
                        records.len()
                    );
                    if offset != end_of_file {
                        debug!(
                            "End of file record is at {}, header says {}",
                            offset, end_of_file
                        );
                    }
                    self.end_of_file_record = Some((offset, end_of_file_record));
                    self.state = ScanState::Complete;
                    return ScanOutcome::Complete;
                }
                Err(error) => {
                    warn!(
                        "Failed to read record at offset {}, stopping scan: {}",
                        offset, error
                    );
                    self.state = ScanState::Complete;
                    return ScanOutcome::Corrupted { offset, error };
                }
            }
        }
    }

    /// Ranges already accounted for by the header, the primary records and the end of file
    /// record, sorted by start.
    fn occupied_ranges(&self, primary: &RecordCollection) -> Vec<Range<u64>> {
        let mut occupied = vec![0..self.ring_start()];

        for record in primary {
            occupied.extend(record.file_ranges(self.ring_start(), self.ring_end()));
        }

        if let Some((offset, _)) = self.end_of_file_record {
            let end = offset + EVT_END_OF_FILE_RECORD_SIZE as u64;
            if end <= self.ring_end() {
                occupied.push(offset..end);
            } else {
                occupied.push(offset..self.ring_end());
                occupied.push(self.ring_start()..self.ring_start() + (end - self.ring_end()));
            }
        }

        occupied.sort_by_key(|r| r.start);
        occupied
    }

    /// Searches the whole record region for the record signature and decodes every candidate
    /// that does not overlap a primary record. Accepted records go to `recovered`.
    pub(crate) fn recover(
        &mut self,
        primary: &RecordCollection,
        recovered: &mut RecordCollection,
    ) -> ScanOutcome {
        self.state = ScanState::Recovering;

        let occupied = self.occupied_ranges(primary);
        let finder = memmem::Finder::new(&EVT_SIGNATURE);

        let mut block_start = self.ring_start();
        // Candidates must start at or after the end of the last accepted record.
        let mut resume_at = self.ring_start();

        while block_start < self.ring_end() {
            if self.abort.is_signalled() {
                debug!("Recovery aborted at offset {}", block_start);
                self.state = ScanState::Cancelled;
                return ScanOutcome::Cancelled;
            }

            // Overlap by the signature length minus one, so that a signature crossing the
            // block boundary is found in this block.
            let block_end =
                (block_start + RECOVERY_BLOCK_SIZE as u64 + 3).min(self.ring_end());
            let block_len = (block_end - block_start) as usize;

            let mut block = match bytes::try_alloc(block_len, "recovery block") {
                Ok(block) => block,
                Err(error) => {
                    self.state = ScanState::RecoveryComplete;
                    return ScanOutcome::Corrupted {
                        offset: block_start,
                        error,
                    };
                }
            };
            if let Err(error) = read_exact_at(
                &mut self.source,
                self.length,
                block_start,
                &mut block,
                "recovery block",
            ) {
                self.state = ScanState::RecoveryComplete;
                return ScanOutcome::Corrupted {
                    offset: block_start,
                    error,
                };
            }

            let candidates: Vec<u64> = finder
                .find_iter(&block)
                .map(|pos| block_start + pos as u64)
                .filter(|&signature| signature >= self.ring_start() + 4)
                .map(|signature| signature - 4)
                .collect();

            for offset in candidates {
                if self.abort.is_signalled() {
                    debug!("Recovery aborted at candidate offset {}", offset);
                    self.state = ScanState::Cancelled;
                    return ScanOutcome::Cancelled;
                }

                if offset < resume_at {
                    continue;
                }

                if overlaps(&occupied, &(offset..offset + MIN_DECLARED_SIZE as u64)) {
                    trace!("Skipping candidate at {}, it is part of a primary record", offset);
                    continue;
                }

                let record = match self.read_record_at(offset) {
                    Ok(ScannedRecord::Event(record)) => record,
                    Ok(ScannedRecord::EndOfFile(_)) => continue,
                    Err(error) => {
                        trace!("Rejected candidate at offset {}: {}", offset, error);
                        continue;
                    }
                };

                let ranges = record.file_ranges(self.ring_start(), self.ring_end());
                if ranges.iter().any(|range| overlaps(&occupied, range)) {
                    trace!(
                        "Rejected candidate at offset {}, it overlaps a primary record",
                        offset
                    );
                    continue;
                }

                debug!(
                    "Recovered record {} at offset {} ({} bytes)",
                    record.record_number, offset, record.size
                );
                resume_at = offset + u64::from(record.size);
                recovered.push(record);
            }

            block_start += RECOVERY_BLOCK_SIZE as u64;
        }

        debug!("Recovery finished with {} records", recovered.len());
        self.state = ScanState::RecoveryComplete;
        ScanOutcome::Complete
    }

    pub(crate) fn close(&mut self) {
        self.state = ScanState::Closed;
        self.end_of_file_record = None;
    }
}

fn overlaps(occupied: &[Range<u64>], range: &Range<u64>) -> bool {
    // `occupied` is sorted by start; only ranges starting before `range.end` can overlap.
    let candidates = occupied.partition_point(|r| r.start < range.end);
    occupied[..candidates]
        .iter()
        .any(|r| r.end > range.start)
}

fn read_exact_at(
    source: &mut Box<dyn ReadSeek>,
    length: u64,
    offset: u64,
    buf: &mut [u8],
    what: &'static str,
) -> DeserializationResult<()> {
    let end = offset.saturating_add(buf.len() as u64);
    if end > length {
        return Err(DeserializationError::Truncated {
            what,
            offset,
            need: buf.len(),
            have: length.saturating_sub(offset) as usize,
        });
    }

    source.seek(SeekFrom::Start(offset))?;
    source.read_exact(buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_lookup() {
        let occupied = vec![0..48, 48..192, 400..440];

        assert!(overlaps(&occupied, &(100..108)));
        assert!(overlaps(&occupied, &(190..300)));
        assert!(!overlaps(&occupied, &(192..400)));
        assert!(overlaps(&occupied, &(399..401)));
        assert!(!overlaps(&occupied, &(440..500)));
    }
}
