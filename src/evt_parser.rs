use crate::codepage::AsciiCodepage;
use crate::end_of_file_record::EndOfFileRecord;
use crate::err::{EvtError, EvtResult};
use crate::evt_file_header::{EvtFileHeader, FileFlags};
use crate::evt_record::EventRecord;
use crate::record_collection::RecordCollection;
use crate::record_store::{ReadSeek, RecordStore, ScanOutcome, ScanState};

use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// When to run the signature-guided recovery pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RecoveryMode {
    Disabled,
    /// Only when the primary scan could not reach the end of file record.
    #[default]
    OnCorruption,
    /// After every primary scan, also carving records from free ring space.
    Always,
}

/// A cooperative cancellation flag, polled once per record while scanning.
///
/// Clones share the same flag, so a handle can be given to another thread before opening a
/// file and signalled while `open` is still scanning.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        AbortHandle::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct ParserSettings {
    /// Codepage used by the narrow-string accessors.
    ascii_codepage: AsciiCodepage,
    recovery: RecoveryMode,
    abort_handle: AbortHandle,
    /// Controls indentation of JSON and XML output.
    indent: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            ascii_codepage: AsciiCodepage::default(),
            recovery: RecoveryMode::default(),
            abort_handle: AbortHandle::default(),
            indent: true,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn ascii_codepage(mut self, codepage: AsciiCodepage) -> Self {
        self.ascii_codepage = codepage;

        self
    }

    pub fn recovery(mut self, recovery: RecoveryMode) -> Self {
        self.recovery = recovery;

        self
    }

    pub fn abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort_handle = handle;

        self
    }

    pub fn indent(mut self, pretty: bool) -> Self {
        self.indent = pretty;

        self
    }

    pub fn get_ascii_codepage(&self) -> AsciiCodepage {
        self.ascii_codepage
    }

    pub fn get_recovery(&self) -> RecoveryMode {
        self.recovery
    }

    pub fn get_abort_handle(&self) -> &AbortHandle {
        &self.abort_handle
    }

    pub fn should_indent(&self) -> bool {
        self.indent
    }
}

/// An opened EVT file.
///
/// Opening validates the file header and scans the record region; the decoded records are
/// then available by index. Corruption past the header never fails `open`, it only leaves
/// fewer primary records (and possibly some recovered ones).
pub struct EvtParser {
    store: Option<RecordStore>,
    settings: ParserSettings,
    records: RecordCollection,
    recovered: RecordCollection,
    outcome: ScanOutcome,
}

impl EvtParser {
    pub fn from_path(path: impl AsRef<Path>) -> EvtResult<Self> {
        Self::open_path(path, ParserSettings::default())
    }

    pub fn open_path(path: impl AsRef<Path>, settings: ParserSettings) -> EvtResult<Self> {
        let path = path.as_ref();

        let f = File::open(path).map_err(|e| EvtError::FailedToOpenFile {
            source: e,
            path: path.to_path_buf(),
        })?;

        info!("Opened {}", path.display());
        Self::open(Box::new(BufReader::new(f)), settings)
    }

    pub fn from_buffer(buffer: Vec<u8>) -> EvtResult<Self> {
        Self::open(Box::new(Cursor::new(buffer)), ParserSettings::default())
    }

    pub fn from_read_seek<T: ReadSeek + 'static>(read_seek: T) -> EvtResult<Self> {
        Self::open(Box::new(read_seek), ParserSettings::default())
    }

    /// Validates the header and runs the primary scan, followed by recovery as configured.
    pub fn open(source: Box<dyn ReadSeek>, settings: ParserSettings) -> EvtResult<Self> {
        let mut store = RecordStore::open(source, settings.abort_handle.clone())?;

        let mut records = RecordCollection::new();
        let mut recovered = RecordCollection::new();

        let mut outcome = store.scan(&mut records);
        debug!(
            "Primary scan finished with {:?} and {} records",
            outcome,
            records.len()
        );

        let should_recover = match settings.recovery {
            RecoveryMode::Disabled => false,
            RecoveryMode::OnCorruption => outcome.is_corrupted(),
            RecoveryMode::Always => !matches!(outcome, ScanOutcome::Cancelled),
        };

        if should_recover {
            if let ScanOutcome::Cancelled = store.recover(&records, &mut recovered) {
                outcome = ScanOutcome::Cancelled;
            }
        }

        Ok(EvtParser {
            store: Some(store),
            settings,
            records,
            recovered,
            outcome,
        })
    }

    fn store(&self) -> EvtResult<&RecordStore> {
        self.store.as_ref().ok_or(EvtError::NotOpen)
    }

    pub fn header(&self) -> EvtResult<&EvtFileHeader> {
        Ok(self.store()?.header())
    }

    /// `(major_version, minor_version)` of the file.
    pub fn format_version(&self) -> EvtResult<(u32, u32)> {
        let header = self.header()?;
        Ok((header.major_version, header.minor_version))
    }

    pub fn flags(&self) -> EvtResult<FileFlags> {
        Ok(self.header()?.flags)
    }

    /// Size of the byte source, which is also where the record region ends.
    pub fn file_size(&self) -> EvtResult<u64> {
        Ok(self.store()?.length())
    }

    /// The end of file record met by the primary scan, if it got that far.
    pub fn end_of_file_record(&self) -> EvtResult<Option<&EndOfFileRecord>> {
        Ok(self.store()?.end_of_file_record())
    }

    pub fn state(&self) -> ScanState {
        self.store
            .as_ref()
            .map_or(ScanState::Closed, RecordStore::state)
    }

    pub fn scan_outcome(&self) -> &ScanOutcome {
        &self.outcome
    }

    /// Whether the primary scan stopped on bytes it could not decode.
    pub fn is_corrupted(&self) -> bool {
        self.outcome.is_corrupted()
    }

    pub fn number_of_records(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, index: usize) -> EvtResult<&EventRecord> {
        self.store()?;
        self.records
            .get(index)
            .ok_or(EvtError::InvalidRecordIndex {
                index,
                count: self.records.len(),
            })
    }

    pub fn records(&self) -> &RecordCollection {
        &self.records
    }

    pub fn number_of_recovered_records(&self) -> usize {
        self.recovered.len()
    }

    pub fn recovered_record(&self, index: usize) -> EvtResult<&EventRecord> {
        self.store()?;
        self.recovered
            .get(index)
            .ok_or(EvtError::InvalidRecordIndex {
                index,
                count: self.recovered.len(),
            })
    }

    pub fn recovered_records(&self) -> &RecordCollection {
        &self.recovered
    }

    /// Runs the recovery pass again, replacing any previously recovered records.
    /// Returns the number of recovered records.
    pub fn recover_records(&mut self) -> EvtResult<usize> {
        let store = self.store.as_mut().ok_or(EvtError::NotOpen)?;

        self.recovered.clear();
        if let ScanOutcome::Cancelled = store.recover(&self.records, &mut self.recovered) {
            self.outcome = ScanOutcome::Cancelled;
        }

        Ok(self.recovered.len())
    }

    pub fn ascii_codepage(&self) -> AsciiCodepage {
        self.settings.ascii_codepage
    }

    /// Selects the codepage used by the narrow-string accessors from now on.
    pub fn set_ascii_codepage(&mut self, codepage: u32) -> EvtResult<()> {
        self.settings.ascii_codepage = AsciiCodepage::new(codepage)?;
        Ok(())
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.settings.abort_handle.clone()
    }

    /// Asks a running scan or recovery pass to stop at the next record.
    pub fn signal_abort(&self) {
        self.settings.abort_handle.signal();
    }

    /// Releases the byte source and drops every decoded record.
    pub fn close(&mut self) -> EvtResult<()> {
        let mut store = self.store.take().ok_or(EvtError::NotOpen)?;
        store.close();

        self.records.clear();
        self.recovered.clear();
        debug!("Closed parser in state {:?}", store.state());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_builder() {
        let handle = AbortHandle::new();
        let settings = ParserSettings::new()
            .ascii_codepage(AsciiCodepage::WINDOWS_1251)
            .recovery(RecoveryMode::Always)
            .abort_handle(handle.clone())
            .indent(false);

        assert_eq!(settings.get_ascii_codepage().id(), 1251);
        assert_eq!(settings.get_recovery(), RecoveryMode::Always);
        assert!(!settings.should_indent());

        handle.signal();
        assert!(settings.get_abort_handle().is_signalled());
    }

    #[test]
    fn test_default_settings() {
        let settings = ParserSettings::default();

        assert_eq!(settings.get_ascii_codepage(), AsciiCodepage::WINDOWS_1252);
        assert_eq!(settings.get_recovery(), RecoveryMode::OnCorruption);
        assert!(settings.should_indent());
        assert!(!settings.get_abort_handle().is_signalled());
    }

    #[test]
    fn test_rejects_short_buffers() {
        let err = EvtParser::from_buffer(b"LfLe".to_vec()).err().unwrap();
        assert_eq!(err.kind(), crate::err::ErrorKind::Bounds);
    }
}
