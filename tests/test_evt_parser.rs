
use fixtures::*;

use evt::err::ErrorKind;
use evt::{
    AbortHandle, AsciiCodepage, EventRecord, EvtParser, ParserSettings, RecoveryMode, ScanOutcome,
    ScanState,
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Write};

fn open(data: Vec<u8>, settings: ParserSettings) -> EvtParser {
    EvtParser::open(Box::new(Cursor::new(data)), settings).unwrap()
}

fn record_numbers<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> Vec<u32> {
    records.into_iter().map(|r| r.record_number).collect()
}

#[test]
fn test_parses_plain_log() {
    ensure_env_logger_initialized();
    let image = plain_log(5);

    let parser = EvtParser::from_buffer(image.data.clone()).unwrap();

    assert_eq!(parser.format_version().unwrap(), (1, 1));
    assert!(parser.scan_outcome().is_complete());
    assert!(!parser.is_corrupted());
    assert_eq!(parser.state(), ScanState::Complete);

    assert_eq!(parser.number_of_records(), 5);
    assert_eq!(record_numbers(parser.records()), vec![1, 2, 3, 4, 5]);
    assert_eq!(parser.number_of_recovered_records(), 0);

    for (record, offset) in parser.records().iter().zip(&image.record_offsets) {
        assert_eq!(record.offset, *offset as u64);
    }

    let eof = parser.end_of_file_record().unwrap().unwrap();
    assert_eq!(eof.end_of_file_record_offset as usize, image.end_of_file_record_offset);
    assert_eq!(eof.last_record_number, 6);
    assert_eq!(eof.first_record_number, 1);
}

#[test]
fn test_decodes_record_fields_from_log() {
    ensure_env_logger_initialized();
    let record = event_record(1)
        .source_name("Security")
        .sid(local_system_sid())
        .strings(&["a", "", "Ünïcödé"])
        .data(&[0xde, 0xad, 0xbe, 0xef, 0x01]);
    let image = LogBuilder::new(0x800).record(record.build()).build();

    let parser = EvtParser::from_buffer(image.data).unwrap();
    let record = parser.record(0).unwrap();

    assert_eq!(record.source_name().unwrap(), "Security");
    assert_eq!(record.computer_name().unwrap(), "WKS-WINXP32BIT");
    assert_eq!(record.user_sid().unwrap().unwrap().to_string(), "S-1-5-18");
    assert_eq!(record.number_of_strings, 3);
    assert_eq!(record.strings().unwrap().number_of_strings(), 3);
    assert_eq!(record.string(1).unwrap(), "");
    assert_eq!(record.string(2).unwrap(), "Ünïcödé");
    assert_eq!(record.data(), &[0xde, 0xad, 0xbe, 0xef, 0x01]);
    assert_eq!(
        record.written_timestamp().unwrap().to_string(),
        "2010-11-11T01:10:18Z"
    );
}

#[test]
fn test_empty_log_has_no_records() {
    let image = LogBuilder::new(0x200).build();

    let parser = EvtParser::from_buffer(image.data).unwrap();

    assert_eq!(parser.number_of_records(), 0);
    assert!(parser.scan_outcome().is_complete());
    assert!(parser.end_of_file_record().unwrap().is_some());
}

#[test]
fn test_wrapped_record_decodes_like_a_flat_one() {
    ensure_env_logger_initialized();
    // The first record starts 112 bytes before the end of the file and continues after the
    // header.
    let image = LogBuilder::new(0x200)
        .first_record_offset(400)
        .records(1, 2)
        .flags(0x2)
        .build();
    assert_eq!(image.record_offsets, vec![400, 80]);

    let parser = EvtParser::from_buffer(image.data.clone()).unwrap();

    assert!(parser.flags().unwrap().contains(evt::FileFlags::WRAPPED));
    assert!(parser.scan_outcome().is_complete());
    assert_eq!(record_numbers(parser.records()), vec![1, 2]);

    let mut flat = EventRecord::from_bytes(&image.records[0]).unwrap();
    flat.offset = 400;
    assert_eq!(parser.record(0).unwrap(), &flat);
    assert_eq!(parser.record(1).unwrap().offset, 80);
}

#[test]
fn test_record_ending_at_the_end_of_the_file() {
    let image = LogBuilder::new(0x200)
        .first_record_offset(0x200 - 144)
        .records(1, 2)
        .build();
    assert_eq!(image.record_offsets, vec![368, 48]);

    let parser = EvtParser::from_buffer(image.data).unwrap();

    assert!(parser.scan_outcome().is_complete());
    assert_eq!(record_numbers(parser.records()), vec![1, 2]);
}

#[test]
fn test_wrapped_end_of_file_record() {
    let image = LogBuilder::new(0x200)
        .first_record_offset(200)
        .records(1, 2)
        .build();
    // 488 + 40 runs 16 bytes past the end of the file.
    assert_eq!(image.end_of_file_record_offset, 488);

    let parser = EvtParser::from_buffer(image.data).unwrap();

    assert!(parser.scan_outcome().is_complete());
    assert_eq!(parser.number_of_records(), 2);
    assert_eq!(
        parser.end_of_file_record().unwrap().unwrap().end_of_file_record_offset,
        488
    );
}

#[test]
fn test_corrupted_record_stops_scan_and_triggers_recovery() {
    ensure_env_logger_initialized();
    let mut image = plain_log(4);
    // Break the trailing size copy of the second record.
    image.corrupt_record(1, 140, 0x94);

    let parser = EvtParser::from_buffer(image.data.clone()).unwrap();

    assert!(parser.is_corrupted());
    match parser.scan_outcome() {
        ScanOutcome::Corrupted { offset, error } => {
            assert_eq!(*offset, image.record_offsets[1] as u64);
            assert_eq!(error.kind(), ErrorKind::SizeMismatch);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(record_numbers(parser.records()), vec![1]);
    assert_eq!(record_numbers(parser.recovered_records()), vec![3, 4]);
    assert_eq!(parser.state(), ScanState::RecoveryComplete);

    for recovered in parser.recovered_records() {
        assert!(!parser.records().contains_record_number(recovered.record_number));
    }
}

#[test]
fn test_recovery_can_be_disabled() {
    let mut image = plain_log(4);
    image.corrupt_record(1, 4, u32::from_le_bytes(*b"LfLf"));

    let parser = open(
        image.data,
        ParserSettings::new().recovery(RecoveryMode::Disabled),
    );

    assert!(parser.is_corrupted());
    assert_eq!(parser.number_of_records(), 1);
    assert_eq!(parser.number_of_recovered_records(), 0);
    assert_eq!(parser.state(), ScanState::Complete);
}

#[test]
fn test_recovers_stale_records_from_free_space() {
    ensure_env_logger_initialized();
    let stale = event_record(99).build();
    let image = LogBuilder::new(0x1000)
        .records(1, 2)
        .stale_record(0x800, stale)
        .build();

    let healthy = EvtParser::from_buffer(image.data.clone()).unwrap();
    assert_eq!(healthy.number_of_records(), 2);
    assert_eq!(healthy.number_of_recovered_records(), 0);

    let carved = open(
        image.data.clone(),
        ParserSettings::new().recovery(RecoveryMode::Always),
    );
    assert_eq!(record_numbers(carved.records()), vec![1, 2]);
    assert_eq!(record_numbers(carved.recovered_records()), vec![99]);
    assert_eq!(carved.recovered_record(0).unwrap().offset, 0x800);

    let mut on_demand = EvtParser::from_buffer(image.data).unwrap();
    assert_eq!(on_demand.recover_records().unwrap(), 1);
    // Running it again replaces the previous result.
    assert_eq!(on_demand.recover_records().unwrap(), 1);
    assert_eq!(on_demand.recovered_record(0).unwrap().record_number, 99);
}

#[test]
fn test_recovery_skips_primary_records() {
    let image = plain_log(3);

    let parser = open(
        image.data,
        ParserSettings::new().recovery(RecoveryMode::Always),
    );

    assert_eq!(parser.number_of_records(), 3);
    assert_eq!(parser.number_of_recovered_records(), 0);
}

#[test]
fn test_recovery_finds_signature_across_block_boundary() {
    // Place a stale record so its signature straddles the first 64 KiB recovery block.
    let offset = 48 + 65536 - 6;
    let image = LogBuilder::new(0x20000)
        .records(1, 1)
        .stale_record(offset, event_record(42).build())
        .build();

    let parser = open(
        image.data,
        ParserSettings::new().recovery(RecoveryMode::Always),
    );

    assert_eq!(record_numbers(parser.recovered_records()), vec![42]);
    assert_eq!(parser.recovered_record(0).unwrap().offset, offset as u64);
}

#[test]
fn test_inconsistent_header_offsets_trigger_recovery() {
    let mut image = plain_log(3);
    // first_record_offset past the end of the file.
    image.set_header_u32(16, 0x10000);

    let parser = EvtParser::from_buffer(image.data).unwrap();

    assert!(parser.is_corrupted());
    assert_eq!(parser.number_of_records(), 0);
    assert_eq!(record_numbers(parser.recovered_records()), vec![1, 2, 3]);
}

#[test]
fn test_ring_without_end_of_file_record() {
    let first = event_record(1).build();
    let second = event_record(2).build();

    let mut data = file_header(48, 48, 3, 1, 48 + first.len() + second.len(), 0);
    data.extend(&first);
    data.extend(&second);

    let parser = EvtParser::from_buffer(data).unwrap();

    assert!(parser.is_corrupted());
    assert_eq!(record_numbers(parser.records()), vec![1, 2]);
    assert!(parser.end_of_file_record().unwrap().is_none());
    assert_eq!(parser.number_of_recovered_records(), 0);
}

#[test]
fn test_oversized_record_is_a_bounds_error() {
    let mut image = plain_log(2);
    image.corrupt_record(1, 0, 0x7fff_ffff);

    let parser = EvtParser::from_buffer(image.data).unwrap();

    match parser.scan_outcome() {
        ScanOutcome::Corrupted { error, .. } => assert_eq!(error.kind(), ErrorKind::Bounds),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(parser.number_of_records(), 1);
}

#[test]
fn test_abort_before_scanning() {
    let image = plain_log(3);
    let handle = AbortHandle::new();
    handle.signal();

    let parser = open(image.data, ParserSettings::new().abort_handle(handle));

    assert!(matches!(parser.scan_outcome(), ScanOutcome::Cancelled));
    assert_eq!(parser.state(), ScanState::Cancelled);
    assert_eq!(parser.number_of_records(), 0);
    assert!(!parser.is_corrupted());
}

#[test]
fn test_abort_cancels_recovery_on_demand() {
    let mut image = plain_log(3);
    image.corrupt_record(0, 140, 0);

    let mut parser = open(
        image.data,
        ParserSettings::new().recovery(RecoveryMode::Disabled),
    );
    parser.signal_abort();

    assert_eq!(parser.recover_records().unwrap(), 0);
    assert!(matches!(parser.scan_outcome(), ScanOutcome::Cancelled));

    parser.abort_handle().reset();
    assert_eq!(parser.recover_records().unwrap(), 2);
}

#[test]
fn test_abort_during_scan_keeps_decoded_records() {
    let image = plain_log(5);
    let handle = AbortHandle::new();
    let (reader, trigger) = SignallingReader::new(image.data, handle.clone());

    // Reads: the header, then a size and a body per record. The 5th read is the body of
    // record 2, so the flag is seen right after record 2 was decoded.
    trigger.arm(5);
    let parser = EvtParser::open(Box::new(reader), ParserSettings::new().abort_handle(handle))
        .unwrap();

    assert!(matches!(parser.scan_outcome(), ScanOutcome::Cancelled));
    assert_eq!(parser.state(), ScanState::Cancelled);
    assert_eq!(record_numbers(parser.records()), vec![1, 2]);
    assert_eq!(parser.number_of_recovered_records(), 0);
    assert!(!parser.is_corrupted());
}

#[test]
fn test_abort_during_recovery_stops_at_next_candidate() {
    let mut image = plain_log(4);
    image.corrupt_record(0, 140, 0);

    let handle = AbortHandle::new();
    let (reader, trigger) = SignallingReader::new(image.data, handle.clone());
    let mut parser = EvtParser::open(
        Box::new(reader),
        ParserSettings::new()
            .recovery(RecoveryMode::Disabled)
            .abort_handle(handle.clone()),
    )
    .unwrap();
    assert!(parser.is_corrupted());
    assert_eq!(parser.number_of_records(), 0);

    // Signalled while the first block is read, before any candidate is decoded.
    trigger.arm(1);
    assert_eq!(parser.recover_records().unwrap(), 0);
    assert!(matches!(parser.scan_outcome(), ScanOutcome::Cancelled));
    assert_eq!(parser.state(), ScanState::Cancelled);

    // Block read, then size and body of the rejected record 1, then the size of record 2.
    handle.reset();
    trigger.arm(4);
    assert_eq!(parser.recover_records().unwrap(), 1);
    assert_eq!(record_numbers(parser.recovered_records()), vec![2]);
    assert_eq!(parser.state(), ScanState::Cancelled);

    handle.reset();
    trigger.arm(0);
    assert_eq!(parser.recover_records().unwrap(), 3);
    assert_eq!(record_numbers(parser.recovered_records()), vec![2, 3, 4]);
    assert_eq!(parser.state(), ScanState::RecoveryComplete);
}

#[test]
fn test_header_failures_fail_open() {
    let mut image = plain_log(1);
    image.data[4] = b'X';
    let err = EvtParser::from_buffer(image.data).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);

    let mut image = plain_log(1);
    image.set_header_u32(44, 0x2c);
    let err = EvtParser::from_buffer(image.data).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);

    let err = EvtParser::from_buffer(vec![0x30, 0x00]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Bounds);
}

#[test]
fn test_ascii_codepage() {
    let record = event_record(1).strings(&["Журнал"]).build();
    let image = LogBuilder::new(0x400).record(record).build();

    let mut parser = EvtParser::from_buffer(image.data).unwrap();
    assert_eq!(parser.ascii_codepage(), AsciiCodepage::WINDOWS_1252);

    let err = parser.set_ascii_codepage(65001).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(parser.ascii_codepage(), AsciiCodepage::WINDOWS_1252);

    let record = parser.record(0).unwrap();
    assert_eq!(
        record
            .narrow_string(0, parser.ascii_codepage())
            .unwrap_err()
            .kind(),
        ErrorKind::Conversion
    );

    parser.set_ascii_codepage(1251).unwrap();
    let record = parser.record(0).unwrap();
    assert_eq!(
        record.narrow_string(0, parser.ascii_codepage()).unwrap(),
        vec![0xc6, 0xf3, 0xf0, 0xed, 0xe0, 0xeb]
    );
}

#[test]
fn test_record_index_out_of_range() {
    let parser = EvtParser::from_buffer(plain_log(2).data).unwrap();

    assert_eq!(parser.record(2).unwrap_err().kind(), ErrorKind::Argument);
    assert_eq!(
        parser.recovered_record(0).unwrap_err().kind(),
        ErrorKind::Argument
    );
}

#[test]
fn test_close_discards_state() {
    let mut parser = EvtParser::from_buffer(plain_log(2).data).unwrap();

    parser.close().unwrap();

    assert_eq!(parser.state(), ScanState::Closed);
    assert_eq!(parser.number_of_records(), 0);
    assert!(parser.header().is_err());
    assert!(matches!(parser.record(0), Err(evt::err::EvtError::NotOpen)));
    assert!(matches!(
        parser.recover_records(),
        Err(evt::err::EvtError::NotOpen)
    ));
    assert!(parser.close().is_err());
}

#[test]
fn test_from_path() {
    let image = plain_log(3);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image.data).unwrap();
    file.flush().unwrap();

    let parser = EvtParser::from_path(file.path()).unwrap();
    assert_eq!(parser.number_of_records(), 3);
    assert_eq!(parser.file_size().unwrap(), 0x1000);

    let missing = file.path().with_extension("missing");
    let err = EvtParser::from_path(&missing).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_records_render_to_json_and_xml() {
    let parser = EvtParser::from_buffer(plain_log(1).data).unwrap();
    let record = parser.record(0).unwrap();

    let value = record.to_json_value().unwrap();
    assert_eq!(value["Event"]["System"]["EventRecordID"], 1);
    assert_eq!(value["Event"]["EventData"]["Data"][1], "QoS RSVP 1");

    let xml = record.to_xml(parser.settings()).unwrap();
    assert!(xml.contains("<Data>QoS RSVP 1</Data>"));
}
