use criterion::{Criterion, criterion_group, criterion_main};
use evt::{EvtParser, ParserSettings, RecoveryMode};
use std::hint::black_box;
use std::io::Cursor;

#[path = "../../tests/fixtures.rs"]
mod fixtures;

use fixtures::{LogBuilder, event_record};

fn synthesized_log() -> Vec<u8> {
    LogBuilder::new(0x40000)
        .records(1, 1000)
        .stale_record(0x30000, event_record(5000).build())
        .build()
        .data
}

fn process_records(buffer: &[u8], recovery: RecoveryMode) {
    let parser = EvtParser::open(
        Box::new(Cursor::new(buffer.to_vec())),
        ParserSettings::new().recovery(recovery),
    )
    .unwrap();

    for (i, record) in parser.records().iter().enumerate() {
        assert_eq!(record.record_number, i as u32 + 1);
        black_box(record.string(1).unwrap());
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let evt_file = synthesized_log();

    c.bench_function("scan 1000 records", |b| {
        b.iter(|| process_records(&evt_file, RecoveryMode::Disabled))
    });
    c.bench_function("scan and recover 1000 records", |b| {
        b.iter(|| process_records(&evt_file, RecoveryMode::Always))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
