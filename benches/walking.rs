use criterion::{criterion_group, criterion_main, Criterion};

use sbr::export::document::{walk_document, ExtractOptions};
use sbr::export::filename::DateZone;
use sbr::parser::backup::BackupReader;
use sbr::report::MemoryReporter;

/// Build a backup with `count` SMS and `count` single-photo MMS records.
fn synthetic_backup(count: usize) -> String {
    let mut xml = String::from("<?xml version='1.0' encoding='UTF-8'?>\n<smses>\n");
    let payload = "AQIDBAUGBwgJ".repeat(256);
    for i in 0..count {
        let date = 1_700_000_000_000u64 + (i as u64) * 1000;
        xml.push_str(&format!(
            "<sms address=\"+1555\" date=\"{date}\" body=\"message {i}\" />\n"
        ));
        xml.push_str(&format!(
            "<mms date=\"{date}\"><parts><part ct=\"application/smil\" text=\"&lt;smil/&gt;\" />\
             <part ct=\"image/jpeg\" cl=\"img{i}.jpg\" data=\"{payload}\" /></parts></mms>\n"
        ));
    }
    xml.push_str("</smses>\n");
    xml
}

fn bench_read_records(c: &mut Criterion) {
    let xml = synthetic_backup(500);
    c.bench_function("read_records_500", |b| {
        b.iter(|| {
            let mut reader = BackupReader::from_reader(xml.as_bytes(), "bench.xml");
            let mut count = 0u64;
            while let Some(_item) = reader.next_item().unwrap() {
                count += 1;
            }
            count
        })
    });
}

fn bench_walk_document(c: &mut Criterion) {
    let input = tempfile::tempdir().unwrap();
    let doc = input.path().join("sms-bench.xml");
    std::fs::write(&doc, synthetic_backup(100)).unwrap();
    let options = ExtractOptions {
        zone: DateZone::Utc,
        ..Default::default()
    };

    c.bench_function("walk_document_100", |b| {
        b.iter(|| {
            let output = tempfile::tempdir().unwrap();
            walk_document(&doc, output.path(), &options, &MemoryReporter::new()).unwrap()
        })
    });
}

criterion_group!(benches, bench_read_records, bench_walk_document);
criterion_main!(benches);
