#![allow(missing_docs)]
//! Benchmarks for the marcx reading and mapping pipeline.
//!
//! Input is generated in memory so the suite runs without fixtures.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use marcx::{
    EventRecorder, FieldMapper, MabDisketteReader, MapperConfig, MappingTables, NoopSink,
    PicaXmlReader, ReaderConfig, RecordCollector,
};
use std::fmt::Write as _;
use std::io::Cursor;

const MAB2MARC: &str = r#"{
    "mab2marc": {
        "100": { " ": { "a": ">100$1 $a", "d": "<100$1 $d" } },
        "331": { " ": { "a": ">245$10$a", "b": "245$10$b" } },
        "359": { " ": { "a": "<245$10$c" } },
        "902": { " ": { "s": ">650${r}$a" } },
        "999": null
    }
}"#;

/// Encode one MAB-Diskette record with the usual title and author fields.
fn mab_record(id: usize) -> Vec<u8> {
    let fields: Vec<(&str, String)> = vec![
        ("001", format!("{id:09}")),
        ("100", " \x1faMustermann, Erika\x1fd1970-".to_string()),
        ("331", format!(" \x1faTitel {id}\x1fbUntertitel")),
        ("359", " \x1faErika Mustermann".to_string()),
        ("902", " \x1fsBibliothek".to_string()),
        ("902", " \x1fsKatalog".to_string()),
    ];

    let mut directory = Vec::new();
    let mut data = Vec::new();
    for (tag, body) in &fields {
        directory.extend_from_slice(format!("{tag}{:04}{:05}", body.len() + 1, data.len()).as_bytes());
        data.extend_from_slice(body.as_bytes());
        data.push(0x1E);
    }
    directory.push(0x1E);

    let base = 24 + directory.len();
    let length = base + data.len() + 1;
    let mut record = format!("{length:05}nM2.012{base:05}   4500").into_bytes();
    record.extend_from_slice(&directory);
    record.extend_from_slice(&data);
    record.push(0x1D);
    record.extend_from_slice(b"\r\n");
    record
}

fn mab_diskette(records: usize) -> Vec<u8> {
    let mut out: Vec<u8> = (0..records).flat_map(mab_record).collect();
    out.push(0x1A);
    out
}

fn pica_collection(records: usize) -> Vec<u8> {
    let mut xml = String::from("<collection>");
    for id in 0..records {
        let _ = write!(
            xml,
            r#"<record><controlfield tag="001">{id}</controlfield><datafield tag="003@"><subfield code="0">{id:09}</subfield></datafield><datafield tag="021A"><subfield code="a">Titel {id}</subfield><subfield code="d">Untertitel</subfield></datafield><datafield tag="044K" occurrence="01"><subfield code="a">Bibliothek</subfield></datafield></record>"#
        );
    }
    xml.push_str("</collection>");
    xml.into_bytes()
}

/// Raw reader throughput into a listener that only records events.
fn benchmark_mab_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("mab_reader");
    for records in [1_000, 10_000] {
        let input = black_box(mab_diskette(records));
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &input, |b, input| {
            b.iter(|| {
                let mut reader = MabDisketteReader::new(ReaderConfig::default(), NoopSink)
                    .expect("default config");
                let mut recorder = EventRecorder::new();
                reader
                    .parse(Cursor::new(input.as_slice()), &mut recorder)
                    .expect("parse")
            });
        });
    }
    group.finish();
}

/// Reader followed by the field mapper and a record collector.
fn benchmark_mab_mapping(c: &mut Criterion) {
    let tables = MappingTables::from_json_str(MAB2MARC).expect("tables");
    let input = black_box(mab_diskette(1_000));

    c.bench_function("mab_to_marc21_1k", |b| {
        b.iter(|| {
            let mut mapper = FieldMapper::new(
                MapperConfig::default()
                    .with_format("MARC21")
                    .with_tables(tables.clone()),
                RecordCollector::new(),
                NoopSink,
            );
            let mut reader =
                MabDisketteReader::new(ReaderConfig::default(), NoopSink).expect("default config");
            reader
                .parse(Cursor::new(input.as_slice()), &mut mapper)
                .expect("parse");
            mapper.into_inner().0.records.len()
        });
    });
}

/// PICA XML tokenizing and record assembly.
fn benchmark_pica_reader(c: &mut Criterion) {
    let input = black_box(pica_collection(1_000));

    c.bench_function("pica_reader_1k", |b| {
        b.iter(|| {
            let mut reader = PicaXmlReader::new(ReaderConfig::default(), NoopSink);
            let mut collector = RecordCollector::new();
            reader
                .parse(input.as_slice(), &mut collector)
                .expect("parse")
        });
    });
}

criterion_group!(
    benches,
    benchmark_mab_reader,
    benchmark_mab_mapping,
    benchmark_pica_reader
);
criterion_main!(benches);
