//! Strict versus lenient handling of damaged input.

mod common;

use common::{assert_balanced, diskette, FailingListener, MabRecordBuilder, RECORD_TERMINATOR};
use marcx::{
    Delimiters, DiagnosticKind, EventRecorder, FieldMapper, MabDisketteReader, MapperConfig,
    MarcError, PicaXmlReader, ReaderConfig, SharedDiagnostics,
};
use std::io::{self, Cursor, Read};

fn good(id: &str) -> Vec<u8> {
    MabRecordBuilder::new()
        .control("001", id)
        .data("331", " ", &[('a', "Title")])
        .build()
}

fn truncated() -> Vec<u8> {
    let mut bytes = b"01234nM2.0120".to_vec();
    bytes.push(RECORD_TERMINATOR);
    bytes
}

#[test]
fn test_lenient_skips_bad_record_and_continues() {
    let input = diskette(&[good("1"), truncated(), good("3")]);
    let diagnostics = SharedDiagnostics::new();
    let mut reader = MabDisketteReader::new(ReaderConfig::default(), diagnostics.clone()).unwrap();
    let mut recorder = EventRecorder::new();

    let count = reader.parse(Cursor::new(input), &mut recorder).unwrap();

    assert_eq!(count, 2);
    assert_balanced(&recorder.events);
    assert_eq!(diagnostics.count(DiagnosticKind::RecordSkipped), 1);
    assert_eq!(reader.recovered(), 1);
}

#[test]
fn test_strict_aborts_on_first_bad_record() {
    let input = diskette(&[good("1"), truncated(), good("3")]);
    let config = ReaderConfig::default().with_fatal_errors(true);
    let mut reader = MabDisketteReader::new(config, Vec::new()).unwrap();
    let mut recorder = EventRecorder::new();

    let result = reader.parse(Cursor::new(input), &mut recorder);

    assert!(matches!(result, Err(MarcError::InvalidRecord(_))));
    assert_eq!(recorder.record_count(), 1);
    assert!(reader.diagnostics().is_empty());
}

#[test]
fn test_broken_directory_entry() {
    let mut record = good("1");
    // Field length of the first directory entry.
    record[27..31].copy_from_slice(b"00x9");
    let input = diskette(&[record, good("2")]);

    let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new()).unwrap();
    let mut recorder = EventRecorder::new();
    assert_eq!(reader.parse(Cursor::new(input), &mut recorder).unwrap(), 1);
    assert_eq!(
        reader.diagnostics()[0].kind(),
        DiagnosticKind::RecordSkipped
    );
}

#[test]
fn test_listener_error_stops_parse() {
    let input = diskette(&[good("1"), good("2"), good("3")]);
    let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new()).unwrap();
    let mut listener = FailingListener {
        fail_on: 2,
        seen: 0,
    };

    let result = reader.parse(Cursor::new(input), &mut listener);

    assert!(matches!(result, Err(MarcError::ListenerError(_))));
    assert_eq!(listener.seen, 2);
}

#[test]
fn test_listener_error_propagates_through_mapper() {
    let input = diskette(&[good("1"), good("2")]);
    let mut mapper = FieldMapper::new(
        MapperConfig::default(),
        FailingListener {
            fail_on: 1,
            seen: 0,
        },
        Vec::new(),
    );
    let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new()).unwrap();
    let result = reader.parse(Cursor::new(input), &mut mapper);
    assert!(matches!(result, Err(MarcError::ListenerError(_))));
}

/// Source that fails after yielding some bytes.
struct FlakySource {
    data: Cursor<Vec<u8>>,
}

impl Read for FlakySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone")),
            n => Ok(n),
        }
    }
}

#[test]
fn test_io_error_always_propagates() {
    let source = FlakySource {
        data: Cursor::new(good("1")),
    };
    // Lenient mode does not swallow I/O failures.
    let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new()).unwrap();
    let mut recorder = EventRecorder::new();
    let result = reader.parse(source, &mut recorder);
    assert!(matches!(result, Err(MarcError::IoError(_))));
}

#[test]
fn test_tiny_buffer_reads_same_records() {
    let input = diskette(&[good("1"), good("2"), good("3")]);
    let config = ReaderConfig::default().with_buffer_size(7);
    let mut reader = MabDisketteReader::new(config, Vec::new()).unwrap();
    let mut recorder = EventRecorder::new();
    assert_eq!(reader.parse(Cursor::new(input), &mut recorder).unwrap(), 3);
}

#[test]
fn test_iso2709_without_padding_rejects_padding() {
    let input = diskette(&[good("1"), good("2")]);
    let mut reader = MabDisketteReader::new(ReaderConfig::default(), Vec::new())
        .unwrap()
        .with_delimiters(Delimiters::iso2709());
    let mut recorder = EventRecorder::new();

    // The CR LF in front of the second record is not skipped: its label is
    // misaligned, the base address is wrong and the directory breaks. The
    // trailing CR LF SUB is too short to be a record.
    let count = reader.parse(Cursor::new(input), &mut recorder).unwrap();
    assert_eq!(count, 1);
    let kinds: Vec<DiagnosticKind> = reader.diagnostics().iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::MalformedLabel,
            DiagnosticKind::RecordSkipped,
            DiagnosticKind::RecordSkipped,
        ]
    );
}

#[test]
fn test_pica_malformed_xml_is_fatal() {
    let xml = r#"<collection><record><datafield tag="021A"></record></collection>"#;
    let mut reader = PicaXmlReader::new(ReaderConfig::default(), Vec::new());
    let mut recorder = EventRecorder::new();
    let result = reader.parse(xml.as_bytes(), &mut recorder);
    assert!(matches!(result, Err(MarcError::XmlError(_))));
}

const SHORT_LEADER: &str = r#"<collection><record><leader>00000nam</leader><datafield tag="021A"><subfield code="a">Titel</subfield></datafield></record></collection>"#;

#[test]
fn test_pica_short_leader_strict() {
    let config = ReaderConfig::default().with_fatal_errors(true);
    let mut reader = PicaXmlReader::new(config, Vec::new());
    let mut recorder = EventRecorder::new();
    let result = reader.parse(SHORT_LEADER.as_bytes(), &mut recorder);
    assert!(matches!(result, Err(MarcError::InvalidLabel(_))));
    assert_eq!(recorder.record_count(), 0);
}

#[test]
fn test_pica_short_leader_lenient() {
    let diagnostics = SharedDiagnostics::new();
    let mut reader = PicaXmlReader::new(ReaderConfig::default(), diagnostics.clone());
    let mut recorder = EventRecorder::new();
    let count = reader
        .parse(SHORT_LEADER.as_bytes(), &mut recorder)
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(diagnostics.count(DiagnosticKind::MalformedLabel), 1);
    assert_eq!(reader.recovered(), 1);
    assert!(recorder
        .events
        .contains(&marcx::MarcEvent::Leader("00000nam".to_string())));
}
