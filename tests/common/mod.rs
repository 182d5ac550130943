//! Common test helpers shared across the integration suite.

#![allow(dead_code)]

use marcx::{MarcEvent, MarcListener};

pub const FIELD_TERMINATOR: u8 = 0x1E;
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// A canonical MAB-style label: indicator length 1, subfield code length 2.
pub const MAB_LABEL_TEMPLATE: &str = "00000nM2.01200000   4500";

/// Builder for binary MAB-Diskette records.
///
/// Produces a well-formed label (record length, base address and entry
/// widths filled in), the directory, and the data area.
#[derive(Debug, Default)]
pub struct MabRecordBuilder {
    indicator_length: usize,
    fields: Vec<(String, Vec<u8>)>,
}

impl MabRecordBuilder {
    pub fn new() -> Self {
        MabRecordBuilder {
            indicator_length: 1,
            fields: Vec::new(),
        }
    }

    pub fn indicator_length(mut self, length: usize) -> Self {
        self.indicator_length = length;
        self
    }

    pub fn control(mut self, tag: &str, data: &str) -> Self {
        self.fields.push((tag.to_string(), data.as_bytes().to_vec()));
        self
    }

    pub fn data(mut self, tag: &str, indicator: &str, subfields: &[(char, &str)]) -> Self {
        let mut body = indicator.as_bytes().to_vec();
        for (code, value) in subfields {
            body.push(SUBFIELD_DELIMITER);
            body.push(*code as u8);
            body.extend_from_slice(value.as_bytes());
        }
        self.fields.push((tag.to_string(), body));
        self
    }

    pub fn raw(mut self, tag: &str, body: &[u8]) -> Self {
        self.fields.push((tag.to_string(), body.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        for (tag, body) in &self.fields {
            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(
                format!("{:04}{:05}", body.len() + 1, data.len()).as_bytes(),
            );
            data.extend_from_slice(body);
            data.push(FIELD_TERMINATOR);
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = 24 + directory.len();
        let record_length = base_address + data.len() + 1;

        let mut label = MAB_LABEL_TEMPLATE.as_bytes().to_vec();
        label[0..5].copy_from_slice(format!("{record_length:05}").as_bytes());
        label[10] = b'0' + self.indicator_length as u8;
        label[12..17].copy_from_slice(format!("{base_address:05}").as_bytes());

        let mut bytes = label;
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&data);
        bytes.push(RECORD_TERMINATOR);
        bytes
    }
}

/// Concatenate records the way a DOS diskette export writes them.
pub fn diskette(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        out.extend_from_slice(record);
        out.extend_from_slice(b"\r\n");
    }
    out.push(0x1A);
    out
}

/// Check that every begin event has its matching end, properly nested.
pub fn assert_balanced(events: &[MarcEvent]) {
    let mut stack: Vec<&'static str> = Vec::new();
    for event in events {
        match event {
            MarcEvent::BeginCollection => stack.push("collection"),
            MarcEvent::BeginRecord { .. } => stack.push("record"),
            MarcEvent::BeginControlField(_) => stack.push("control"),
            MarcEvent::BeginDataField(_) => stack.push("data"),
            MarcEvent::BeginSubfield(_) => stack.push("subfield"),
            MarcEvent::EndCollection => assert_eq!(stack.pop(), Some("collection")),
            MarcEvent::EndRecord => assert_eq!(stack.pop(), Some("record")),
            MarcEvent::EndControlField(_) => assert_eq!(stack.pop(), Some("control")),
            MarcEvent::EndDataField(_) => assert_eq!(stack.pop(), Some("data")),
            MarcEvent::EndSubfield(_) => assert_eq!(stack.pop(), Some("subfield")),
            MarcEvent::Leader(_) => assert_eq!(stack.last(), Some(&"record")),
        }
    }
    assert!(stack.is_empty(), "unclosed events: {stack:?}");
}

/// Listener that fails on the n-th record.
#[derive(Debug, Default)]
pub struct FailingListener {
    pub fail_on: usize,
    pub seen: usize,
}

impl MarcListener for FailingListener {
    fn begin_record(&mut self, _format: &str, _record_type: &str) -> marcx::Result<()> {
        self.seen += 1;
        if self.seen == self.fail_on {
            return Err(marcx::MarcError::ListenerError(format!(
                "refusing record {}",
                self.seen
            )));
        }
        Ok(())
    }

    fn leader(&mut self, _label: &str) -> marcx::Result<()> {
        Ok(())
    }

    fn begin_control_field(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn end_control_field(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn begin_data_field(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn end_data_field(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn begin_subfield(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn end_subfield(&mut self, _field: &marcx::Field) -> marcx::Result<()> {
        Ok(())
    }

    fn end_record(&mut self) -> marcx::Result<()> {
        Ok(())
    }
}
