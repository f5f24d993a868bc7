//! Result file: one comma separated line per record.
//!
//! `source_label, source_line, plain_text, digest, True|False`
//!
//! Lines are written with a single `write_all`, so an interrupted run never
//! leaves half a record behind.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::record::HashRecord;

/// Written in place of the plaintext when only the digest is known.
pub const NO_PLAINTEXT: &str = "no_pwd";

const SEPARATOR: &str = ", ";

pub struct RecordWriter<W: Write> {
    inner: W,
    line: String,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, line: String::with_capacity(128) }
    }

    pub fn write_record(&mut self, record: &HashRecord) -> io::Result<()> {
        self.line.clear();
        self.line.push_str(&record.source_label);
        self.line.push_str(SEPARATOR);
        self.line.push_str(&record.source_line.to_string());
        self.line.push_str(SEPARATOR);
        self.line.push_str(record.plain_text.as_deref().unwrap_or(NO_PLAINTEXT));
        self.line.push_str(SEPARATOR);
        self.line.push_str(&record.digest);
        self.line.push_str(SEPARATOR);
        self.line.push_str(if record.is_pwned() { "True" } else { "False" });
        self.line.push('\n');
        self.inner.write_all(self.line.as_bytes())
    }

    pub fn write_all_records(&mut self, records: &[HashRecord]) -> io::Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        self.inner.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Parses a line produced by [`RecordWriter`].
///
/// The plaintext may itself contain the separator: digest and flag are taken
/// from the right, label and line number from the left. The label ends at the
/// first separator followed by a numeric field, so a label may contain the
/// separator too unless it is itself followed by digits and another separator.
pub fn parse_record(line: &str) -> Result<HashRecord> {
    let malformed = || Error::MalformedRecord { line: line.to_string() };
    let trimmed = line.trim_end_matches(['\r', '\n']);

    let mut tail = trimmed.rsplitn(3, SEPARATOR);
    let flag = tail.next().ok_or_else(malformed)?;
    let digest = tail.next().ok_or_else(malformed)?;
    let head = tail.next().ok_or_else(malformed)?;

    let (label, source_line, plain) = split_head(head).ok_or_else(malformed)?;

    let mut record = HashRecord::from_digest(digest, label, source_line);
    if plain != NO_PLAINTEXT {
        record.plain_text = Some(plain.to_string());
    }
    match flag {
        "True" => record.mark_pwned(),
        "False" => {}
        _ => return Err(malformed()),
    }
    Ok(record)
}

// Splits `label, line, plain` where both label and plain may contain the separator.
fn split_head(head: &str) -> Option<(&str, u64, &str)> {
    head.match_indices(SEPARATOR).find_map(|(at, _)| {
        let (number, plain) = head[at + SEPARATOR.len()..].split_once(SEPARATOR)?;
        let source_line = number.parse().ok()?;
        Some((&head[..at], source_line, plain))
    })
}
