//! Turns input files into batches of [`HashRecord`]s.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::record::HashRecord;

/// How entries of an input are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// Plaintext passwords, hashed on read.
    #[default]
    Plain,
    /// SHA1 hex digests; no plaintext is ever known.
    Sha1,
}

/// Lines starting with any of these are skipped by [`extract_words`].
pub const EXCLUDED_LINE_PREFIXES: [&str; 8] = ["http", "https", "***", "---", "___", "#", "//", "/*"];

/// Characters treated as word separators in addition to spaces.
pub const SPLIT_CHARS: [char; 4] = [':', '/', '=', '\t'];

/// Words shorter than this are not considered passwords.
pub const MIN_WORD_LENGTH: usize = 5;

/// Builds one record from a single entry.
pub fn record_from_input(entry: &str, format: InputFormat, source_label: &str, source_line: u64) -> HashRecord {
    match format {
        InputFormat::Plain => HashRecord::from_password(entry, source_label, source_line),
        InputFormat::Sha1 => HashRecord::from_digest(entry, source_label, source_line),
    }
}

/// Reads a list with one password (or digest) per line.
///
/// Blank lines are skipped but still counted, so `source_line` always points
/// at the real line. Invalid UTF-8 is replaced rather than rejected.
pub fn read_password_list(path: &Path, format: InputFormat) -> Result<Vec<HashRecord>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let label = path.to_string_lossy();

    let records: Vec<HashRecord> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| record_from_input(line, format, &label, i as u64 + 1))
        .collect();

    tracing::debug!(path = %path.display(), records = records.len(), ?format, "read password list");
    Ok(records)
}

/// Extracts candidate passwords from free-form text.
pub fn extract_words(path: &Path) -> Result<Vec<HashRecord>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let records = words_in_text(&text, &path.to_string_lossy());
    tracing::debug!(path = %path.display(), records = records.len(), "extracted words from text");
    Ok(records)
}

fn words_in_text(text: &str, source_label: &str) -> Vec<HashRecord> {
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if EXCLUDED_LINE_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
            continue;
        }
        for word in line.split(|c: char| c == ' ' || SPLIT_CHARS.contains(&c)) {
            if word.chars().count() >= MIN_WORD_LENGTH {
                records.push(HashRecord::from_password(word, source_label, i as u64 + 1));
            }
        }
    }
    records
}
