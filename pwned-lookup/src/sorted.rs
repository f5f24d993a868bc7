//! Binary search over a sorted, newline-delimited text corpus.
//!
//! The corpus may be far too large to index, so the search works directly on
//! byte offsets: probe an offset, move forward to the next line start, and
//! compare that line with the target. No line index is ever built.
//!
//! The corpus must be sorted ascending by digest. That is not checked; an
//! unsorted corpus gives wrong answers, not errors.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::digest::DIGEST_LEN;
use crate::error::{Error, Result};
use crate::observer::{LookupObserver, LookupReport, MatchSite};
use crate::record::{HashRecord, Verdict};
use crate::stats::RunStats;

/// Result of a single binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Byte offset of the matching line, if the target was found.
    pub offset: Option<u64>,
    /// Lines inspected before the search finished.
    pub probes: u64,
}

impl Probe {
    pub fn found(&self) -> bool {
        self.offset.is_some()
    }
}

/// A sorted corpus opened for binary search.
pub struct SortedCorpus<R> {
    reader: BufReader<R>,
    len: u64,
    line: Vec<u8>,
    skipped: Vec<u8>,
}

impl SortedCorpus<File> {
    /// Opens a sorted corpus file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::CorpusNotFound { path: path.to_path_buf() },
            _ => Error::Io(e),
        })?;
        Ok(Self::new(file)?)
    }
}

impl<R: Read + Seek> SortedCorpus<R> {
    pub fn new(inner: R) -> io::Result<Self> {
        let mut reader = BufReader::new(inner);
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, len, line: Vec::with_capacity(64), skipped: Vec::with_capacity(64) })
    }

    /// Total corpus size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Searches for the line starting with `digest`.
    ///
    /// Only full-width digests are accepted: a shorter target would match as a
    /// prefix of an unrelated line.
    pub fn find(&mut self, digest: &str) -> Result<Probe> {
        self.find_with(digest, |_| {})
    }

    /// Like [`SortedCorpus::find`], calling `on_probe` with the running probe
    /// count after every inspected line.
    pub fn find_with<F: FnMut(u64)>(&mut self, digest: &str, mut on_probe: F) -> Result<Probe> {
        if digest.len() != DIGEST_LEN {
            return Err(Error::MalformedDigest { digest: digest.to_string() });
        }
        let target = digest.to_ascii_uppercase();
        let target = target.as_bytes();

        // Candidate lines start somewhere in [low, high).
        let mut low = 0u64;
        let mut high = self.len;
        let mut probes = 0u64;

        while low < high {
            let mid = low + (high - low) / 2;
            probes += 1;
            on_probe(probes);

            match self.line_at(mid)? {
                Some((start, consumed)) if start < high => {
                    let probe = trim_line(&self.line);
                    if probe.starts_with(target) {
                        return Ok(Probe { offset: Some(start), probes });
                    }
                    if probe < target {
                        low = start + consumed;
                    } else {
                        high = mid;
                    }
                }
                // No line starts between mid and high.
                _ => high = mid,
            }
        }

        Ok(Probe { offset: None, probes })
    }

    /// Reads the first line starting at or after `offset` into `self.line`.
    ///
    /// Returns the line's start offset and the number of bytes it occupies
    /// including its terminator, or `None` past the last line.
    fn line_at(&mut self, offset: u64) -> io::Result<Option<(u64, u64)>> {
        let start = if offset == 0 {
            self.reader.seek(SeekFrom::Start(0))?;
            0
        } else {
            // Starting one byte early lands exactly on `offset` when it is
            // already a line start.
            self.reader.seek(SeekFrom::Start(offset - 1))?;
            self.skipped.clear();
            let skipped = self.reader.read_until(b'\n', &mut self.skipped)?;
            offset - 1 + skipped as u64
        };

        if start >= self.len {
            return Ok(None);
        }

        self.line.clear();
        let consumed = self.reader.read_until(b'\n', &mut self.line)?;
        if consumed == 0 {
            return Ok(None);
        }
        Ok(Some((start, consumed as u64)))
    }
}

#[inline]
fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// Runs an independent binary search for every record in `records`.
///
/// Already pwned and malformed records are skipped. A record whose digest is
/// not 40 characters wide is flagged malformed and counted invalid instead of
/// aborting the batch. Unmatched records end up safe.
pub fn search_batch<R, O>(
    corpus: &mut SortedCorpus<R>,
    records: &mut [HashRecord],
    stats: &mut RunStats,
    observer: &mut O,
) -> Result<LookupReport>
where
    R: Read + Seek,
    O: LookupObserver + ?Sized,
{
    let mut considered = 0u64;
    let mut previously_matched = 0usize;
    let mut newly_matched = 0usize;
    let mut total_probes = 0u64;
    let mut remaining = records.iter().filter(|r| r.is_open()).count();

    for record in records.iter_mut() {
        match record.verdict() {
            Verdict::Malformed => continue,
            Verdict::Pwned => {
                considered += 1;
                previously_matched += 1;
                continue;
            }
            _ => {}
        }

        if record.digest.len() != DIGEST_LEN {
            tracing::warn!(digest = %record.digest, "digest is not 40 characters, skipping binary search");
            record.mark_malformed();
            stats.invalid += 1;
            stats.passwords_read += 1;
            remaining -= 1;
            continue;
        }
        considered += 1;

        let base = total_probes;
        let probe = corpus.find_with(&record.digest, |n| observer.on_progress(base + n))?;
        total_probes += probe.probes;

        match probe.offset {
            Some(offset) => {
                record.mark_pwned();
                newly_matched += 1;
                remaining -= 1;
                tracing::debug!(digest = %record.digest, offset, probes = probe.probes, "sorted corpus match");
                observer.on_match(record, MatchSite::Offset(offset), remaining);
            }
            None => record.mark_safe(),
        }
    }

    stats.record_batch(considered, (previously_matched + newly_matched) as u64, total_probes);

    Ok(LookupReport { newly_matched, previously_matched, lines_scanned: total_probes })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::observer::Silent;

    fn digest(c: char) -> String {
        c.to_string().repeat(DIGEST_LEN)
    }

    fn sorted(lines: &[String]) -> SortedCorpus<Cursor<Vec<u8>>> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        SortedCorpus::new(Cursor::new(text.into_bytes())).unwrap()
    }

    fn with_counts(digests: &[String]) -> Vec<String> {
        digests.iter().enumerate().map(|(i, d)| format!("{d}:{}", i * 37 + 1)).collect()
    }

    #[test]
    fn test_empty_corpus() {
        let mut corpus = sorted(&[]);
        assert!(corpus.is_empty());
        let probe = corpus.find(&digest('A')).unwrap();
        assert!(!probe.found());
        assert_eq!(probe.probes, 0);
    }

    #[test]
    fn test_single_line() {
        let mut corpus = sorted(&[format!("{}:3", digest('5'))]);
        assert_eq!(corpus.find(&digest('5')).unwrap().offset, Some(0));
        assert!(!corpus.find(&digest('0')).unwrap().found());
        assert!(!corpus.find(&digest('F')).unwrap().found());
    }

    #[test]
    fn test_two_lines() {
        let mut corpus = sorted(&with_counts(&[digest('1'), digest('8')]));
        assert!(corpus.find(&digest('1')).unwrap().found());
        assert!(corpus.find(&digest('8')).unwrap().found());
        assert!(!corpus.find(&digest('0')).unwrap().found());
        assert!(!corpus.find(&digest('4')).unwrap().found());
        assert!(!corpus.find(&digest('9')).unwrap().found());
    }

    #[test]
    fn test_every_position_of_larger_corpus() {
        let present: Vec<String> = (0..257u32).map(|i| format!("{:040X}", i * 4 + 2)).collect();
        let mut corpus = sorted(&with_counts(&present));

        for target in &present {
            assert!(corpus.find(target).unwrap().found(), "{target} should be found");
        }
        for absent in [0u32, 1, 3, 500, 1027, 1029, 4096] {
            let target = format!("{absent:040X}");
            assert!(!corpus.find(&target).unwrap().found(), "{target} should be absent");
        }
    }

    #[test]
    fn test_first_and_last_lines_without_trailing_newline() {
        let text = format!("{}:1\n{}:2\n{}:3", digest('1'), digest('2'), digest('3'));
        let mut corpus = SortedCorpus::new(Cursor::new(text.into_bytes())).unwrap();
        assert_eq!(corpus.find(&digest('1')).unwrap().offset, Some(0));
        assert!(corpus.find(&digest('3')).unwrap().found());
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = format!("{}:1\r\n{}:2\r\n{}:3\r\n", digest('1'), digest('2'), digest('3'));
        let mut corpus = SortedCorpus::new(Cursor::new(text.into_bytes())).unwrap();
        for c in ['1', '2', '3'] {
            assert!(corpus.find(&digest(c)).unwrap().found());
        }
    }

    #[test]
    fn test_middle_target_found_within_two_probes() {
        let mut corpus = sorted(&[digest('A'), digest('B'), digest('C')]);
        let probe = corpus.find(&digest('B')).unwrap();
        assert!(probe.found());
        assert!(probe.probes <= 2, "took {} probes", probe.probes);
    }

    #[test]
    fn test_target_above_every_line_exhausts_search() {
        let mut corpus = sorted(&[digest('A'), digest('B'), digest('C')]);
        let probe = corpus.find(&digest('Z')).unwrap();
        assert!(!probe.found());
        assert!(probe.probes > 0);
    }

    #[test]
    fn test_lowercase_target() {
        let mut corpus = sorted(&with_counts(&[digest('A'), digest('B'), digest('C')]));
        assert!(corpus.find(&digest('b')).unwrap().found());
    }

    #[test]
    fn test_truncated_target_is_rejected() {
        let mut corpus = sorted(&[digest('A')]);
        assert!(matches!(corpus.find("AAAA"), Err(Error::MalformedDigest { .. })));
        assert!(matches!(corpus.find(&"A".repeat(41)), Err(Error::MalformedDigest { .. })));
    }

    #[test]
    fn test_search_batch() {
        let mut corpus = sorted(&with_counts(&[digest('2'), digest('4'), digest('6'), digest('8')]));
        let mut records = vec![
            HashRecord::from_digest(&digest('4'), "t", 1),
            HashRecord::from_digest(&digest('5'), "t", 2),
            HashRecord::from_digest("4444", "t", 3),
            HashRecord::from_digest(&digest('8'), "t", 4).with_verdict(Verdict::Pwned),
        ];
        let mut stats = RunStats::new();

        let report = search_batch(&mut corpus, &mut records, &mut stats, &mut Silent).unwrap();

        assert!(records[0].is_pwned());
        assert_eq!(records[1].verdict(), Verdict::Safe);
        assert_eq!(records[2].verdict(), Verdict::Malformed);
        assert!(records[3].is_pwned());
        assert_eq!(report.newly_matched, 1);
        assert_eq!(report.previously_matched, 1);
        assert_eq!(stats.passwords_read, 4);
        assert_eq!(stats.pwned_found, 2);
        assert_eq!(stats.safe_found, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.scanned_lines, report.lines_scanned);
    }

    #[derive(Default)]
    struct Remaining(Vec<usize>);

    impl LookupObserver for Remaining {
        fn on_match(&mut self, _record: &HashRecord, _site: MatchSite, remaining: usize) {
            self.0.push(remaining);
        }
    }

    #[test]
    fn test_batch_remaining_counts_unmatched_records() {
        let mut corpus = sorted(&with_counts(&[digest('A'), digest('C')]));
        let mut records = vec![
            HashRecord::from_digest(&digest('A'), "t", 1),
            HashRecord::from_digest(&digest('B'), "t", 2),
            HashRecord::from_digest(&digest('C'), "t", 3),
        ];
        let mut observer = Remaining::default();

        search_batch(&mut corpus, &mut records, &mut RunStats::new(), &mut observer).unwrap();

        assert_eq!(observer.0, vec![2, 1]);
        assert_eq!(records[1].verdict(), Verdict::Safe);
    }
}
