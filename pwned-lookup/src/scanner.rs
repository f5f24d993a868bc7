//! Single-pass matching of many digests against a corpus in arbitrary order.
//!
//! Every corpus line is tested against every record that is still unmatched.
//! Corpus lines pair the digest with an occurrence count (`DIGEST:COUNT`), so
//! the test is containment rather than equality. The pass stops as soon as
//! every record has been matched.

use std::io::{self, BufRead};

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::observer::{LookupObserver, LookupReport, MatchSite};
use crate::record::{HashRecord, Verdict};
use crate::stats::RunStats;

/// Progress is reported every this many corpus lines.
pub const PROGRESS_EVERY: u64 = 100_000;

/// Lines handed to the worker pool per round in [`scan_corpus_parallel`].
pub const CHUNK_LINES: usize = 64 * 1024;

/// Returns true if `needle` occurs in `haystack`. An empty needle never matches.
#[inline]
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}

/// Snapshot of a batch taken before a pass starts.
struct BatchCounts {
    considered: u64,
    previously_matched: usize,
    open: usize,
}

impl BatchCounts {
    fn of(records: &[HashRecord]) -> Self {
        let mut counts = Self { considered: 0, previously_matched: 0, open: 0 };
        for record in records {
            match record.verdict() {
                Verdict::Malformed => continue,
                Verdict::Pwned => counts.previously_matched += 1,
                _ => counts.open += 1,
            }
            counts.considered += 1;
        }
        counts
    }
}

/// Scans `corpus` line by line, marking every record whose digest is found.
///
/// Records left unmatched when the corpus ends are marked safe. Already
/// pwned records are not tested again, and records classified as malformed are
/// skipped entirely.
pub fn scan_corpus<R, O>(
    mut corpus: R,
    records: &mut [HashRecord],
    stats: &mut RunStats,
    observer: &mut O,
) -> io::Result<LookupReport>
where
    R: BufRead,
    O: LookupObserver + ?Sized,
{
    let counts = BatchCounts::of(records);
    let mut remaining = counts.open;
    let mut newly_matched = 0usize;
    let mut line_number = 0u64;
    let mut line = Vec::with_capacity(64);

    while remaining > 0 {
        line.clear();
        if corpus.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_number += 1;

        for record in records.iter_mut().filter(|r| r.is_open()) {
            if contains(&line, record.digest.as_bytes()) {
                record.mark_pwned();
                newly_matched += 1;
                remaining -= 1;
                tracing::debug!(digest = %record.digest, line = line_number, remaining, "corpus match");
                observer.on_match(record, MatchSite::Line(line_number), remaining);
            }
        }

        if line_number % PROGRESS_EVERY == 0 {
            observer.on_progress(line_number);
        }
    }

    finish_pass(records, stats, &counts, newly_matched, line_number)
}

/// Same contract as [`scan_corpus`], with matching spread over `pool`.
///
/// The corpus is still read sequentially, [`CHUNK_LINES`] lines at a time.
/// Within a chunk each worker owns a disjoint set of records, so a match flag
/// is only ever written by one thread. Discoveries are reported in corpus order
/// once the chunk is done, and the scanned line count is the same one the
/// sequential scan would report.
pub fn scan_corpus_parallel<R, O>(
    mut corpus: R,
    records: &mut [HashRecord],
    stats: &mut RunStats,
    observer: &mut O,
    pool: &ThreadPool,
) -> io::Result<LookupReport>
where
    R: BufRead,
    O: LookupObserver + ?Sized,
{
    let counts = BatchCounts::of(records);
    let mut remaining = counts.open;
    let mut newly_matched = 0usize;
    let mut lines_read = 0u64;
    let mut lines_scanned = 0u64;
    let mut chunk: Vec<Vec<u8>> = Vec::with_capacity(CHUNK_LINES);

    while remaining > 0 {
        let filled = fill_chunk(&mut corpus, &mut chunk)?;
        if filled == 0 {
            break;
        }
        let first_line = lines_read + 1;
        let lines = &chunk[..filled];

        let mut hits: Vec<(u64, usize)> = pool.install(|| {
            records
                .par_iter_mut()
                .enumerate()
                .filter(|(_, record)| record.is_open())
                .filter_map(|(index, record)| {
                    let position =
                        lines.iter().position(|line| contains(line, record.digest.as_bytes()))?;
                    record.mark_pwned();
                    Some((first_line + position as u64, index))
                })
                .collect()
        });
        hits.sort_unstable();

        for &(line_number, index) in &hits {
            remaining -= 1;
            newly_matched += 1;
            let record = &records[index];
            tracing::debug!(digest = %record.digest, line = line_number, remaining, "corpus match");
            observer.on_match(record, MatchSite::Line(line_number), remaining);
        }

        lines_read += filled as u64;
        let chunk_end = match hits.last() {
            Some(&(last_hit, _)) if remaining == 0 => last_hit,
            _ => lines_read,
        };
        let mut mark = (lines_scanned / PROGRESS_EVERY + 1) * PROGRESS_EVERY;
        while mark <= chunk_end {
            observer.on_progress(mark);
            mark += PROGRESS_EVERY;
        }
        lines_scanned = chunk_end;
    }

    finish_pass(records, stats, &counts, newly_matched, lines_scanned)
}

// Reads up to CHUNK_LINES lines, reusing the line buffers already in `chunk`.
fn fill_chunk<R: BufRead>(corpus: &mut R, chunk: &mut Vec<Vec<u8>>) -> io::Result<usize> {
    let mut filled = 0;
    while filled < CHUNK_LINES {
        if filled == chunk.len() {
            chunk.push(Vec::with_capacity(64));
        }
        let line = &mut chunk[filled];
        line.clear();
        if corpus.read_until(b'\n', line)? == 0 {
            break;
        }
        filled += 1;
    }
    Ok(filled)
}

fn finish_pass(
    records: &mut [HashRecord],
    stats: &mut RunStats,
    counts: &BatchCounts,
    newly_matched: usize,
    lines_scanned: u64,
) -> io::Result<LookupReport> {
    for record in records.iter_mut().filter(|r| r.is_open()) {
        record.mark_safe();
    }

    let pwned = (counts.previously_matched + newly_matched) as u64;
    stats.record_batch(counts.considered, pwned, lines_scanned);
    tracing::debug!(lines_scanned, newly_matched, "corpus scan finished");

    Ok(LookupReport {
        newly_matched,
        previously_matched: counts.previously_matched,
        lines_scanned,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::observer::Silent;

    const A: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const B: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    const C: &str = "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";
    const D: &str = "DDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDD";

    fn corpus(lines: &[&str]) -> Cursor<Vec<u8>> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        Cursor::new(text.into_bytes())
    }

    fn records(digests: &[&str]) -> Vec<HashRecord> {
        digests
            .iter()
            .enumerate()
            .map(|(i, digest)| HashRecord::from_digest(digest, "targets.txt", i as u64 + 1))
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        matches: Vec<(String, MatchSite, usize)>,
        progress: Vec<u64>,
    }

    impl LookupObserver for Recorder {
        fn on_match(&mut self, record: &HashRecord, site: MatchSite, remaining: usize) {
            self.matches.push((record.digest.clone(), site, remaining));
        }

        fn on_progress(&mut self, scanned_lines: u64) {
            self.progress.push(scanned_lines);
        }
    }

    #[test]
    fn test_contains() {
        assert!(contains(b"AAAA:12\n", b"AAAA"));
        assert!(contains(b"xxAAAA", b"AAAA"));
        assert!(!contains(b"AAA", b"AAAA"));
        assert!(!contains(b"AAAA", b""));
    }

    #[test]
    fn test_unmatched_target_forces_full_pass() {
        // target 1 is on line 2, target 2 is absent: all 3 lines are read
        let corpus = corpus(&[&format!("{A}:5"), &format!("{B}:17"), &format!("{C}:1")]);
        let mut batch = records(&[B, D]);
        let mut stats = RunStats::new();
        let mut recorder = Recorder::default();

        let report = scan_corpus(corpus, &mut batch, &mut stats, &mut recorder).unwrap();

        assert_eq!(report.lines_scanned, 3);
        assert_eq!(report.newly_matched, 1);
        assert!(report.any_match());
        assert!(batch[0].is_pwned());
        assert_eq!(batch[1].verdict(), Verdict::Safe);
        assert_eq!(recorder.matches, vec![(B.to_string(), MatchSite::Line(2), 1)]);
        assert_eq!(stats.passwords_read, 2);
        assert_eq!(stats.pwned_found, 1);
        assert_eq!(stats.safe_found, 1);
        assert_eq!(stats.scanned_lines, 3);
    }

    #[test]
    fn test_stops_at_last_matched_line() {
        let corpus = corpus(&[A, B, C, D]);
        let mut batch = records(&[C, A]);
        let mut stats = RunStats::new();

        let report = scan_corpus(corpus, &mut batch, &mut stats, &mut Silent).unwrap();

        assert_eq!(report.lines_scanned, 3);
        assert_eq!(report.newly_matched, 2);
        assert!(batch.iter().all(HashRecord::is_pwned));
        assert_eq!(stats.safe_found, 0);
    }

    #[test]
    fn test_empty_batch_reads_nothing() {
        let mut batch: Vec<HashRecord> = Vec::new();
        let mut stats = RunStats::new();
        let report = scan_corpus(corpus(&[A, B]), &mut batch, &mut stats, &mut Silent).unwrap();

        assert_eq!(report, LookupReport::default());
        assert!(!report.any_match());
        assert_eq!(stats.scanned_lines, 0);
        assert_eq!(stats.passwords_read, 0);
    }

    #[test]
    fn test_rescan_of_pwned_batch_is_idempotent() {
        let mut batch: Vec<HashRecord> =
            records(&[A, B]).into_iter().map(|r| r.with_verdict(Verdict::Pwned)).collect();
        let before = batch.clone();
        let mut stats = RunStats::new();

        let report = scan_corpus(corpus(&[A, B]), &mut batch, &mut stats, &mut Silent).unwrap();

        assert_eq!(batch, before);
        assert_eq!(report.previously_matched, 2);
        assert_eq!(report.newly_matched, 0);
        assert_eq!(report.lines_scanned, 0);
        assert_eq!(stats.pwned_found, 2);
        assert_eq!(stats.safe_found, 0);
    }

    #[test]
    fn test_malformed_digest_scans_but_never_matches() {
        let mut batch = records(&["NOT-A-DIGEST", A]);
        let mut stats = RunStats::new();

        scan_corpus(corpus(&[B, A]), &mut batch, &mut stats, &mut Silent).unwrap();

        assert_eq!(batch[0].verdict(), Verdict::Safe);
        assert!(batch[1].is_pwned());
        assert_eq!(stats.safe_found, 1);
    }

    #[test]
    fn test_flagged_malformed_records_are_skipped() {
        let mut batch = records(&[A]);
        batch.push(HashRecord::from_digest("XYZ", "targets.txt", 2).with_verdict(Verdict::Malformed));
        let mut stats = RunStats::new();

        let report = scan_corpus(corpus(&[A]), &mut batch, &mut stats, &mut Silent).unwrap();

        assert_eq!(report.lines_scanned, 1);
        assert_eq!(batch[1].verdict(), Verdict::Malformed);
        assert_eq!(stats.passwords_read, 1);
    }

    #[test]
    fn test_non_utf8_lines_are_tolerated() {
        let mut bytes = vec![0xFF, 0xFE, b'\n'];
        bytes.extend_from_slice(format!("{A}:3\n").as_bytes());
        let mut batch = records(&[A]);
        let mut stats = RunStats::new();

        scan_corpus(Cursor::new(bytes), &mut batch, &mut stats, &mut Silent).unwrap();

        assert!(batch[0].is_pwned());
    }

    #[test]
    fn test_progress_cadence() {
        let mut text = "x\n".repeat(250_000);
        text.push_str(A);
        let mut batch = records(&[A]);
        let mut stats = RunStats::new();
        let mut recorder = Recorder::default();

        scan_corpus(Cursor::new(text.into_bytes()), &mut batch, &mut stats, &mut recorder).unwrap();

        assert_eq!(recorder.progress, vec![100_000, 200_000]);
        assert_eq!(recorder.matches, vec![(A.to_string(), MatchSite::Line(250_001), 0)]);
    }

    #[test]
    fn test_parallel_scan_agrees_with_sequential() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let mut lines: Vec<String> = (0..200_000).map(|i| format!("{i:040X}:1")).collect();
        lines.push(A.to_string());
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let targets = [format!("{:040X}", 70_000), format!("{:040X}", 150_123), A.to_string(), D.to_string()];
        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();

        let mut sequential = records(&target_refs);
        let mut sequential_stats = RunStats::new();
        let mut sequential_recorder = Recorder::default();
        let expected =
            scan_corpus(corpus(&refs), &mut sequential, &mut sequential_stats, &mut sequential_recorder)
                .unwrap();

        let mut parallel = records(&target_refs);
        let mut parallel_stats = RunStats::new();
        let mut parallel_recorder = Recorder::default();
        let report = scan_corpus_parallel(
            corpus(&refs),
            &mut parallel,
            &mut parallel_stats,
            &mut parallel_recorder,
            &pool,
        )
        .unwrap();

        assert_eq!(report, expected);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel_recorder.matches, sequential_recorder.matches);
        assert_eq!(parallel_recorder.progress, sequential_recorder.progress);
        assert_eq!(parallel_stats.scanned_lines, 200_001);
    }

    #[test]
    fn test_parallel_scan_early_exit_matches_sequential_count() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut batch = records(&[B, A]);
        let mut stats = RunStats::new();

        let report =
            scan_corpus_parallel(corpus(&[A, B, C, D]), &mut batch, &mut stats, &mut Silent, &pool)
                .unwrap();

        assert_eq!(report.lines_scanned, 2);
        assert_eq!(stats.scanned_lines, 2);
        assert!(batch.iter().all(HashRecord::is_pwned));
    }
}
