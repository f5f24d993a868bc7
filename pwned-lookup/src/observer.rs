use crate::record::HashRecord;
use crate::remote::RemoteVerdict;

/// Where a match was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSite {
    /// 1-based line number in a scanned corpus.
    Line(u64),
    /// Byte offset of the matching line in a sorted corpus.
    Offset(u64),
    /// Reported by the remote range API.
    RangeApi,
}

/// Receives live notifications while a backend works through a batch.
///
/// Every method has an empty default so implementors only pick what they
/// display.
pub trait LookupObserver {
    /// A record was found in the corpus. `remaining` counts records still unmatched.
    fn on_match(&mut self, _record: &HashRecord, _site: MatchSite, _remaining: usize) {}

    /// Corpus lines (or binary search probes) processed so far.
    fn on_progress(&mut self, _scanned_lines: u64) {}

    /// A remote range query finished for `record`.
    fn on_remote(&mut self, _record: &HashRecord, _verdict: &RemoteVerdict) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl LookupObserver for Silent {}

/// Outcome of one backend pass over a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupReport {
    /// Records that became pwned during this pass.
    pub newly_matched: usize,
    /// Records that were already pwned when the pass started.
    pub previously_matched: usize,
    /// Corpus lines read by a scan, or probes made by a binary search.
    pub lines_scanned: u64,
}

impl LookupReport {
    pub fn any_match(&self) -> bool {
        self.newly_matched + self.previously_matched > 0
    }
}
