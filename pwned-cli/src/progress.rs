use indicatif::{ProgressBar, ProgressStyle};
use pwned_lookup::stats::group;
use pwned_lookup::{CorpusMode, HashRecord, LookupObserver, MatchSite, RemoteVerdict};

/// Console feedback for a running lookup: a bar for range queries, a spinner
/// for local corpora, and one line per match.
pub struct Progress {
    bar: Option<ProgressBar>,
    announce_matches: bool,
    unit: &'static str,
}

impl Progress {
    pub fn new(mode: &CorpusMode, records: u64, show_bar: bool, announce_matches: bool) -> Self {
        let bar = show_bar.then(|| match mode {
            CorpusMode::Remote(_) => {
                let pb = ProgressBar::new(records);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            _ => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        });
        let unit = match mode {
            CorpusMode::LocalSorted { .. } => "probes",
            _ => "lines read",
        };
        Self { bar, announce_matches, unit }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }
}

impl LookupObserver for Progress {
    fn on_match(&mut self, record: &HashRecord, site: MatchSite, remaining: usize) {
        if !self.announce_matches {
            return;
        }
        let shown = record.plain_text.as_deref().unwrap_or(&record.digest);
        let location = match site {
            MatchSite::Line(line) => format!("corpus line {}", group(line)),
            MatchSite::Offset(offset) => format!("corpus offset {}", group(offset)),
            MatchSite::RangeApi => "range API".to_string(),
        };
        self.println(format!(
            "PWNED: {} ({}:{}) found at {}, {} left",
            shown, record.source_label, record.source_line, location, remaining
        ));
    }

    fn on_progress(&mut self, scanned_lines: u64) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{} {}", group(scanned_lines), self.unit));
            pb.tick();
        }
    }

    fn on_remote(&mut self, _record: &HashRecord, verdict: &RemoteVerdict) {
        if let Some(pb) = &self.bar {
            pb.inc(1);
            if verdict.is_invalid() {
                pb.set_message(verdict.to_string());
            }
        }
    }
}
