use serde::{Deserialize, Serialize};

use crate::digest::{is_sha1_hex, sha1_hex};

/// Source label used for passwords given directly on the command line.
pub const CLI_SOURCE: &str = "cli";

/// Lookup state of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verdict {
    /// Not looked up yet.
    #[default]
    Unchecked,
    /// Looked up and not present in the corpus.
    Safe,
    /// Present in the corpus.
    Pwned,
    /// The remote service did not give a usable answer.
    Unknown,
    /// The digest is not 40 hex characters and was kept out of the lookup.
    Malformed,
}

/// One password/digest pair together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub plain_text: Option<String>,
    pub digest: String,
    pub source_label: String,
    pub source_line: u64,
    verdict: Verdict,
}

impl HashRecord {
    /// Builds a record by hashing `password`.
    pub fn from_password(password: &str, source_label: &str, source_line: u64) -> Self {
        Self {
            plain_text: Some(password.trim().to_string()),
            digest: sha1_hex(password),
            source_label: source_label.to_string(),
            source_line,
            verdict: Verdict::Unchecked,
        }
    }

    /// Builds a record from an externally supplied digest.
    ///
    /// Valid digests are upper-cased; anything else is kept as given so it can
    /// still be reported or rehashed. See [`HashRecord::has_valid_digest`].
    pub fn from_digest(digest: &str, source_label: &str, source_line: u64) -> Self {
        let digest = digest.trim();
        let digest =
            if is_sha1_hex(digest) { digest.to_ascii_uppercase() } else { digest.to_string() };
        Self {
            plain_text: None,
            digest,
            source_label: source_label.to_string(),
            source_line,
            verdict: Verdict::Unchecked,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_pwned(&self) -> bool {
        self.verdict == Verdict::Pwned
    }

    pub fn has_valid_digest(&self) -> bool {
        is_sha1_hex(&self.digest)
    }

    /// True while a backend still has to decide this record.
    pub(crate) fn is_open(&self) -> bool {
        !matches!(self.verdict, Verdict::Pwned | Verdict::Malformed)
    }

    pub fn mark_pwned(&mut self) {
        self.verdict = Verdict::Pwned;
    }

    pub fn mark_safe(&mut self) {
        self.settle(Verdict::Safe);
    }

    pub fn mark_unknown(&mut self) {
        self.settle(Verdict::Unknown);
    }

    pub fn mark_malformed(&mut self) {
        self.settle(Verdict::Malformed);
    }

    /// Replaces a malformed digest by hashing the text it was given as.
    pub fn rehash_as_password(&mut self) {
        let text = self.plain_text.take().unwrap_or_else(|| self.digest.clone());
        self.digest = sha1_hex(&text);
        self.plain_text = Some(text);
        if self.verdict == Verdict::Malformed {
            self.verdict = Verdict::Unchecked;
        }
    }

    // Pwned is final for the rest of the run.
    fn settle(&mut self, verdict: Verdict) {
        if self.verdict != Verdict::Pwned {
            self.verdict = verdict;
        }
    }

    #[cfg(test)]
    pub(crate) fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }
}
