use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Counters for a single lookup run.
///
/// One value is created per invocation and handed by `&mut` to every backend.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub passwords_read: u64,
    pub pwned_found: u64,
    pub safe_found: u64,
    pub invalid: u64,
    pub scanned_lines: u64,
    started: Instant,
    elapsed: Option<Duration>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            passwords_read: 0,
            pwned_found: 0,
            safe_found: 0,
            invalid: 0,
            scanned_lines: 0,
            started: Instant::now(),
            elapsed: None,
        }
    }

    /// Folds in the outcome of a completed local batch. Safe is derived as
    /// `read - pwned` rather than counted line by line.
    pub(crate) fn record_batch(&mut self, read: u64, pwned: u64, scanned_lines: u64) {
        self.passwords_read += read;
        self.pwned_found += pwned;
        self.safe_found += read.saturating_sub(pwned);
        self.scanned_lines += scanned_lines;
    }

    /// Stops the clock. Later calls keep the first measurement.
    pub fn finish(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.started.elapsed())
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            passwords_read: self.passwords_read,
            pwned_found: self.pwned_found,
            safe_found: self.safe_found,
            invalid: self.invalid,
            scanned_lines: self.scanned_lines,
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }
}

/// Point-in-time copy of [`RunStats`] suitable for rendering or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub passwords_read: u64,
    pub pwned_found: u64,
    pub safe_found: u64,
    pub invalid: u64,
    pub scanned_lines: u64,
    pub elapsed_secs: f64,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(63);
        writeln!(f, "{rule}")?;
        writeln!(f, "Total number of passwords/hash read.......: {}", group(self.passwords_read))?;
        writeln!(f, "Total number of passwords/hash pwned......: {}", group(self.pwned_found))?;
        writeln!(f, "Total number of passwords/hash safe.......: {}", group(self.safe_found))?;
        writeln!(f, "Total number of passwords/hash invalid....: {}", group(self.invalid))?;
        writeln!(f, "Total number of lines scanned in local db : {}", group(self.scanned_lines))?;
        writeln!(f, "Total elapsed time (sec)..................: {:.4}", self.elapsed_secs)?;
        write!(f, "{rule}")
    }
}

/// Formats with thousands separators: 1234567 -> "1,234,567".
pub fn group(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
