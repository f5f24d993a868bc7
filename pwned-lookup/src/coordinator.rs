use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::ThreadPool;

use crate::archive::ArchiveCorpus;
use crate::error::{Error, Result};
use crate::input::{InputFormat, record_from_input};
use crate::observer::{LookupObserver, LookupReport, MatchSite};
use crate::output::RecordWriter;
use crate::record::{CLI_SOURCE, HashRecord};
use crate::remote::{HttpTransport, RangeClient, RangeTransport, RemoteConfig, RemoteVerdict};
use crate::scanner::{scan_corpus, scan_corpus_parallel};
use crate::sorted::{SortedCorpus, search_batch};
use crate::stats::RunStats;

/// Where membership is decided. Built once, validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusMode {
    Remote(RemoteConfig),
    LocalUnsorted { corpus: PathBuf },
    LocalSorted { corpus: PathBuf },
    LocalArchive { archive: PathBuf, member: String },
}

impl CorpusMode {
    /// Builds the mode from the command line style flags.
    ///
    /// With `zipped`, `local_db` names the member inside the archive. No
    /// filesystem access happens here; contradictory or incomplete combinations
    /// are rejected instead of one flag silently winning.
    pub fn from_flags(
        local_db: Option<PathBuf>,
        zipped: Option<PathBuf>,
        sorted: bool,
        remote: RemoteConfig,
    ) -> Result<Self> {
        let local_db = local_db.filter(|p| !p.as_os_str().is_empty());
        let zipped = zipped.filter(|p| !p.as_os_str().is_empty());

        match (local_db, zipped, sorted) {
            (_, Some(_), true) => {
                Err(Error::ConflictingModes("binary search cannot be used on a zipped corpus"))
            }
            (Some(member), Some(archive), false) => {
                Ok(CorpusMode::LocalArchive { archive, member: member.to_string_lossy().into_owned() })
            }
            (None, Some(archive), false) => Err(Error::MissingArchiveMember { archive }),
            (Some(corpus), None, true) => Ok(CorpusMode::LocalSorted { corpus }),
            (None, None, true) => Err(Error::MissingCorpusPath { mode: "binary search" }),
            (Some(corpus), None, false) => Ok(CorpusMode::LocalUnsorted { corpus }),
            (None, None, false) => Ok(CorpusMode::Remote(remote)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CorpusMode::Remote(_) => "remote range API",
            CorpusMode::LocalUnsorted { .. } => "local corpus scan",
            CorpusMode::LocalSorted { .. } => "local sorted corpus",
            CorpusMode::LocalArchive { .. } => "zipped local corpus",
        }
    }
}

/// What to do with a supplied digest that is not 40 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedDigestPolicy {
    /// Keep the record, mark it malformed, count it invalid, skip the lookup.
    #[default]
    Flag,
    /// Treat the text as a plaintext password and hash it.
    Rehash,
    /// Fail the whole lookup before any I/O.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    pub mode: CorpusMode,
    pub malformed: MalformedDigestPolicy,
    /// Scan workers for unsorted corpora. 0 or 1 scans on the calling thread.
    pub workers: usize,
}

impl LookupConfig {
    pub fn new(mode: CorpusMode) -> Self {
        Self { mode, malformed: MalformedDigestPolicy::default(), workers: 1 }
    }
}

/// Drives the configured backend over single inputs or batches.
pub struct Coordinator<T = HttpTransport> {
    config: LookupConfig,
    remote: Option<RangeClient<T>>,
    pool: Option<ThreadPool>,
}

impl Coordinator<HttpTransport> {
    pub fn new(config: LookupConfig) -> Result<Self> {
        let remote = match &config.mode {
            CorpusMode::Remote(remote) => Some(RangeClient::connect(remote)?),
            _ => None,
        };
        Self::build(config, remote)
    }
}

impl<T: RangeTransport> Coordinator<T> {
    /// Uses `transport` for range requests instead of HTTP.
    pub fn with_transport(config: LookupConfig, transport: T) -> Result<Self> {
        let remote = matches!(config.mode, CorpusMode::Remote(_)).then(|| RangeClient::new(transport));
        Self::build(config, remote)
    }

    fn build(config: LookupConfig, remote: Option<RangeClient<T>>) -> Result<Self> {
        let scans = matches!(config.mode, CorpusMode::LocalUnsorted { .. } | CorpusMode::LocalArchive { .. });
        let pool = if scans && config.workers > 1 {
            Some(rayon::ThreadPoolBuilder::new().num_threads(config.workers).build()?)
        } else {
            None
        };
        Ok(Self { config, remote, pool })
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Checks one ad-hoc password or digest given on the command line.
    pub fn check_single<W, O>(
        &self,
        input: &str,
        format: InputFormat,
        stats: &mut RunStats,
        observer: &mut O,
        sink: Option<&mut RecordWriter<W>>,
    ) -> Result<HashRecord>
    where
        W: Write,
        O: LookupObserver + ?Sized,
    {
        let mut record = record_from_input(input, format, CLI_SOURCE, 0);
        self.check_batch(std::slice::from_mut(&mut record), stats, observer, sink)?;
        Ok(record)
    }

    /// Looks up every record of the batch and writes all of them to `sink`.
    ///
    /// Remote lookups write each record as soon as it is decided; local
    /// lookups write the whole batch once the corpus pass is complete.
    pub fn check_batch<W, O>(
        &self,
        records: &mut [HashRecord],
        stats: &mut RunStats,
        observer: &mut O,
        mut sink: Option<&mut RecordWriter<W>>,
    ) -> Result<LookupReport>
    where
        W: Write,
        O: LookupObserver + ?Sized,
    {
        self.classify(records, stats)?;
        tracing::debug!(mode = self.config.mode.name(), records = records.len(), "starting lookup");

        let report = match &self.config.mode {
            CorpusMode::Remote(remote) => {
                return self.check_remote(records, stats, observer, remote.delay, sink);
            }
            CorpusMode::LocalUnsorted { corpus } => {
                let reader = BufReader::new(open_corpus(corpus)?);
                match &self.pool {
                    Some(pool) => scan_corpus_parallel(reader, records, stats, observer, pool)?,
                    None => scan_corpus(reader, records, stats, observer)?,
                }
            }
            CorpusMode::LocalSorted { corpus } => {
                let mut corpus = SortedCorpus::open(corpus)?;
                search_batch(&mut corpus, records, stats, observer)?
            }
            CorpusMode::LocalArchive { archive, member } => {
                let mut archive = ArchiveCorpus::open(archive)?;
                archive.scan(member, records, stats, observer, self.pool.as_ref())?
            }
        };

        if let Some(sink) = sink.as_deref_mut() {
            sink.write_all_records(records)?;
        }
        Ok(report)
    }

    // Applies the malformed digest policy. Runs before any corpus or network I/O.
    fn classify(&self, records: &mut [HashRecord], stats: &mut RunStats) -> Result<()> {
        let policy = self.config.malformed;
        if policy == MalformedDigestPolicy::Reject {
            if let Some(bad) = records.iter().find(|r| !r.has_valid_digest()) {
                return Err(Error::MalformedDigest { digest: bad.digest.clone() });
            }
            return Ok(());
        }

        for record in records.iter_mut().filter(|r| !r.has_valid_digest() && r.is_open()) {
            match policy {
                MalformedDigestPolicy::Rehash => {
                    tracing::warn!(input = %record.digest, "not a SHA1 digest, hashing it as a plaintext password");
                    record.rehash_as_password();
                }
                _ => {
                    tracing::warn!(input = %record.digest, line = record.source_line, "not a SHA1 digest, skipping");
                    record.mark_malformed();
                    stats.invalid += 1;
                    stats.passwords_read += 1;
                }
            }
        }
        Ok(())
    }

    fn check_remote<W, O>(
        &self,
        records: &mut [HashRecord],
        stats: &mut RunStats,
        observer: &mut O,
        delay: Duration,
        mut sink: Option<&mut RecordWriter<W>>,
    ) -> Result<LookupReport>
    where
        W: Write,
        O: LookupObserver + ?Sized,
    {
        let Some(client) = &self.remote else {
            return Err(Error::Io(io::Error::other("range client not configured")));
        };

        let mut report = LookupReport::default();
        let mut remaining = records.iter().filter(|r| r.is_open()).count();
        let mut requested = false;

        for record in records.iter_mut() {
            if record.is_open() {
                if requested && !delay.is_zero() {
                    tracing::debug!(?delay, "throttling range requests");
                    std::thread::sleep(delay);
                }
                requested = true;
                remaining -= 1;

                if let Some(verdict) = client.check_record(record, stats) {
                    if verdict == RemoteVerdict::Pwned {
                        report.newly_matched += 1;
                        observer.on_match(record, MatchSite::RangeApi, remaining);
                    }
                    observer.on_remote(record, &verdict);
                }
            } else if record.is_pwned() {
                stats.passwords_read += 1;
                stats.pwned_found += 1;
                report.previously_matched += 1;
            }

            if let Some(sink) = sink.as_deref_mut() {
                sink.write_record(record)?;
            }
        }

        if let Some(sink) = sink.as_deref_mut() {
            sink.flush()?;
        }
        Ok(report)
    }
}

fn open_corpus(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::CorpusNotFound { path: path.to_path_buf() },
        _ => Error::Io(e),
    })
}

#[cfg(feature = "tokio")]
mod nonblocking {
    use std::sync::Arc;

    use super::*;
    use crate::observer::Silent;

    impl<T> Coordinator<T>
    where
        T: RangeTransport + Send + Sync + 'static,
    {
        /// Runs [`Coordinator::check_batch`] on tokio's blocking pool.
        ///
        /// Takes and returns ownership of the batch and the stats since the
        /// work outlives the caller's borrow.
        pub async fn check_batch_async(
            self: Arc<Self>,
            mut records: Vec<HashRecord>,
            mut stats: RunStats,
        ) -> Result<(Vec<HashRecord>, RunStats, LookupReport)> {
            tokio::task::spawn_blocking(move || {
                let report =
                    self.check_batch(&mut records, &mut stats, &mut Silent, None::<&mut RecordWriter<io::Sink>>)?;
                Ok((records, stats, report))
            })
            .await
            .map_err(|e| Error::Io(io::Error::other(format!("Task panicked: {}", e))))?
        }
    }

}
