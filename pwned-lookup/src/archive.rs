use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use rayon::ThreadPool;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};
use crate::observer::{LookupObserver, LookupReport};
use crate::record::HashRecord;
use crate::scanner::{scan_corpus, scan_corpus_parallel};
use crate::stats::RunStats;

/// A zip archive holding a plain text corpus as one of its members.
pub struct ArchiveCorpus {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl ArchiveCorpus {
    /// Opens the archive. A missing file and a file that is not a readable
    /// zip archive are reported as different errors.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ArchiveNotFound { path: path.to_path_buf() },
            _ => Error::Io(e),
        })?;
        let archive = ZipArchive::new(file)
            .map_err(|source| Error::ArchiveUnreadable { path: path.to_path_buf(), source })?;
        Ok(Self { archive, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scans `member` exactly like a plain unsorted corpus.
    ///
    /// Uses the parallel scan when `pool` is given.
    pub fn scan<O>(
        &mut self,
        member: &str,
        records: &mut [HashRecord],
        stats: &mut RunStats,
        observer: &mut O,
        pool: Option<&ThreadPool>,
    ) -> Result<LookupReport>
    where
        O: LookupObserver + ?Sized,
    {
        let entry = self.archive.by_name(member).map_err(|e| match e {
            ZipError::FileNotFound => {
                Error::MemberNotFound { member: member.to_string(), archive: self.path.clone() }
            }
            source => Error::MemberUnreadable { member: member.to_string(), source },
        })?;
        tracing::debug!(archive = %self.path.display(), member, size = entry.size(), "scanning archive member");

        let reader = BufReader::new(entry);
        let scanned = match pool {
            Some(pool) => scan_corpus_parallel(reader, records, stats, observer, pool),
            None => scan_corpus(reader, records, stats, observer),
        };
        scanned.map_err(|e| Error::MemberUnreadable {
            member: member.to_string(),
            source: ZipError::Io(e),
        })
    }
}
