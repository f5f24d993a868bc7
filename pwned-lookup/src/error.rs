use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a local corpus file is required for {mode} lookups (use -l)")]
    MissingCorpusPath { mode: &'static str },

    #[error("archive mode needs the name of the corpus member inside '{archive}'")]
    MissingArchiveMember { archive: PathBuf },

    #[error("conflicting corpus modes: {0}")]
    ConflictingModes(&'static str),

    #[error("'{digest}' is not a 40 character hexadecimal SHA1 digest")]
    MalformedDigest { digest: String },

    #[error("corpus file '{path}' not found")]
    CorpusNotFound { path: PathBuf },

    #[error("archive '{path}' not found")]
    ArchiveNotFound { path: PathBuf },

    #[error("archive '{path}' could not be read: {source}")]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("'{member}' not found inside '{archive}'")]
    MemberNotFound { member: String, archive: PathBuf },

    #[error("'{member}' inside the archive could not be read: {source}")]
    MemberUnreadable {
        member: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to start scan workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("malformed output record: {line}")]
    MalformedRecord { line: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Configuration errors are detected before any corpus or network I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingCorpusPath { .. }
                | Error::MissingArchiveMember { .. }
                | Error::ConflictingModes(_)
                | Error::MalformedDigest { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
