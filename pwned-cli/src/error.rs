use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lookup(#[from] pwned_lookup::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid --wait value {0}: expected a non-negative number of seconds")]
    InvalidWait(f64),

    #[error("--password must not be blank")]
    BlankPassword,

    #[error("Cannot create output file '{path}': {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open log file '{path}': {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 1 for bad arguments or configuration, 2 for everything that failed at run time.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Lookup(e) if e.is_configuration() => 1,
            Error::InvalidWait(_) | Error::BlankPassword | Error::OutputFile { .. } | Error::LogFile { .. } => 1,
            _ => 2,
        }
    }
}
