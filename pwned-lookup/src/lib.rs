//! Breached password lookup against the Pwned Passwords corpus.
//!
//! A password (or its SHA1 digest) is considered compromised when its
//! upper-case hex digest appears in the corpus. The corpus can be consulted
//! four ways, selected once through [`CorpusMode`]:
//!
//! - the remote range API, sending only the first 5 hex characters,
//! - a local unsorted text file, scanned once per batch,
//! - a local sorted text file, binary searched per record,
//! - a member of a local zip archive, scanned like an unsorted file.
//!
//! [`Coordinator`] drives a batch of [`HashRecord`]s through the selected
//! backend, fills in [`RunStats`] and optionally writes every record to a
//! result file through [`RecordWriter`].

pub mod archive;
pub mod coordinator;
pub mod digest;
pub mod error;
pub mod input;
pub mod observer;
pub mod output;
pub mod record;
pub mod remote;
pub mod scanner;
pub mod sorted;
pub mod stats;

pub use coordinator::{Coordinator, CorpusMode, LookupConfig, MalformedDigestPolicy};
pub use digest::{DIGEST_LEN, PREFIX_LEN, is_sha1_hex, sha1_hex};
pub use error::{Error, Result};
pub use input::{InputFormat, extract_words, read_password_list};
pub use observer::{LookupObserver, LookupReport, MatchSite, Silent};
pub use output::{RecordWriter, parse_record};
pub use record::{CLI_SOURCE, HashRecord, Verdict};
pub use remote::{RangeClient, RangeTransport, RemoteConfig, RemoteVerdict, range_url_from_env};
pub use stats::{RunStats, StatsSummary};
