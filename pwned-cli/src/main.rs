mod error;
mod progress;

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};
use pwned_lookup::{
    Coordinator, CorpusMode, HashRecord, InputFormat, LookupConfig, MalformedDigestPolicy, RecordWriter, RemoteConfig,
    RunStats, Verdict, extract_words, range_url_from_env, read_password_list,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::Error;
use crate::progress::Progress;

#[derive(Parser, Debug)]
#[command(name = "pwned")]
#[command(about = "Check passwords against the Pwned Passwords breach corpus, remotely or from a local copy")]
#[command(group(ArgGroup::new("input").required(true).args(["password", "password_file", "text_file"])))]
struct Args {
    /// Check a single password (or digest with --sha1-format)
    #[arg(short, long)]
    password: Option<String>,

    /// File with one password (or digest) per line
    #[arg(short = 'f', long)]
    password_file: Option<PathBuf>,

    /// Free text file; every word of 5 or more characters is checked
    #[arg(short, long, conflicts_with = "sha1_format")]
    text_file: Option<PathBuf>,

    /// Inputs are SHA1 hex digests instead of plaintext passwords
    #[arg(short, long)]
    sha1_format: bool,

    /// Local corpus file, or the member name inside the archive given with --zipped
    #[arg(short, long)]
    local_db: Option<PathBuf>,

    /// Zip archive holding the corpus
    #[arg(short, long)]
    zipped: Option<PathBuf>,

    /// The local corpus is sorted by digest; use binary search
    #[arg(short, long)]
    binary_search: bool,

    /// Seconds to wait between range API requests
    #[arg(short, long, default_value_t = 0.0)]
    wait: f64,

    /// Write every checked record to this file (truncated first)
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Worker threads for scanning unsorted corpora
    #[arg(short = 'j', long, default_value = "1")]
    workers: usize,

    /// Range API endpoint (default: $PWNED_RANGE_URL or the public API)
    #[arg(long)]
    base_url: Option<String>,

    /// Do not validate the range API's TLS certificate
    #[arg(long)]
    insecure: bool,

    /// What to do with supplied digests that are not 40 hex characters
    #[arg(long, value_enum, default_value_t = MalformedArg::Flag)]
    malformed: MalformedArg,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    debug: bool,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MalformedArg {
    Flag,
    Rehash,
    Reject,
}

impl From<MalformedArg> for MalformedDigestPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Flag => MalformedDigestPolicy::Flag,
            MalformedArg::Rehash => MalformedDigestPolicy::Rehash,
            MalformedArg::Reject => MalformedDigestPolicy::Reject,
        }
    }
}

impl Args {
    fn input_format(&self) -> InputFormat {
        if self.sha1_format { InputFormat::Sha1 } else { InputFormat::Plain }
    }

    fn lookup_config(&self) -> Result<LookupConfig, Error> {
        let delay = Duration::try_from_secs_f64(self.wait).map_err(|_| Error::InvalidWait(self.wait))?;
        let remote = RemoteConfig {
            base_url: self.base_url.clone().unwrap_or_else(range_url_from_env),
            verify_tls: !self.insecure,
            delay,
        };
        let mode = CorpusMode::from_flags(self.local_db.clone(), self.zipped.clone(), self.binary_search, remote)?;

        let mut config = LookupConfig::new(mode);
        config.malformed = self.malformed.into();
        config.workers = self.workers.max(1);
        Ok(config)
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<(), Error> {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| Error::LogFile { path: path.to_path_buf(), source })?;
            registry.with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))).init();
        }
        None => registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)).init(),
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), Error> {
    if args.password.as_deref().is_some_and(|p| p.trim().is_empty()) {
        return Err(Error::BlankPassword);
    }
    let config = args.lookup_config()?;
    let format = args.input_format();

    let coordinator = Coordinator::new(config)?;

    let mut writer = match &args.output_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| Error::OutputFile { path: path.clone(), source })?;
            Some(RecordWriter::new(BufWriter::new(file)))
        }
        None => None,
    };

    let batch = match (&args.password_file, &args.text_file) {
        (Some(path), _) => Some(read_password_list(path, format)?),
        (None, Some(path)) => Some(extract_words(path)?),
        (None, None) => None,
    };
    let count = batch.as_ref().map_or(1, Vec::len);

    let mode = &coordinator.config().mode;
    tracing::info!(mode = mode.name(), records = count, "checking passwords");
    if !args.json {
        println!("Checking {} password(s) using the {}", count, mode.name());
    }

    let mut stats = RunStats::new();
    let mut progress = Progress::new(mode, count as u64, !args.no_progress, !args.json);
    let result = match (batch, &args.password) {
        (Some(mut records), _) => {
            coordinator.check_batch(&mut records, &mut stats, &mut progress, writer.as_mut()).map(|_| records)
        }
        (None, Some(password)) => coordinator
            .check_single(password, format, &mut stats, &mut progress, writer.as_mut())
            .map(|record| vec![record]),
        (None, None) => Ok(Vec::new()),
    };
    progress.finish();
    let records = result?;
    stats.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats.summary())?);
        return Ok(());
    }

    if args.password.is_some() {
        for record in &records {
            print_single(record);
        }
    }
    println!("{}", stats.summary());
    Ok(())
}

fn print_single(record: &HashRecord) {
    let shown = record.plain_text.as_deref().unwrap_or(&record.digest);
    match record.verdict() {
        Verdict::Pwned => println!("{shown} has been pwned, do not use it"),
        Verdict::Safe => println!("{shown} was not found in the corpus"),
        Verdict::Malformed => println!("{shown} is not a valid SHA1 digest, nothing was checked"),
        Verdict::Unknown | Verdict::Unchecked => println!("{shown} could not be checked"),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.debug, args.log_file.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::from(e.exit_code());
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "lookup failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
