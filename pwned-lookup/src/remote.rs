//! k-anonymity client for a Pwned Passwords style range API.
//!
//! Only the first 5 hex characters of a digest ever leave the process. The
//! service answers with every `SUFFIX:COUNT` sharing that prefix and the
//! remaining 35 characters are compared locally.

use std::fmt;
use std::time::Duration;

use crate::digest::split_prefix;
use crate::error::{Error, Result};
use crate::record::HashRecord;
use crate::stats::RunStats;

/// Default range endpoint; the prefix is appended as a path segment.
pub const DEFAULT_RANGE_URL: &str = "https://api.pwnedpasswords.com/range";

/// Environment variable overriding the range endpoint.
pub const RANGE_URL_ENV: &str = "PWNED_RANGE_URL";

/// Fixed timeout for a single range request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the range endpoint from the PWNED_RANGE_URL environment variable,
/// or falls back to the public API.
pub fn range_url_from_env() -> String {
    std::env::var(RANGE_URL_ENV).unwrap_or_else(|_| DEFAULT_RANGE_URL.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Validate the server's TLS certificate.
    pub verify_tls: bool,
    /// Pause between consecutive requests of a batch.
    pub delay: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_RANGE_URL.to_string(), verify_tls: true, delay: Duration::ZERO }
    }
}

/// Raw answer of a range request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("HTTP request failed for prefix {prefix}: {source}")]
pub struct TransportError {
    pub prefix: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Fetches the range for one 5 character prefix.
pub trait RangeTransport {
    fn fetch_range(&self, prefix: &str) -> std::result::Result<RangeResponse, TransportError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if !config.verify_tls {
            tracing::warn!("TLS certificate validation is disabled for range requests");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

impl RangeTransport for HttpTransport {
    fn fetch_range(&self, prefix: &str) -> std::result::Result<RangeResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, prefix);
        let wrap = |e: reqwest::Error| TransportError { prefix: prefix.to_string(), source: Box::new(e) };

        let response = self.client.get(&url).send().map_err(wrap)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(wrap)?;
        Ok(RangeResponse { status, body })
    }
}

/// Interpretation of one range query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteVerdict {
    Pwned,
    Safe,
    /// 404 from the service.
    NotFound,
    /// 429, no retry is attempted.
    RateLimited,
    /// 400, the service rejected the prefix.
    BadPrefix,
    /// Any other status.
    UnexpectedStatus(u16),
    /// The request did not complete (timeout, connection failure).
    Unavailable(String),
    /// The digest has no usable prefix/suffix split; nothing was sent.
    InvalidDigest,
}

impl RemoteVerdict {
    /// Anomalies that count towards the invalid counter.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            RemoteVerdict::NotFound
                | RemoteVerdict::RateLimited
                | RemoteVerdict::BadPrefix
                | RemoteVerdict::Unavailable(_)
                | RemoteVerdict::InvalidDigest
        )
    }
}

impl fmt::Display for RemoteVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteVerdict::Pwned => f.write_str("pwned"),
            RemoteVerdict::Safe => f.write_str("safe"),
            RemoteVerdict::NotFound => f.write_str("404 - page not found"),
            RemoteVerdict::RateLimited => f.write_str("429 - rate limit exceeded, no retry"),
            RemoteVerdict::BadPrefix => f.write_str("400 - the hash prefix was not valid hexadecimal"),
            RemoteVerdict::UnexpectedStatus(status) => write!(f, "unexpected status {status}"),
            RemoteVerdict::Unavailable(reason) => write!(f, "request failed: {reason}"),
            RemoteVerdict::InvalidDigest => f.write_str("digest cannot be split into prefix and suffix"),
        }
    }
}

/// Stateless range API client. Throttling between calls is up to the caller.
pub struct RangeClient<T = HttpTransport> {
    transport: T,
}

impl RangeClient<HttpTransport> {
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(config)?))
    }
}

impl<T: RangeTransport> RangeClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Queries the range for `digest` and decides membership.
    pub fn check(&self, digest: &str) -> RemoteVerdict {
        let Some((prefix, suffix)) = split_prefix(digest) else {
            return RemoteVerdict::InvalidDigest;
        };
        if suffix.is_empty() {
            return RemoteVerdict::InvalidDigest;
        }
        let prefix = prefix.to_ascii_uppercase();
        let suffix = suffix.to_ascii_uppercase();

        let response = match self.transport.fetch_range(&prefix) {
            Ok(response) => response,
            Err(e) => return RemoteVerdict::Unavailable(e.to_string()),
        };

        match response.status {
            200 if response.body.contains(suffix.as_str()) => RemoteVerdict::Pwned,
            200 => RemoteVerdict::Safe,
            404 => RemoteVerdict::NotFound,
            429 => RemoteVerdict::RateLimited,
            400 => RemoteVerdict::BadPrefix,
            status => RemoteVerdict::UnexpectedStatus(status),
        }
    }

    /// Checks one record, applies the verdict to it and counts it in `stats`.
    ///
    /// Anything but a 200 leaves the record unknown, never safe. An already
    /// pwned record is counted without sending a request.
    pub fn check_record(&self, record: &mut HashRecord, stats: &mut RunStats) -> Option<RemoteVerdict> {
        stats.passwords_read += 1;
        if record.is_pwned() {
            stats.pwned_found += 1;
            return None;
        }

        let verdict = self.check(&record.digest);
        match &verdict {
            RemoteVerdict::Pwned => {
                record.mark_pwned();
                stats.pwned_found += 1;
                tracing::info!(digest = %record.digest, "password found by range query");
            }
            RemoteVerdict::Safe => {
                record.mark_safe();
                stats.safe_found += 1;
            }
            other => {
                record.mark_unknown();
                if other.is_invalid() {
                    stats.invalid += 1;
                }
                tracing::warn!(digest = %record.digest, verdict = %other, "range query gave no answer");
            }
        }
        Some(verdict)
    }
}
