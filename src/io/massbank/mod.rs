//! Message types and client traits for the MassBank remote search service.
//!
//! The service is consumed through three traits. [`RecordInfoSource`] fetches the
//! detail text of records, [`BatchSearchClient`] runs many spectrum queries as one
//! polled job, and [`SpectrumSearchClient`] searches one spectrum synchronously.
//! [`MemoryClient`] implements all of them from canned responses, and with the
//! `http` feature `MassBankHttpClient` implements them against the real service.
use std::error::Error as StdError;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::{MassBankHttpClient, DEFAULT_ENDPOINT};
pub use memory::{CallLog, MemoryClient, Operation};

/// The job type requested for spectrum similarity batch jobs
pub const SEARCH_SPECTRUM_JOB: &str = "searchSpectrum";

/// The underlying cause of a transport or decoding failure, shared so the error
/// stays cheap to clone
pub type ErrorSource = Arc<dyn StdError + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum MassBankError {
    #[error("Request for {operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<ErrorSource>,
    },
    #[error("{operation} returned HTTP status {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("Malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
        #[source]
        source: Option<ErrorSource>,
    },
    #[error("Job {job_id} reported an unrecognized status {status:?}")]
    UnknownStatus { job_id: String, status: String },
    #[error("Job {job_id} did not complete within {elapsed:?}")]
    Timeout { job_id: String, elapsed: Duration },
    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

impl MassBankError {
    /// A failure to reach the service, keeping `source` as the cause
    pub fn transport<E: StdError + Send + Sync + 'static>(operation: &'static str, source: E) -> Self {
        Self::Transport {
            operation,
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// A response that could not be decoded, keeping `source` as the cause
    pub fn malformed<E: StdError + Send + Sync + 'static>(operation: &'static str, source: E) -> Self {
        Self::Malformed {
            operation,
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// The name of the service operation that failed, if the failure came from one
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Malformed { operation, .. } => Some(*operation),
            Self::UnknownStatus { .. } | Self::Timeout { .. } | Self::Cancelled { .. } => None,
        }
    }
}

/// One candidate record returned for a query. Numeric fields arrive as text.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RawHit {
    pub id: String,
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub formula: Option<String>,
    pub exact_mass: String,
    pub score: String,
}

impl RawHit {
    pub fn new<S: Into<String>>(id: S, title: S, exact_mass: S, score: S) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            formula: None,
            exact_mass: exact_mass.into(),
            score: score.into(),
        }
    }
}

/// The hits of one query in a batch, tagged with the query's name
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ResultSet {
    pub query_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub results: Option<Vec<RawHit>>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(query_name: S, results: Vec<RawHit>) -> Self {
        Self {
            query_name: query_name.into(),
            results: Some(results),
        }
    }
}

/// The full text of one MassBank record
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordInfo {
    pub id: String,
    pub info: String,
}

impl RecordInfo {
    pub fn new<S: Into<String>, T: Into<String>>(id: S, info: T) -> Self {
        Self {
            id: id.into(),
            info: info.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BatchJob {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub job_type: String,
    pub mail_address: String,
    pub query_strings: Vec<String>,
    pub instrument_types: Vec<String>,
    pub ion_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SpectrumSearchRequest {
    pub mzs: Vec<f64>,
    pub intensities: Vec<f64>,
    pub cutoff: f64,
    pub instrument_types: Vec<String>,
    pub ion_mode: String,
    pub tolerance: f64,
    pub unit: String,
    #[cfg_attr(feature = "serde", serde(rename = "maxNumResults"))]
    pub max_results: usize,
}

/// The state of a submitted batch job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Waiting,
    Running,
    Completed,
    Other(String),
}

impl JobStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        match value.trim() {
            "Waiting" => Self::Waiting,
            "Running" => Self::Running,
            "Completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => f.write_str("Waiting"),
            Self::Running => f.write_str("Running"),
            Self::Completed => f.write_str("Completed"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

pub trait RecordInfoSource {
    /// Fetch the detail text of each record in `ids` in one request
    fn record_info(&self, ids: &[String]) -> Result<Vec<RecordInfo>, MassBankError>;
}

/// Runs many spectrum queries as a single job that is polled until it completes
pub trait BatchSearchClient: RecordInfoSource {
    /// Submit a job, returning its id
    fn submit_batch(&self, job: &BatchJob) -> Result<String, MassBankError>;

    fn job_status(&self, job_id: &str) -> Result<JobStatus, MassBankError>;

    /// Fetch the result sets of a completed job
    fn job_result(&self, job_id: &str) -> Result<Vec<ResultSet>, MassBankError>;
}

/// Searches one spectrum at a time, answering synchronously
pub trait SpectrumSearchClient: RecordInfoSource {
    fn search_spectrum(&self, request: &SpectrumSearchRequest) -> Result<Vec<RawHit>, MassBankError>;

    /// The instrument types the service accepts as filters
    fn instrument_types(&self) -> Result<Vec<String>, MassBankError>;
}
