//! Talking to the MassBank service: serializing spectra into queries, the client
//! abstractions over the remote operations, and parsing record detail text.
pub mod massbank;
mod notation;
mod query;

pub use crate::io::massbank::{
    BatchJob, BatchSearchClient, CallLog, ErrorSource, JobStatus, MassBankError, MemoryClient, Operation,
    RawHit, RecordInfo, RecordInfoSource, ResultSet, SpectrumSearchClient, SpectrumSearchRequest,
    SEARCH_SPECTRUM_JOB,
};
#[cfg(feature = "http")]
pub use crate::io::massbank::{MassBankHttpClient, DEFAULT_ENDPOINT};
pub use crate::io::notation::{extract_notation, resolve_notations, IUPAC_MARKER};
pub use crate::io::query::{
    encode_spectrum, scaled_peaks, CorrelationKey, CorrelationKeyParseError, NestedKey,
    QueryBuilder, SpectrumQuery,
};
