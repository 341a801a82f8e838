//! Annotating feature containers with MassBank search results.
//!
//! [`MassBankBatchSearch`] submits every spectrum of a container as one remote
//! batch job and reconciles the results back onto the features.
//! [`MassBankSearch`] searches each spectrum on its own, fanning out over worker
//! threads with the `parallelism` feature.
use std::fmt::Display;

use thiserror::Error;

use crate::features::ContainerError;
use crate::io::{CorrelationKeyParseError, MassBankError};

mod batch;
mod output;
mod params;
mod ranking;
mod reconcile;
mod single;

pub use batch::{CancellationToken, MassBankBatchSearch, SearchOutcome, SearchReport};
pub use output::{OutputAssembler, OUTPUT_SUFFIX};
pub use params::{ParameterError, ResultLimit, SearchParameters, DEFAULT_CUTOFF, DEFAULT_POLL_INTERVAL};
pub use ranking::{rank_hits, HitParseError, RankedHit};
pub use reconcile::{AddressingStrategy, FlatAddressing, NestedAddressing, Reconciler};
pub use single::{MassBankSearch, SingleSearchOutcome};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Invalid search parameters: {0}")]
    Parameters(#[from] ParameterError),
    #[error("MassBank request failed: {0}")]
    Service(#[from] MassBankError),
    #[error(transparent)]
    CorrelationKey(#[from] CorrelationKeyParseError),
    #[error(transparent)]
    Hit(#[from] HitParseError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Result set {key} refers to feature set {index}, which is not in the input")]
    UnknownFeatureSet { key: String, index: usize },
    #[error("Result set {key} does not address a {mode} spectrum")]
    UnexpectedKey { key: String, mode: ReconcileMode },
}

/// The two ways a query's origin is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileMode {
    /// An MS1 feature set, by index
    Flat,
    /// A product spectrum, by feature set, feature and fragmented feature
    Nested,
}

impl Display for ReconcileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat => f.write_str("MS1"),
            Self::Nested => f.write_str("MSn"),
        }
    }
}

/// The stages of a batch search, in the order they are passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    BuildingQueries,
    Submitted,
    Polling,
    Fetched,
    Reconciling(ReconcileMode),
    ResolvingNotation,
    Done,
    Failed,
}

impl BatchState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconciling(mode) => write!(f, "Reconciling({mode})"),
            other => write!(f, "{other:?}"),
        }
    }
}
