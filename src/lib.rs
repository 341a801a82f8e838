//! `mzbank` annotates mass spectrometry features with candidate compound
//! identities from the MassBank reference spectrum database.
//!
//! Features are grouped into [`FeatureSet`]s held by a [`FeatureSetContainer`].
//! A [`MassBankBatchSearch`] sends every spectrum of a container to MassBank as a
//! single batch job and attaches the hits it gets back to the features they match,
//! while a [`MassBankSearch`] queries each spectrum separately.
//!
//! ```
//! use mzbank::prelude::*;
//!
//! let mut container = FeatureSetContainer::new("run", None, IonMode::Positive);
//! container.add_feature_set(FeatureSet::new(
//!     0,
//!     1,
//!     IonMode::Positive,
//!     vec![Feature::new(1, 181.0700, 800.0), Feature::new(2, 150.0, 200.0)],
//! )).unwrap();
//!
//! let client = MemoryClient::new().with_result_set(ResultSet::new(
//!     "0",
//!     vec![RawHit::new("PR000001", "Glucose; LC-ESI-QTOF", "180.0634", "0.91")],
//! ));
//! let params = SearchParameters {
//!     min_profiles: 2,
//!     poll_interval: std::time::Duration::from_millis(1),
//!     ..Default::default()
//! };
//! let search = MassBankBatchSearch::new(params, client).unwrap();
//! let outcome = search.run(&container);
//! assert!(outcome.report.is_success());
//! assert_eq!(outcome.container.id, "runDMB");
//! ```
pub mod features;
pub mod io;
pub mod mass_error;
pub mod meta;
pub mod prelude;
pub mod search;
pub mod utils;

pub use crate::features::{Feature, FeatureSet, FeatureSetContainer, Identity};
pub use crate::mass_error::MassErrorType;
pub use crate::meta::IonMode;

pub use crate::search::{
    MassBankBatchSearch, MassBankSearch, SearchError, SearchOutcome, SearchParameters,
};
