//! The in-memory feature data model: [`Feature`]s grouped into [`FeatureSet`]s,
//! held by a [`FeatureSetContainer`], and annotated with [`Identity`] records.
mod container;
mod feature;
mod feature_set;
mod identity;

pub use container::{ContainerError, FeatureSetContainer};
pub use feature::Feature;
pub use feature_set::FeatureSet;
pub use identity::{compound_name, Identity, MASSBANK_SOURCE};
