//! Serialize feature sets into the textual spectrum queries the remote service
//! accepts, each tagged with a [`CorrelationKey`] naming where it came from.
use std::fmt::{self, Display, Write as _};
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

use crate::features::{FeatureSet, FeatureSetContainer};
use crate::utils::relative_intensity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationKeyParseError {
    #[error("Correlation key {key:?} has {count} components, expected 1 or 3")]
    WrongComponentCount { key: String, count: usize },
    #[error("Failed to parse component {component:?} of correlation key {key:?}: {source}")]
    InvalidComponent {
        key: String,
        component: String,
        #[source]
        source: ParseIntError,
    },
}

/// The address of a product spectrum: the MS1 feature set, the MS1 feature that
/// was fragmented, and the id of the feature the queried spectrum was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NestedKey {
    pub feature_set: usize,
    pub feature_id: u32,
    pub scan_id: u32,
}

impl NestedKey {
    pub const fn new(feature_set: usize, feature_id: u32, scan_id: u32) -> Self {
        Self {
            feature_set,
            feature_id,
            scan_id,
        }
    }
}

/**
Names the origin of a query so that the results the service returns for it can be
attached back onto the right features.

On the wire a [`CorrelationKey::Flat`] key is the bare feature set index, and a
[`CorrelationKey::Nested`] key is its three components joined by `-`.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    Flat(usize),
    Nested(NestedKey),
}

impl CorrelationKey {
    pub const fn feature_set(&self) -> usize {
        match self {
            Self::Flat(index) => *index,
            Self::Nested(key) => key.feature_set,
        }
    }
}

impl Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat(index) => write!(f, "{index}"),
            Self::Nested(key) => write!(f, "{}-{}-{}", key.feature_set, key.feature_id, key.scan_id),
        }
    }
}

impl FromStr for CorrelationKey {
    type Err = CorrelationKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        let invalid = |component: &str, source: ParseIntError| CorrelationKeyParseError::InvalidComponent {
            key: key.to_string(),
            component: component.to_string(),
            source,
        };
        let parts: Vec<&str> = key.split('-').collect();
        match parts.as_slice() {
            [index] => index
                .parse()
                .map(Self::Flat)
                .map_err(|e| invalid(index, e)),
            [feature_set, feature_id, scan_id] => Ok(Self::Nested(NestedKey {
                feature_set: feature_set.parse().map_err(|e| invalid(feature_set, e))?,
                feature_id: feature_id.parse().map_err(|e| invalid(feature_id, e))?,
                scan_id: scan_id.parse().map_err(|e| invalid(scan_id, e))?,
            })),
            _ => Err(CorrelationKeyParseError::WrongComponentCount {
                key: key.to_string(),
                count: parts.len(),
            }),
        }
    }
}

/// One serialized spectrum, ready to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumQuery {
    pub key: CorrelationKey,
    pub text: String,
}

/// Pair every feature's m/z with its intensity scaled to `0..=1000` against the
/// spectrum's own maximum.
pub fn scaled_peaks(spectrum: &FeatureSet) -> impl Iterator<Item = (f64, f64)> + '_ {
    let max_intensity = spectrum.max_intensity();
    spectrum
        .iter()
        .map(move |f| (f.mz, relative_intensity(f.intensity, max_intensity)))
}

/// Render `spectrum` as `Name: <key>;<mz>,<intensity>;...`
pub fn encode_spectrum(key: &CorrelationKey, spectrum: &FeatureSet) -> String {
    let mut text = String::with_capacity(16 + spectrum.len() * 24);
    // Writing to a String cannot fail
    let _ = write!(text, "Name: {key};");
    for (mz, intensity) in scaled_peaks(spectrum) {
        let _ = write!(text, "{mz},{intensity};");
    }
    text
}

/**
Builds the batch of [`SpectrumQuery`] values for a [`FeatureSetContainer`].

At MS1 every feature set with at least `min_profiles` features becomes one query
keyed by its index. At higher MS levels every product spectrum at `ms_level` of
every MS1 feature becomes one query, subject to the same size filter.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBuilder {
    pub ms_level: u8,
    pub min_profiles: usize,
}

impl QueryBuilder {
    pub const fn new(ms_level: u8, min_profiles: usize) -> Self {
        Self {
            ms_level,
            min_profiles,
        }
    }

    pub fn build(&self, container: &FeatureSetContainer) -> Vec<SpectrumQuery> {
        let mut queries = Vec::new();
        let mut skipped = 0usize;
        for feature_set in container.iter() {
            if self.ms_level <= 1 {
                if feature_set.len() < self.min_profiles {
                    skipped += 1;
                    continue;
                }
                let key = CorrelationKey::Flat(feature_set.index);
                queries.push(SpectrumQuery {
                    text: encode_spectrum(&key, feature_set),
                    key,
                });
            } else {
                for feature in feature_set.iter() {
                    for spectrum in feature.msn_spectra(self.ms_level) {
                        if spectrum.len() < self.min_profiles {
                            skipped += 1;
                            continue;
                        }
                        let key = CorrelationKey::Nested(NestedKey::new(
                            feature_set.index,
                            feature.id,
                            spectrum.precursor_id.unwrap_or(feature.id),
                        ));
                        queries.push(SpectrumQuery {
                            text: encode_spectrum(&key, spectrum),
                            key,
                        });
                    }
                }
            }
        }
        log::debug!(
            "Built {} MS{} queries for {}, skipped {skipped} spectra with fewer than {} features",
            queries.len(),
            self.ms_level,
            container.id,
            self.min_profiles
        );
        queries
    }
}
