/*!
Matching ranked hits back onto the features their queries were built from.

A [`Reconciler`] consumes one [`ResultSet`] at a time, ranking and filtering its
hits and converting each accepted hit into a pending [`Identity`]. Where that
identity is kept, and how it is finally attached, depends on the
[`AddressingStrategy`]: [`FlatAddressing`] for MS1 feature sets and
[`NestedAddressing`] for product spectra.
*/
use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use super::params::SearchParameters;
use super::ranking::rank_hits;
use super::{ReconcileMode, SearchError};
use crate::features::{Feature, FeatureSetContainer, Identity};
use crate::io::{CorrelationKey, NestedKey, ResultSet};
use crate::mass_error::MassErrorType;

/// Decides where the identities produced for a query are recorded, and how they
/// are attached to features once their notations are known.
pub trait AddressingStrategy {
    const MODE: ReconcileMode;

    /// Record `identity`, whose compound has the observable m/z `adjusted_mass`,
    /// against the origin named by `key`. Returns whether the hit counted as
    /// accepted.
    fn record(
        &mut self,
        key: CorrelationKey,
        adjusted_mass: f64,
        identity: Identity,
        container: &FeatureSetContainer,
    ) -> Result<bool, SearchError>;

    /// Attach every recorded identity to the matching features of `container`,
    /// filling in its notation. Returns how many identities were attached.
    fn attach(self, container: &mut FeatureSetContainer, notations: &HashMap<String, String>) -> usize;

    /// Transform a hit's score before it is stored
    fn scale_score(&self, score: f64) -> f64 {
        score
    }
}

fn unexpected_key(key: CorrelationKey, mode: ReconcileMode) -> SearchError {
    SearchError::UnexpectedKey {
        key: key.to_string(),
        mode,
    }
}

fn check_feature_set(
    key: CorrelationKey,
    container: &FeatureSetContainer,
) -> Result<usize, SearchError> {
    let index = key.feature_set();
    if container.get_feature_set(index).is_none() {
        return Err(SearchError::UnknownFeatureSet {
            key: key.to_string(),
            index,
        });
    }
    Ok(index)
}

fn annotate(feature: &mut Feature, identity: &Identity, notations: &HashMap<String, String>) {
    let notation = notations.get(&identity.id).cloned().unwrap_or_default();
    feature.annotate(identity.clone().with_notation(notation));
}

/// Matches MS1 hits to the observed m/z nearest their adjusted mass within the
/// queried feature set.
#[derive(Debug, Default, Clone)]
pub struct FlatAddressing {
    pending: IndexMap<usize, Vec<(f64, Identity)>>,
}

impl AddressingStrategy for FlatAddressing {
    const MODE: ReconcileMode = ReconcileMode::Flat;

    fn record(
        &mut self,
        key: CorrelationKey,
        adjusted_mass: f64,
        identity: Identity,
        container: &FeatureSetContainer,
    ) -> Result<bool, SearchError> {
        if !matches!(key, CorrelationKey::Flat(_)) {
            return Err(unexpected_key(key, Self::MODE));
        }
        let index = check_feature_set(key, container)?;
        let closest = container
            .get_feature_set(index)
            .and_then(|set| set.closest_mz(adjusted_mass));
        match closest {
            Some(mz) => {
                self.pending.entry(index).or_default().push((mz, identity));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn attach(self, container: &mut FeatureSetContainer, notations: &HashMap<String, String>) -> usize {
        let mut attached = 0;
        for (index, entries) in self.pending {
            let Some(feature_set) = container.get_feature_set_mut(index) else {
                log::warn!("Feature set {index} is no longer available for annotation");
                continue;
            };
            for (mz, identity) in entries.iter() {
                for feature in feature_set.features_at_mut(*mz) {
                    annotate(feature, identity, notations);
                    attached += 1;
                }
            }
        }
        attached
    }
}

/**
Matches product spectrum hits against the feature that was fragmented to produce
the queried spectrum.

At MS2 that is the MS1 feature named by the key. At deeper levels it is the
feature named by the key's `scan_id` within the MS1 feature's product spectra one
level up; the first such feature within tolerance receives the identity.
*/
#[derive(Debug, Clone)]
pub struct NestedAddressing {
    ms_level: u8,
    ppm: f64,
    pending: IndexMap<NestedKey, Vec<(f64, Identity)>>,
}

impl NestedAddressing {
    pub fn new(ms_level: u8, ppm: f64) -> Self {
        Self {
            ms_level,
            ppm,
            pending: IndexMap::new(),
        }
    }

    fn matches(&self, adjusted_mass: f64, mz: f64) -> bool {
        MassErrorType::PPM.contains(adjusted_mass, self.ppm, mz)
    }
}

impl AddressingStrategy for NestedAddressing {
    const MODE: ReconcileMode = ReconcileMode::Nested;

    fn record(
        &mut self,
        key: CorrelationKey,
        adjusted_mass: f64,
        identity: Identity,
        container: &FeatureSetContainer,
    ) -> Result<bool, SearchError> {
        let CorrelationKey::Nested(nested) = key else {
            return Err(unexpected_key(key, Self::MODE));
        };
        check_feature_set(key, container)?;
        self.pending
            .entry(nested)
            .or_default()
            .push((adjusted_mass, identity));
        Ok(true)
    }

    fn attach(self, container: &mut FeatureSetContainer, notations: &HashMap<String, String>) -> usize {
        let mut attached = 0;
        for (key, entries) in self.pending.iter() {
            let Some(feature) = container
                .get_feature_set_mut(key.feature_set)
                .and_then(|set| set.get_feature_mut(key.feature_id))
            else {
                log::warn!(
                    "Feature {} of feature set {} was not found, dropping {} identities",
                    key.feature_id,
                    key.feature_set,
                    entries.len()
                );
                continue;
            };
            for (adjusted_mass, identity) in entries.iter() {
                if self.ms_level <= 2 {
                    if self.matches(*adjusted_mass, feature.mz) {
                        annotate(feature, identity, notations);
                        attached += 1;
                    }
                    continue;
                }
                for spectrum in feature.msn_spectra_mut(self.ms_level - 1) {
                    let Some(parent) = spectrum.get_feature_mut(key.scan_id) else {
                        continue;
                    };
                    if self.matches(*adjusted_mass, parent.mz) {
                        annotate(parent, identity, notations);
                        attached += 1;
                        break;
                    }
                }
            }
        }
        attached
    }

    fn scale_score(&self, score: f64) -> f64 {
        (score * 1000.0).round()
    }
}

/// Drives the ranking, filtering and recording of hits shared by both addressing
/// modes, and collects the record ids whose notations must be resolved.
#[derive(Debug)]
pub struct Reconciler<'a, A: AddressingStrategy> {
    params: &'a SearchParameters,
    addressing: A,
    record_ids: IndexSet<String>,
    accepted: usize,
}

impl<'a, A: AddressingStrategy> Reconciler<'a, A> {
    pub fn new(params: &'a SearchParameters, addressing: A) -> Self {
        Self {
            params,
            addressing,
            record_ids: IndexSet::new(),
            accepted: 0,
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        A::MODE
    }

    /// Rank the hits of `result_set`, drop those scoring below the threshold and
    /// record the best of the rest. Returns how many hits were accepted.
    pub fn add_result_set(
        &mut self,
        container: &FeatureSetContainer,
        result_set: ResultSet,
    ) -> Result<usize, SearchError> {
        let key: CorrelationKey = result_set.query_name.parse()?;
        let Some(hits) = result_set.results else {
            log::debug!("Query {key} returned no hits");
            return Ok(0);
        };
        let ranked = rank_hits(hits)?;
        let mut accepted = 0;
        for ranked_hit in ranked {
            if ranked_hit.score < self.params.min_score {
                continue;
            }
            if !self
                .params
                .result_limit
                .admits(accepted, self.params.max_results)
            {
                break;
            }
            let adjusted_mass = self.params.ion_mode.adjust_mass(ranked_hit.exact_mass()?);
            let score = self.addressing.scale_score(ranked_hit.score);
            let hit = ranked_hit.hit;
            let identity = Identity::from_record(hit.id.as_str(), hit.title, score, self.params.ms_level);
            if self.addressing.record(key, adjusted_mass, identity, container)? {
                self.record_ids.insert(hit.id);
                accepted += 1;
            }
        }
        log::trace!("Accepted {accepted} hits for query {key}");
        self.accepted += accepted;
        Ok(accepted)
    }

    /// The distinct ids of every record an identity was recorded for, in the order
    /// they were first seen
    pub fn record_ids(&self) -> &IndexSet<String> {
        &self.record_ids
    }

    /// The number of hits accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Attach the recorded identities to `container` with their notations
    pub fn attach(self, container: &mut FeatureSetContainer, notations: &HashMap<String, String>) -> usize {
        self.addressing.attach(container, notations)
    }
}
