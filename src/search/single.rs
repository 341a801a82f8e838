#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use super::output::OutputAssembler;
use super::params::{ParameterError, SearchParameters};
use super::ranking::RankedHit;
use super::SearchError;
use crate::features::{Feature, FeatureSet, FeatureSetContainer, Identity};
use crate::io::{extract_notation, scaled_peaks, MassBankError, RawHit, SpectrumSearchClient, SpectrumSearchRequest};
use crate::mass_error::MassErrorType;

/// The result of searching every spectrum of a container on its own
#[derive(Debug)]
pub struct SingleSearchOutcome {
    pub container: FeatureSetContainer,
    /// The feature sets whose search failed and were left out of `container`
    pub failures: Vec<(usize, SearchError)>,
    /// The number of identities attached to features
    pub identities: usize,
}

/**
Annotates a [`FeatureSetContainer`] by searching each spectrum against MassBank
with its own request.

At MS1 each feature set is one query, and a hit is attached to the features at
the observed m/z nearest its adjusted mass when that lies within the tolerance.
At higher MS levels every product spectrum of every feature is one query, and a
hit is attached to the fragmented feature when its m/z lies within the tolerance
window of the adjusted mass.

Each feature set is searched independently, in parallel with the `parallelism`
feature, each worker using its own clone of the client. A feature set whose
search fails is logged and left out of the output.
*/
#[derive(Debug, Clone)]
pub struct MassBankSearch<C: SpectrumSearchClient + Clone + Send + Sync> {
    params: SearchParameters,
    client: C,
}

impl<C: SpectrumSearchClient + Clone + Send + Sync> MassBankSearch<C> {
    pub fn new(params: SearchParameters, client: C) -> Result<Self, ParameterError> {
        params.validate()?;
        Ok(Self { params, client })
    }

    pub fn params(&self) -> &SearchParameters {
        &self.params
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn run(&self, input: &FeatureSetContainer) -> SingleSearchOutcome {
        let feature_sets: Vec<&FeatureSet> = input.iter().collect();
        let results = self._search_all(&feature_sets);

        let mut assembler = OutputAssembler::new(input);
        let mut failures = Vec::new();
        let mut identities = 0;
        let mut working = FeatureSetContainer::new(input.id.clone(), None, input.ion_mode);
        for (feature_set, result) in feature_sets.iter().zip(results) {
            match result {
                Ok((annotated, attached)) => {
                    identities += attached;
                    if let Err(err) = working.add_feature_set(annotated) {
                        failures.push((feature_set.index, err.into()));
                    }
                }
                Err(err) => {
                    log::error!("MassBank search of feature set {} failed: {err}", feature_set.index);
                    failures.push((feature_set.index, err));
                }
            }
        }
        if let Err(err) = assembler.extend(working) {
            log::error!("Failed to assemble the output of {}: {err}", input.id);
        }
        let (container, finalized) = assembler.finish();
        if let Err(err) = finalized {
            log::error!("Failed to finalize {}: {err}", container.id);
        }
        log::info!(
            "MassBank search of {} attached {identities} identities, {} feature sets failed",
            input.id,
            failures.len()
        );
        SingleSearchOutcome {
            container,
            failures,
            identities,
        }
    }

    #[cfg(feature = "parallelism")]
    fn _search_all(&self, feature_sets: &[&FeatureSet]) -> Vec<Result<(FeatureSet, usize), SearchError>> {
        feature_sets
            .par_iter()
            .map_with(self.client.clone(), |client, feature_set| {
                self.search_feature_set(client, feature_set)
            })
            .collect()
    }

    #[cfg(not(feature = "parallelism"))]
    fn _search_all(&self, feature_sets: &[&FeatureSet]) -> Vec<Result<(FeatureSet, usize), SearchError>> {
        let client = self.client.clone();
        feature_sets
            .iter()
            .map(|feature_set| self.search_feature_set(&client, feature_set))
            .collect()
    }

    /// Search one feature set, returning an annotated copy and the number of
    /// identities attached to it
    fn search_feature_set(&self, client: &C, feature_set: &FeatureSet) -> Result<(FeatureSet, usize), SearchError> {
        let mut annotated = feature_set.clone();
        let mut attached = 0;
        if self.params.ms_level <= 1 {
            if annotated.is_empty() {
                return Ok((annotated, 0));
            }
            let hits = client.search_spectrum(&self.request_for(&annotated))?;
            for hit in hits {
                let matched = self.identify(client, hit, |mass| {
                    annotated.closest_mz_within(mass, self.params.ppm, MassErrorType::PPM)
                })?;
                let Some((mz, identity)) = matched else { continue };
                for feature in annotated.features_at_mut(mz) {
                    feature.annotate(identity.clone());
                    attached += 1;
                }
            }
        } else {
            for feature in annotated.iter_mut() {
                attached += self.search_products(client, feature)?;
            }
        }
        Ok((annotated, attached))
    }

    fn search_products(&self, client: &C, feature: &mut Feature) -> Result<usize, SearchError> {
        let requests: Vec<SpectrumSearchRequest> = feature
            .msn_spectra(self.params.ms_level)
            .into_iter()
            .filter(|spectrum| !spectrum.is_empty())
            .map(|spectrum| self.request_for(spectrum))
            .collect();
        let mut attached = 0;
        for request in requests {
            for hit in client.search_spectrum(&request)? {
                let parent_mz = feature.mz;
                let matched = self.identify(client, hit, |mass| {
                    MassErrorType::PPM
                        .contains(parent_mz, self.params.ppm, mass)
                        .then_some(())
                })?;
                if let Some(((), identity)) = matched {
                    feature.annotate(identity);
                    attached += 1;
                }
            }
        }
        Ok(attached)
    }

    /// Match a hit's adjusted mass with `accept` and, only when it matches,
    /// look up the notation and build its identity
    fn identify<T, F: FnOnce(f64) -> Option<T>>(
        &self,
        client: &C,
        hit: RawHit,
        accept: F,
    ) -> Result<Option<(T, Identity)>, SearchError> {
        let ranked = RankedHit::new(hit)?;
        let adjusted_mass = self.params.ion_mode.adjust_mass(ranked.exact_mass()?);
        let Some(matched) = accept(adjusted_mass) else {
            return Ok(None);
        };
        let notation = self.notation_of(client, &ranked.hit.id)?;
        let identity = Identity::from_record(ranked.hit.id, ranked.hit.title, ranked.score, self.params.ms_level)
            .with_notation(notation);
        Ok(Some((matched, identity)))
    }

    fn notation_of(&self, client: &C, id: &str) -> Result<String, MassBankError> {
        let records = client.record_info(&[id.to_string()])?;
        Ok(records
            .into_iter()
            .next()
            .map(|record| extract_notation(&record.info))
            .unwrap_or_default())
    }

    fn request_for(&self, spectrum: &FeatureSet) -> SpectrumSearchRequest {
        let (mzs, intensities) = scaled_peaks(spectrum).unzip();
        SpectrumSearchRequest {
            mzs,
            intensities,
            cutoff: self.params.cutoff,
            instrument_types: self.params.instruments.clone(),
            ion_mode: self.params.ion_mode.label().to_string(),
            tolerance: self.params.ppm,
            unit: MassErrorType::PPM.unit().to_string(),
            max_results: self.params.max_results,
        }
    }
}
