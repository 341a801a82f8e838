use std::cmp;
use std::fmt;

use super::feature_set::FeatureSet;
use super::identity::Identity;

/**
A detected ion signal, described by its m/z and intensity.

A feature may have been selected for fragmentation, in which case the resulting
product spectra are stored in `msn_spectra`. Those spectra may in turn contain
fragmented features, forming a tree rooted at an MS1 feature. Each product
spectrum records the id of the feature it was produced from in its
[`FeatureSet::precursor_id`].
*/
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feature {
    pub id: u32,
    pub mz: f64,
    pub intensity: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub identities: Vec<Identity>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub msn_spectra: Vec<FeatureSet>,
}

impl Feature {
    pub fn new(id: u32, mz: f64, intensity: f64) -> Self {
        Self {
            id,
            mz,
            intensity,
            identities: Vec::new(),
            msn_spectra: Vec::new(),
        }
    }

    /// Attach a product spectrum, recording this feature as its precursor
    pub fn add_msn_spectrum(&mut self, mut spectrum: FeatureSet) {
        spectrum.precursor_id = Some(self.id);
        self.msn_spectra.push(spectrum);
    }

    pub fn with_msn_spectrum(mut self, spectrum: FeatureSet) -> Self {
        self.add_msn_spectrum(spectrum);
        self
    }

    /// Whether any descendant spectrum was acquired at `ms_level`
    pub fn has_msn_spectra(&self, ms_level: u8) -> bool {
        self.msn_spectra.iter().any(|s| {
            s.ms_level == ms_level
                || (s.ms_level < ms_level && s.iter().any(|f| f.has_msn_spectra(ms_level)))
        })
    }

    /// All descendant spectra acquired at `ms_level`, in depth-first order
    pub fn msn_spectra(&self, ms_level: u8) -> Vec<&FeatureSet> {
        let mut acc = Vec::new();
        collect_msn_spectra(self, ms_level, &mut acc);
        acc
    }

    pub fn msn_spectra_mut(&mut self, ms_level: u8) -> Vec<&mut FeatureSet> {
        let mut acc = Vec::new();
        collect_msn_spectra_mut(self, ms_level, &mut acc);
        acc
    }

    /// Attach `identity` to this feature. An identity from the same record
    /// replaces the one already attached.
    pub fn annotate(&mut self, identity: Identity) {
        match self.identities.iter_mut().find(|i| i.id == identity.id) {
            Some(existing) => *existing = identity,
            None => self.identities.push(identity),
        }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn is_annotated(&self) -> bool {
        !self.identities.is_empty()
    }
}

fn collect_msn_spectra<'a>(feature: &'a Feature, ms_level: u8, acc: &mut Vec<&'a FeatureSet>) {
    for spectrum in feature.msn_spectra.iter() {
        if spectrum.ms_level == ms_level {
            acc.push(spectrum);
        } else if spectrum.ms_level < ms_level {
            for product in spectrum.iter() {
                collect_msn_spectra(product, ms_level, acc);
            }
        }
    }
}

fn collect_msn_spectra_mut<'a>(
    feature: &'a mut Feature,
    ms_level: u8,
    acc: &mut Vec<&'a mut FeatureSet>,
) {
    for spectrum in feature.msn_spectra.iter_mut() {
        if spectrum.ms_level == ms_level {
            acc.push(spectrum);
        } else if spectrum.ms_level < ms_level {
            for product in spectrum.iter_mut() {
                collect_msn_spectra_mut(product, ms_level, acc);
            }
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Feature({}, {}, {})", self.id, self.mz, self.intensity)
    }
}

impl cmp::PartialOrd<Feature> for Feature {
    fn partial_cmp(&self, other: &Feature) -> Option<cmp::Ordering> {
        self.mz.partial_cmp(&other.mz)
    }
}

impl cmp::PartialEq<Feature> for Feature {
    fn eq(&self, other: &Feature) -> bool {
        self.id == other.id
            && self.mz == other.mz
            && self.intensity == other.intensity
            && self.identities == other.identities
            && self.msn_spectra == other.msn_spectra
    }
}
