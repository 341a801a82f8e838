use std::ops;
use std::slice;

use super::feature::Feature;
use crate::mass_error::MassErrorType;
use crate::meta::IonMode;
use crate::utils::MIN_ABUNDANCE;

/**
An ordered collection of [`Feature`]s observed in one scan, sorted by m/z.

For MS1 data `index` identifies the scan within its container. For product
spectra, `precursor_id` holds the id of the [`Feature`] that was fragmented to
produce this spectrum.

The features are only reachable through methods that preserve the m/z order,
and deserializing a [`FeatureSet`] sorts its features again.
*/
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureSet {
    pub index: usize,
    pub ms_level: u8,
    pub ion_mode: IonMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub precursor_id: Option<u32>,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_sorted"))]
    features: Vec<Feature>,
}

#[cfg(feature = "serde")]
fn deserialize_sorted<'de, D>(deserializer: D) -> Result<Vec<Feature>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut features: Vec<Feature> = serde::Deserialize::deserialize(deserializer)?;
    FeatureSet::_sort(&mut features);
    Ok(features)
}

impl FeatureSet {
    pub fn new(index: usize, ms_level: u8, ion_mode: IonMode, mut features: Vec<Feature>) -> Self {
        Self::_sort(&mut features);
        Self {
            index,
            ms_level,
            ion_mode,
            precursor_id: None,
            features,
        }
    }

    pub fn empty(index: usize, ms_level: u8, ion_mode: IonMode) -> Self {
        Self::new(index, ms_level, ion_mode, Vec::new())
    }

    fn _sort(features: &mut [Feature]) {
        features.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    }

    pub fn sort(&mut self) {
        Self::_sort(&mut self.features);
    }

    /// Add a feature, keeping the collection sorted by m/z
    pub fn push(&mut self, feature: Feature) {
        match self.features.last() {
            Some(last) if last.mz > feature.mz => {
                self.features.push(feature);
                self.sort();
            }
            _ => self.features.push(feature),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Mutable access to the features. Changing a feature's `mz` through this
    /// iterator requires a call to [`FeatureSet::sort`] afterwards.
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Feature> {
        self.features.iter_mut()
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }

    /// The largest intensity in this collection, never smaller than [`MIN_ABUNDANCE`]
    pub fn max_intensity(&self) -> f64 {
        self.iter()
            .map(|f| f.intensity)
            .fold(MIN_ABUNDANCE, f64::max)
    }

    fn _search_by(&self, query: f64) -> Result<usize, usize> {
        self.features
            .binary_search_by(|feature| feature.mz.total_cmp(&query))
    }

    /// Find the observed m/z closest to `query`.
    ///
    /// An exact hit is returned as-is. Otherwise the nearest value below `query`
    /// is preferred unless the nearest value above it is strictly closer.
    pub fn closest_mz(&self, query: f64) -> Option<f64> {
        match self._search_by(query) {
            Ok(i) => Some(self.features[i].mz),
            Err(i) => {
                let floor = i.checked_sub(1).map(|j| self.features[j].mz);
                let ceiling = self.features.get(i).map(|f| f.mz);
                match (floor, ceiling) {
                    (Some(lo), Some(hi)) => {
                        if query - lo <= hi - query {
                            Some(lo)
                        } else {
                            Some(hi)
                        }
                    }
                    (Some(lo), None) => Some(lo),
                    (None, Some(hi)) => Some(hi),
                    (None, None) => None,
                }
            }
        }
    }

    /// Find the observed m/z closest to `query` that also lies within
    /// `error_tolerance` of it.
    pub fn closest_mz_within(
        &self,
        query: f64,
        error_tolerance: f64,
        error_type: MassErrorType,
    ) -> Option<f64> {
        self.closest_mz(query)
            .filter(|mz| error_type.contains(query, error_tolerance, *mz))
    }

    pub fn get_feature(&self, id: u32) -> Option<&Feature> {
        self.iter().find(|f| f.id == id)
    }

    pub fn get_feature_mut(&mut self, id: u32) -> Option<&mut Feature> {
        self.iter_mut().find(|f| f.id == id)
    }

    /// All features whose m/z is exactly `mz`
    pub fn features_at_mut(&mut self, mz: f64) -> impl Iterator<Item = &mut Feature> {
        self.iter_mut().filter(move |f| f.mz == mz)
    }

    pub fn with_precursor(mut self, precursor_id: u32) -> Self {
        self.precursor_id = Some(precursor_id);
        self
    }
}

impl ops::Index<usize> for FeatureSet {
    type Output = Feature;

    fn index(&self, i: usize) -> &Self::Output {
        &self.features[i]
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut FeatureSet {
    type Item = &'a mut Feature;
    type IntoIter = slice::IterMut<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self::new(0, 1, IonMode::default(), iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_set() -> FeatureSet {
        FeatureSet::new(
            5,
            1,
            IonMode::Positive,
            vec![
                Feature::new(2, 181.0700, 900.0),
                Feature::new(1, 150.0, 300.0),
                Feature::new(3, 250.2, 1200.0),
            ],
        )
    }

    #[test]
    fn test_sorted() {
        let set = make_set();
        let mzs: Vec<f64> = set.iter().map(|f| f.mz).collect();
        assert_eq!(mzs, vec![150.0, 181.07, 250.2]);
        assert_eq!(set[0].id, 1);
        assert_eq!(set.max_intensity(), 1200.0);
    }

    #[test]
    fn test_closest_mz() {
        let set = make_set();
        let adjusted = IonMode::Positive.adjust_mass(180.0630);
        assert_eq!(set.closest_mz(adjusted), Some(181.0700));
        assert_eq!(set.closest_mz(150.0), Some(150.0));
        assert_eq!(set.closest_mz(10.0), Some(150.0));
        assert_eq!(set.closest_mz(1000.0), Some(250.2));
        assert_eq!(set.closest_mz(200.0), Some(181.07));
        assert_eq!(FeatureSet::empty(0, 1, IonMode::Neutral).closest_mz(100.0), None);
    }

    #[test]
    fn test_closest_mz_tie() {
        let set: FeatureSet = vec![Feature::new(1, 100.0, 1.0), Feature::new(2, 200.0, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(set.closest_mz(150.0), Some(100.0));
        assert_eq!(set.closest_mz(150.5), Some(200.0));
    }

    #[test]
    fn test_closest_within() {
        let set = make_set();
        assert_eq!(
            set.closest_mz_within(181.0703, 10.0, MassErrorType::PPM),
            Some(181.07)
        );
        assert_eq!(set.closest_mz_within(181.5, 10.0, MassErrorType::PPM), None);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut set = make_set();
        set.push(Feature::new(4, 100.0, 1.0));
        set.push(Feature::new(5, 300.0, 1.0));
        let ids: Vec<u32> = set.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![4, 1, 2, 3, 5]);
        assert!(set.get_feature(5).is_some());
        assert_eq!(set.features_at_mut(300.0).count(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_restores_order() -> Result<(), serde_json::Error> {
        let text = r#"{
            "index": 2,
            "ms_level": 1,
            "ion_mode": "positive",
            "features": [
                {"id": 1, "mz": 300.0, "intensity": 10.0},
                {"id": 2, "mz": 181.07, "intensity": 20.0},
                {"id": 3, "mz": 100.0, "intensity": 30.0}
            ]
        }"#;
        let set: FeatureSet = serde_json::from_str(text)?;
        let ids: Vec<u32> = set.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        let adjusted = IonMode::Positive.adjust_mass(180.0630);
        assert_eq!(set.closest_mz(adjusted), Some(181.07));
        assert_eq!(
            set.closest_mz_within(adjusted, 10.0, MassErrorType::PPM),
            Some(181.07)
        );
        Ok(())
    }

    #[test]
    fn test_max_intensity_floor() {
        let set: FeatureSet = vec![Feature::new(1, 100.0, 0.0)].into_iter().collect();
        assert_eq!(set.max_intensity(), MIN_ABUNDANCE);
    }
}
