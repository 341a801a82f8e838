use std::io;
use std::path::{Path, PathBuf};

use indexmap::map::{Values, ValuesMut};
use indexmap::IndexMap;
use thiserror::Error;

use super::feature_set::FeatureSet;
use crate::meta::IonMode;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container {0} has been finalized and cannot be modified")]
    Finalized(String),
    #[error("Container {container} already holds a feature set with index {index}")]
    DuplicateIndex { container: String, index: usize },
    #[error("Failed to persist container {container} to {path}: {source}")]
    Persistence {
        container: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/**
An ordered collection of [`FeatureSet`]s from one acquisition, addressable by
[`FeatureSet::index`].

A container starts out open for appending. [`FeatureSetContainer::finalize`] seals
it, after which it is read-only. When a working directory is set and the `serde`
feature is enabled, finalizing also writes the container to `<id>.json` in that
directory.
*/
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureSetContainer {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub working_directory: Option<PathBuf>,
    pub ion_mode: IonMode,
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    feature_sets: IndexMap<usize, FeatureSet>,
    #[cfg_attr(feature = "serde", serde(default))]
    finalized: bool,
}

impl FeatureSetContainer {
    pub fn new<S: Into<String>>(id: S, working_directory: Option<PathBuf>, ion_mode: IonMode) -> Self {
        Self {
            id: id.into(),
            working_directory,
            ion_mode,
            feature_sets: IndexMap::new(),
            finalized: false,
        }
    }

    /// Create an empty, open container that inherits this container's ion mode
    /// and working directory, named by this container's id followed by `suffix`.
    pub fn derive_empty(&self, suffix: &str) -> Self {
        Self::new(
            format!("{}{}", self.id, suffix),
            self.working_directory.clone(),
            self.ion_mode,
        )
    }

    /// Append a [`FeatureSet`] to the end of the container
    pub fn add_feature_set(&mut self, feature_set: FeatureSet) -> Result<(), ContainerError> {
        if self.finalized {
            return Err(ContainerError::Finalized(self.id.clone()));
        }
        if self.feature_sets.contains_key(&feature_set.index) {
            return Err(ContainerError::DuplicateIndex {
                container: self.id.clone(),
                index: feature_set.index,
            });
        }
        self.feature_sets.insert(feature_set.index, feature_set);
        Ok(())
    }

    pub fn get_feature_set(&self, index: usize) -> Option<&FeatureSet> {
        self.feature_sets.get(&index)
    }

    pub fn get_feature_set_mut(&mut self, index: usize) -> Option<&mut FeatureSet> {
        if self.finalized {
            return None;
        }
        self.feature_sets.get_mut(&index)
    }

    pub fn len(&self) -> usize {
        self.feature_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_sets.is_empty()
    }

    /// Iterate over the feature sets in insertion order
    pub fn iter(&self) -> Values<'_, usize, FeatureSet> {
        self.feature_sets.values()
    }

    pub fn iter_mut(&mut self) -> ValuesMut<'_, usize, FeatureSet> {
        self.feature_sets.values_mut()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Consume the container, yielding its feature sets in insertion order
    pub fn into_feature_sets(self) -> impl Iterator<Item = FeatureSet> {
        self.feature_sets.into_values()
    }

    /// The location [`FeatureSetContainer::finalize`] writes to, if any
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.working_directory
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", self.id)))
    }

    /// Seal the container against further writes, persisting it if a working
    /// directory is set. A container can only be finalized once.
    pub fn finalize(&mut self) -> Result<(), ContainerError> {
        if self.finalized {
            return Err(ContainerError::Finalized(self.id.clone()));
        }
        self.finalized = true;
        if let Some(path) = self.storage_path() {
            self.persist(&path)?;
        }
        log::debug!(
            "Finalized container {} with {} feature sets",
            self.id,
            self.len()
        );
        Ok(())
    }

    #[cfg(feature = "serde")]
    fn persist(&self, path: &Path) -> Result<(), ContainerError> {
        let wrap_err = |source: io::Error| ContainerError::Persistence {
            container: self.id.clone(),
            path: path.to_path_buf(),
            source,
        };
        let handle = io::BufWriter::new(std::fs::File::create(path).map_err(wrap_err)?);
        serde_json::to_writer(handle, self).map_err(|e| wrap_err(e.into()))
    }

    #[cfg(not(feature = "serde"))]
    fn persist(&self, path: &Path) -> Result<(), ContainerError> {
        log::trace!(
            "Not persisting {} to {}, serialization is disabled",
            self.id,
            path.display()
        );
        Ok(())
    }

    /// Write the container out in JSON format to `writer`
    #[cfg(feature = "serde")]
    pub fn to_writer<W: io::Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }

    /// Read a container in JSON format from `reader`
    #[cfg(feature = "serde")]
    pub fn from_reader<R: io::Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

impl<'a> IntoIterator for &'a FeatureSetContainer {
    type Item = &'a FeatureSet;
    type IntoIter = Values<'a, usize, FeatureSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
