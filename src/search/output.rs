use crate::features::{ContainerError, FeatureSetContainer};

/// Appended to the input container's id to name the annotated output
pub const OUTPUT_SUFFIX: &str = "DMB";

/// Collects annotated feature sets into a new container named after the input,
/// and finalizes it exactly once.
#[derive(Debug)]
pub struct OutputAssembler {
    output: FeatureSetContainer,
}

impl OutputAssembler {
    pub fn new(input: &FeatureSetContainer) -> Self {
        Self {
            output: input.derive_empty(OUTPUT_SUFFIX),
        }
    }

    /// An open, unpersisted copy of `input` that can be annotated in place
    /// without touching the input itself.
    pub fn working_copy(input: &FeatureSetContainer) -> Result<FeatureSetContainer, ContainerError> {
        let mut working = FeatureSetContainer::new(input.id.clone(), None, input.ion_mode);
        for feature_set in input.iter() {
            working.add_feature_set(feature_set.clone())?;
        }
        Ok(working)
    }

    pub fn output(&self) -> &FeatureSetContainer {
        &self.output
    }

    /// Append every feature set of `source`, keeping their order
    pub fn extend(&mut self, source: FeatureSetContainer) -> Result<usize, ContainerError> {
        let mut added = 0;
        for feature_set in source.into_feature_sets() {
            self.output.add_feature_set(feature_set)?;
            added += 1;
        }
        Ok(added)
    }

    /// Finalize the output. The container is sealed even when persisting it
    /// fails, in which case the error is returned alongside it.
    pub fn finish(mut self) -> (FeatureSetContainer, Result<(), ContainerError>) {
        let status = self.output.finalize();
        (self.output, status)
    }
}
