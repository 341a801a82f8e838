pub use crate::features::{Feature, FeatureSet, FeatureSetContainer, Identity};
pub use crate::io::{
    BatchSearchClient, MemoryClient, RawHit, RecordInfo, RecordInfoSource, ResultSet,
    SpectrumSearchClient,
};
pub use crate::meta::IonMode;
pub use crate::search::{
    CancellationToken, MassBankBatchSearch, MassBankSearch, ResultLimit, SearchParameters,
};
