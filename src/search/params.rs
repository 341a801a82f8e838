use std::time::Duration;

use thiserror::Error;

use crate::meta::IonMode;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("The m/z tolerance must be a positive number of ppm, got {0}")]
    InvalidTolerance(f64),
    #[error("The minimum score must lie between 0 and 1, got {0}")]
    InvalidScore(f64),
    #[error("The intensity cutoff must be a non-negative number, got {0}")]
    InvalidCutoff(f64),
    #[error("At least one result per query must be requested")]
    InvalidMaxResults,
    #[error("The MS level must be at least 1")]
    InvalidMsLevel,
    #[error("At least one instrument type is required")]
    NoInstruments,
    #[error("Instrument type {0} is blank")]
    BlankInstrument(usize),
    #[error("The poll interval must be longer than zero")]
    InvalidPollInterval,
    #[error("Failed to read search parameters: {0}")]
    Read(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("Failed to decode search parameters: {0}")]
    Decode(#[from] serde_json::Error),
}

/// How many ranked hits are accepted per query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResultLimit {
    /// Accept at most `max_results` hits
    #[default]
    Strict,
    /// Accept up to `max_results + 2` hits, as older MassBank clients did. Those
    /// clients recorded a hit before comparing the pre-increment count to the limit.
    Legacy,
}

impl ResultLimit {
    /// Whether another hit may be accepted after `accepted` hits have been
    #[inline]
    pub const fn admits(&self, accepted: usize, max_results: usize) -> bool {
        match self {
            Self::Strict => accepted < max_results,
            Self::Legacy => accepted <= max_results.saturating_add(1),
        }
    }
}

/**
The options shared by the MassBank search tasks.

With the `serde` feature these are read from JSON. Durations are written as
milliseconds, and every option after `ms_level` may be omitted to take its
default value.

```json
{
    "ppm": 10.0,
    "min_score": 0.5,
    "ion_mode": "positive",
    "max_results": 10,
    "min_profiles": 3,
    "instruments": ["ESI-QTOF"],
    "ms_level": 1,
    "poll_interval": 3000
}
```
*/
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchParameters {
    /// m/z tolerance in parts-per-million
    pub ppm: f64,
    pub min_score: f64,
    pub ion_mode: IonMode,
    pub max_results: usize,
    /// The fewest features a spectrum needs to be queried
    pub min_profiles: usize,
    pub instruments: Vec<String>,
    pub ms_level: u8,
    /// The smallest relative intensity the single spectrum search considers
    #[cfg_attr(feature = "serde", serde(default = "default_cutoff"))]
    pub cutoff: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub result_limit: ResultLimit,
    #[cfg_attr(
        feature = "serde",
        serde(default = "default_poll_interval", with = "duration_ms")
    )]
    pub poll_interval: Duration,
    #[cfg_attr(feature = "serde", serde(default, with = "optional_duration_ms"))]
    pub timeout: Option<Duration>,
    /// The address sent along with batch jobs
    #[cfg_attr(feature = "serde", serde(default))]
    pub contact: String,
}

pub const DEFAULT_CUTOFF: f64 = 50.0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[allow(unused)]
fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF
}

#[allow(unused)]
fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            ppm: 10.0,
            min_score: 0.5,
            ion_mode: IonMode::Positive,
            max_results: 10,
            min_profiles: 3,
            instruments: vec!["all".to_string()],
            ms_level: 1,
            cutoff: DEFAULT_CUTOFF,
            result_limit: ResultLimit::Strict,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            contact: String::new(),
        }
    }
}

impl SearchParameters {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(self.ppm.is_finite() && self.ppm > 0.0) {
            return Err(ParameterError::InvalidTolerance(self.ppm));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ParameterError::InvalidScore(self.min_score));
        }
        if !(self.cutoff.is_finite() && self.cutoff >= 0.0) {
            return Err(ParameterError::InvalidCutoff(self.cutoff));
        }
        if self.max_results == 0 {
            return Err(ParameterError::InvalidMaxResults);
        }
        if self.ms_level == 0 {
            return Err(ParameterError::InvalidMsLevel);
        }
        if self.instruments.is_empty() {
            return Err(ParameterError::NoInstruments);
        }
        if let Some(i) = self.instruments.iter().position(|s| s.trim().is_empty()) {
            return Err(ParameterError::BlankInstrument(i));
        }
        if self.poll_interval.is_zero() {
            return Err(ParameterError::InvalidPollInterval);
        }
        Ok(())
    }

    /// Read parameters in JSON format from `reader` and validate them
    #[cfg(feature = "serde")]
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ParameterError> {
        let params: Self = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }

    #[cfg(feature = "serde")]
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ParameterError> {
        let handle = std::io::BufReader::new(std::fs::File::open(path)?);
        Self::from_reader(handle)
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
mod optional_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
