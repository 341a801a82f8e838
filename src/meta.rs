//! Acquisition metadata shared by the feature data model and the search tasks.
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::utils::PROTON;

/**
Describes the ion mode the features were acquired in. The ion mode determines how
a neutral reference mass is converted into an observable m/z for single-charged ions.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IonMode {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown ion mode {0:?}, expected one of positive, negative or neutral")]
pub struct IonModeParseError(pub String);

impl IonMode {
    /// The label the remote service uses for this ion mode
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Convert a neutral exact mass into the m/z of the protonated or
    /// deprotonated ion. Neutral mode leaves the mass untouched.
    #[inline]
    pub fn adjust_mass(&self, mass: f64) -> f64 {
        match self {
            Self::Positive => mass + PROTON,
            Self::Negative => mass - PROTON,
            Self::Neutral => mass,
        }
    }
}

impl Display for IonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IonMode {
    type Err = IonModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(Self::Positive),
            "negative" | "neg" | "-" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            _ => Err(IonModeParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_adjust_mass() {
        let mass = 180.0630;
        assert!((IonMode::Positive.adjust_mass(mass) - 181.0703).abs() < 1e-4);
        assert!((IonMode::Negative.adjust_mass(mass) - 179.0557).abs() < 1e-4);
        assert_eq!(IonMode::Neutral.adjust_mass(mass), mass);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Positive".parse::<IonMode>().unwrap(), IonMode::Positive);
        assert_eq!("neg".parse::<IonMode>().unwrap(), IonMode::Negative);
        assert!("in silico".parse::<IonMode>().is_err());
        assert_eq!(IonMode::Negative.to_string(), "negative");
    }
}
