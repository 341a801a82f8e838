use std::fmt;

/// The provenance label attached to identities retrieved from MassBank
pub const MASSBANK_SOURCE: &str = "MassBank";

/**
A candidate compound identity attached to a [`Feature`](crate::features::Feature).

The identity is derived from a single reference record returned by the remote
service. `notation` is filled in by a second lookup and is the empty string
when the record carries no chemical notation.
*/
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    /// The reference record accession
    pub id: String,
    /// The compound name, the record title up to the first `;`
    pub name: String,
    /// The chemical structure notation of the compound
    pub notation: String,
    pub score: f64,
    /// Where this identity came from
    pub source: String,
    /// The MS level of the spectrum that was searched
    pub ms_level: u8,
    /// The complete record title
    pub title: String,
}

impl Identity {
    /// Create a MassBank identity from a record's accession, title and score,
    /// with an empty notation.
    pub fn from_record(id: impl Into<String>, title: impl Into<String>, score: f64, ms_level: u8) -> Self {
        let title: String = title.into();
        let name = compound_name(&title).to_string();
        Self {
            id: id.into(),
            name,
            notation: String::new(),
            score,
            source: MASSBANK_SOURCE.to_string(),
            ms_level,
            title,
        }
    }

    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation = notation.into();
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// MassBank record titles append acquisition details after the compound name,
/// separated by `;`.
pub fn compound_name(title: &str) -> &str {
    match title.split_once(';') {
        Some((name, _)) => name,
        None => title,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_record() {
        let identity = Identity::from_record(
            "PR100037",
            "Glucose; LC-ESI-QTOF; MS2; CE:10 V",
            0.82,
            1,
        );
        assert_eq!(identity.name, "Glucose");
        assert_eq!(identity.title, "Glucose; LC-ESI-QTOF; MS2; CE:10 V");
        assert_eq!(identity.notation, "");
        assert_eq!(identity.source, MASSBANK_SOURCE);
        assert_eq!(identity.to_string(), "Glucose");

        let identity = identity.with_notation("C6H12O6");
        assert_eq!(identity.notation, "C6H12O6");
    }

    #[test]
    fn test_compound_name_without_separator() {
        assert_eq!(compound_name("Caffeine"), "Caffeine");
        assert_eq!(compound_name(""), "");
    }
}
