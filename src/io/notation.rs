//! Pull the chemical notation out of MassBank record text.
use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use super::massbank::{MassBankError, RecordInfoSource};

/// The record field holding the IUPAC notation of the compound
pub const IUPAC_MARKER: &str = "CH$IUPAC: ";

static IUPAC_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CH\$IUPAC: ([^\r\n]*)[\r\n]").unwrap());

/// Extract the notation from a record's detail text.
///
/// The value runs from just after [`IUPAC_MARKER`] to the next line terminator.
/// When the marker is missing, or no line terminator follows it, the notation
/// is empty.
pub fn extract_notation(text: &str) -> String {
    IUPAC_FIELD
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Fetch the detail text of every record in `ids` with one request and map each
/// id to its notation. Ids the service does not return map to an empty notation.
pub fn resolve_notations<C: RecordInfoSource + ?Sized>(
    client: &C,
    ids: &IndexSet<String>,
) -> Result<HashMap<String, String>, MassBankError> {
    let mut notations: HashMap<String, String> =
        ids.iter().map(|id| (id.clone(), String::new())).collect();
    if ids.is_empty() {
        return Ok(notations);
    }
    let request: Vec<String> = ids.iter().cloned().collect();
    for record in client.record_info(&request)? {
        match notations.get_mut(&record.id) {
            Some(slot) => *slot = extract_notation(&record.info),
            None => log::warn!("Received detail text for unrequested record {}", record.id),
        }
    }
    log::debug!("Resolved notation for {} records", notations.len());
    Ok(notations)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::massbank::{MemoryClient, RecordInfo};

    #[test]
    fn test_extract() {
        let text = "ACCESSION: PR010001\nCH$NAME: Benzene\nCH$IUPAC: C1=CC=CC=C1\nCH$LINK: x\n";
        assert_eq!(extract_notation(text), "C1=CC=CC=C1");
        assert_eq!(extract_notation("CH$IUPAC: C1=CC=CC=C1\n"), "C1=CC=CC=C1");
        assert_eq!(extract_notation("CH$IUPAC: InChI=1S/CH4/h1H4\r\n"), "InChI=1S/CH4/h1H4");
    }

    #[test]
    fn test_extract_missing() {
        assert_eq!(extract_notation("CH$NAME: Benzene\n"), "");
        assert_eq!(extract_notation("CH$IUPAC: C1=CC=CC=C1"), "");
        assert_eq!(extract_notation(""), "");
    }

    #[test_log::test]
    fn test_resolve() {
        let client = MemoryClient::default()
            .with_record(RecordInfo::new("A", "CH$IUPAC: CCO\n"))
            .with_record(RecordInfo::new("B", "CH$NAME: nothing\n"));
        let ids: IndexSet<String> = ["A", "B", "C"].into_iter().map(String::from).collect();
        let notations = resolve_notations(&client, &ids).unwrap();
        assert_eq!(notations["A"], "CCO");
        assert_eq!(notations["B"], "");
        assert_eq!(notations["C"], "");
        assert_eq!(client.calls().record_info, 1);

        let empty = resolve_notations(&client, &IndexSet::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(client.calls().record_info, 1);
    }
}
