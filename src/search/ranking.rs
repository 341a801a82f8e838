//! Ordering the candidate hits of one query.
use thiserror::Error;

use crate::io::RawHit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Record {record}: failed to read {field} from {value:?}")]
pub struct HitParseError {
    pub record: String,
    pub field: &'static str,
    pub value: String,
}

fn parse_field(hit: &RawHit, field: &'static str, value: &str) -> Result<f64, HitParseError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| HitParseError {
            record: hit.id.clone(),
            field,
            value: value.to_string(),
        })
}

/// A [`RawHit`] with its score decoded
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub score: f64,
    pub hit: RawHit,
}

impl RankedHit {
    pub fn new(hit: RawHit) -> Result<Self, HitParseError> {
        let score = parse_field(&hit, "score", &hit.score)?;
        Ok(Self { score, hit })
    }

    /// The neutral exact mass of the matched compound
    pub fn exact_mass(&self) -> Result<f64, HitParseError> {
        parse_field(&self.hit, "exactMass", &self.hit.exact_mass)
    }
}

/// Order `hits` by descending score. Hits with equal scores keep their relative
/// order. Any hit whose score is not a finite number fails the whole ranking.
pub fn rank_hits(hits: Vec<RawHit>) -> Result<Vec<RankedHit>, HitParseError> {
    let mut ranked = hits
        .into_iter()
        .map(RankedHit::new)
        .collect::<Result<Vec<_>, _>>()?;
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}
