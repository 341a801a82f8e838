/// The unit a mass tolerance is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MassErrorType {
    /// An absolute error in Daltons
    Exact,
    /// A relative error in parts-per-million of the reference mass
    #[default]
    PPM,
}

impl MassErrorType {
    /// The lowest value that lies within `tolerance` of `query`
    pub fn lower_bound(&self, query: f64, tolerance: f64) -> f64 {
        match self {
            Self::Exact => query - tolerance,
            Self::PPM => query - (query * tolerance / 1e6),
        }
    }

    /// The error of `query` measured against the reference value `alt`
    pub fn call(&self, query: f64, alt: f64) -> f64 {
        match self {
            Self::Exact => query - alt,
            Self::PPM => (query - alt) / alt * 1e6,
        }
    }

    /// The highest value that lies within `tolerance` of `query`
    pub fn upper_bound(&self, query: f64, tolerance: f64) -> f64 {
        match self {
            Self::Exact => query + tolerance,
            Self::PPM => query + (query * tolerance / 1e6),
        }
    }

    /// Whether `value` falls within the closed window `tolerance` around `center`
    pub fn contains(&self, center: f64, tolerance: f64, value: f64) -> bool {
        self.lower_bound(center, tolerance) <= value && value <= self.upper_bound(center, tolerance)
    }

    /// The unit label the remote service expects
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Exact => "unit",
            Self::PPM => "ppm",
        }
    }
}
