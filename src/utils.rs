/// The mass of a proton in Daltons
pub const PROTON: f64 = 1.00727646677;

/// The smallest maximum intensity a spectrum is scaled against, so that an
/// all-zero spectrum never divides by zero.
pub const MIN_ABUNDANCE: f64 = f64::MIN_POSITIVE;

/// The upper end of the relative intensity scale used in queries
pub const RELATIVE_INTENSITY_SCALE: f64 = 1000.0;

/// Scale `intensity` onto `0..=1000` relative to `max_intensity`, flooring the
/// denominator at [`MIN_ABUNDANCE`].
#[inline]
pub fn relative_intensity(intensity: f64, max_intensity: f64) -> f64 {
    intensity * RELATIVE_INTENSITY_SCALE / max_intensity.max(MIN_ABUNDANCE)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_relative_intensity() {
        assert_eq!(relative_intensity(50.0, 100.0), 500.0);
        assert_eq!(relative_intensity(100.0, 100.0), 1000.0);
        assert_eq!(relative_intensity(0.0, 0.0), 0.0);
    }
}
