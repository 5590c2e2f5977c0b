//! Maps raw indicator values onto the shared [0, 1] scale.

use crate::config::Bounds;
use crate::domain::errors::ConfigError;

/// Clamp `raw` into the bounds, rescale to [0, 1], and flip when the
/// bounds are inverted. Degenerate bounds are a configuration error, never
/// a silent division by zero.
pub fn normalize(raw: f64, indicator: &str, bounds: &Bounds) -> Result<f64, ConfigError> {
    let (lower, upper) = if bounds.lower <= bounds.upper {
        (bounds.lower, bounds.upper)
    } else {
        (bounds.upper, bounds.lower)
    };
    if lower == upper {
        return Err(ConfigError::DegenerateBounds {
            indicator: indicator.to_string(),
            value: lower,
        });
    }

    let clamped = raw.clamp(lower, upper);
    let scaled = (clamped - lower) / (upper - lower);
    Ok(if bounds.invert { 1.0 - scaled } else { scaled })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_maps_to_half() {
        let b = Bounds::new(0.0, 10.0);
        assert_eq!(normalize(5.0, "x", &b).unwrap(), 0.5);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let b = Bounds::new(0.0, 10.0);
        assert_eq!(normalize(-100.0, "x", &b).unwrap(), 0.0);
        assert_eq!(normalize(100.0, "x", &b).unwrap(), 1.0);
    }

    #[test]
    fn inversion_flips_scale() {
        let b = Bounds::inverted(0.0, 10.0);
        assert_eq!(normalize(0.0, "x", &b).unwrap(), 1.0);
        assert_eq!(normalize(10.0, "x", &b).unwrap(), 0.0);
        assert_eq!(normalize(2.5, "x", &b).unwrap(), 0.75);
    }

    #[test]
    fn monotonic_within_bounds() {
        let b = Bounds::new(-5.0, 5.0);
        let mut prev = f64::MIN;
        for i in 0..=100 {
            let raw = -5.0 + 10.0 * i as f64 / 100.0;
            let v = normalize(raw, "x", &b).unwrap();
            assert!(v >= prev);
            assert!((0.0..=1.0).contains(&v));
            prev = v;
        }
    }

    #[test]
    fn degenerate_bounds_error() {
        let b = Bounds::new(3.0, 3.0);
        let err = normalize(1.0, "nupl", &b).unwrap_err();
        assert!(matches!(err, ConfigError::DegenerateBounds { .. }));
    }

    #[test]
    fn reversed_bounds_are_reordered() {
        let b = Bounds::new(10.0, 0.0);
        assert_eq!(normalize(5.0, "x", &b).unwrap(), 0.5);
        assert_eq!(normalize(10.0, "x", &b).unwrap(), 1.0);
    }
}
