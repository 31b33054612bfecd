/// Binary size units, each 1024 times the previous one.
const UNITS: &[&str] = &["b", "kb", "mb", "gb", "tb", "pb", "eb"];
const THRESHOLD: f64 = 1024.0;

/// Round half away from zero at the given number of decimal places.
///
/// `round(2.5, 0) == 3.0` and `round(-2.5, 0) == -3.0`; ties never go to even.
pub fn round(value: f64, precision: i32) -> f64 {
    let pow = 10f64.powi(precision);
    let digit = value.abs() * pow;
    let fraction = digit - digit.trunc();

    let rounded = if fraction >= 0.5 {
        digit.ceil()
    } else {
        digit.floor()
    };

    (rounded / pow).copysign(value)
}

/// Position of a unit on the b..eb ladder. Unknown units rank like bytes.
fn rank(unit: &str) -> i32 {
    let unit = unit.to_lowercase();
    UNITS.iter().position(|u| *u == unit).unwrap_or(0) as i32
}

/// Convert `value` between two binary units and round to 2 decimals.
pub fn convert_bin_unit(value: f64, from: &str, to: &str) -> f64 {
    let from_rank = rank(from);
    let to_rank = rank(to);
    let factor = THRESHOLD.powi((from_rank - to_rank).abs());

    let converted = if from_rank < to_rank {
        value / factor
    } else {
        value * factor
    };

    round(converted, 2)
}

/// Format a value already expressed in `unit`, e.g. `"10.5 GB"`.
pub fn format_size(value: f64, unit: &str) -> String {
    format!("{} {}", round(value, 2), unit.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_ties_go_away_from_zero() {
        assert_eq!(round(2.5, 0), 3.0);
        assert_eq!(round(-2.5, 0), -3.0);
        assert_eq!(round(2.4, 0), 2.0);
        assert_eq!(round(-2.4, 0), -2.0);
        assert_eq!(round(1.005, 1), 1.0);
        assert_eq!(round(12.3456, 2), 12.35);
        assert_eq!(round(0.0, 2), 0.0);
    }

    #[test]
    fn converts_along_the_unit_ladder() {
        assert_eq!(convert_bin_unit(1024.0, "kb", "mb"), 1.0);
        assert_eq!(convert_bin_unit(10.0, "kb", "kb"), 10.0);
        assert_eq!(convert_bin_unit(10_485_760.0, "kb", "gb"), 10.0);
        assert_eq!(convert_bin_unit(1.0, "gb", "mb"), 1024.0);
        assert_eq!(convert_bin_unit(1536.0, "b", "kb"), 1.5);
    }

    #[test]
    fn unknown_units_rank_as_bytes() {
        assert_eq!(convert_bin_unit(2048.0, "bogus", "kb"), 2.0);
        assert_eq!(convert_bin_unit(2.0, "kb", "nope"), 2048.0);
    }

    #[test]
    fn conversion_rounds_to_two_decimals() {
        assert_eq!(convert_bin_unit(1000.0, "kb", "mb"), 0.98);
    }

    proptest! {
        #[test]
        fn rounding_is_symmetric_around_zero(value in -1.0e6f64..1.0e6, precision in 0i32..4) {
            prop_assert_eq!(round(-value, precision), -round(value, precision));
        }

        #[test]
        fn rounding_moves_at_most_half_a_step(value in -1.0e6f64..1.0e6, precision in 0i32..4) {
            let step = 10f64.powi(-precision);
            prop_assert!((round(value, precision) - value).abs() <= step / 2.0 + 1e-9);
        }
    }
}
