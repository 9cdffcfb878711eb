use super::{div_round, saturate_bits, Fixed, PERCENT_100};

/// Converts a percent of full scale to a physical value (rpm, amperes, volts...).
///
/// # Arguments
/// * `percent` - Share of full scale, 0..100 for the positive range
/// * `full_scale` - Physical value matching 100 %
///
/// # Returns
/// The physical value, rounded half-up and saturated to the fixed-point range
pub fn percent_to_value(percent: Fixed, full_scale: Fixed) -> Fixed {
    // (percent * full_scale) / 100 evaluated on raw bits to avoid overflow
    let product = percent.to_bits() as i64 * full_scale.to_bits() as i64;
    saturate_bits(div_round(product, PERCENT_100.to_bits() as i64))
}

/// Converts a physical value to a percent of full scale.
///
/// # Arguments
/// * `value` - Physical value (rpm, amperes, volts...)
/// * `full_scale` - Physical value matching 100 %, must be positive
///
/// # Returns
/// Percent of full scale; a non-positive full scale yields 0
pub fn value_to_percent(value: Fixed, full_scale: Fixed) -> Fixed {
    if full_scale <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let product = value.to_bits() as i64 * PERCENT_100.to_bits() as i64;
    saturate_bits(div_round(product, full_scale.to_bits() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_fixed::fixed_int;

    #[test]
    fn percent_of_nominal_speed() {
        assert_eq!(percent_to_value(fixed_int(25), fixed_int(1500)), fixed_int(375));
        assert_eq!(percent_to_value(fixed_int(100), fixed_int(3000)), fixed_int(3000));
    }

    #[test]
    fn value_back_to_percent() {
        assert_eq!(value_to_percent(fixed_int(750), fixed_int(1500)), fixed_int(50));
        assert_eq!(value_to_percent(fixed_int(-150), fixed_int(1500)), fixed_int(-10));
        assert_eq!(value_to_percent(fixed_int(10), Fixed::ZERO), Fixed::ZERO);
    }
}
