use crate::math_fixed::Fixed;

/// First order low-pass filter working on fixed-point samples.
pub struct FilterLPF {
    alpha: i64, // Filter coefficient (0..255 = 0.0..1.0), weight of the previous output
    output: Fixed,
}

impl FilterLPF {
    /// Constructor to initialize the filter with the input and alpha
    pub fn new(input_default: Fixed, alpha: u8) -> FilterLPF {
        FilterLPF {
            alpha: alpha as i64,
            output: input_default,
        }
    }

    /// Math call
    pub fn tick(&mut self, input: Fixed) -> Fixed {
        // LPF filter math: filtered = alpha * (prev - input) / 256 + input
        let current = input.to_bits() as i64;

        // Difference between previous output and current input
        let diff = self.output.to_bits() as i64 - current;

        // alpha = 0 passes the input through unchanged
        let filtered = ((diff * self.alpha) >> 8) + current;

        self.output = Fixed::from_bits(filtered as i32);
        self.output
    }

    /// Function to retrieve the output value
    pub fn get_output(&self) -> Fixed {
        self.output
    }

    /// Function to change the filter coefficient
    pub fn set_alpha(&mut self, alpha: u8) {
        self.alpha = alpha as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_fixed::fixed_int;

    #[test]
    fn zero_alpha_passes_through() {
        let mut lpf = FilterLPF::new(Fixed::ZERO, 0);
        assert_eq!(lpf.tick(fixed_int(1200)), fixed_int(1200));
    }

    #[test]
    fn converges_without_overshoot() {
        let mut lpf = FilterLPF::new(Fixed::ZERO, 128);
        let mut prev = Fixed::ZERO;
        for _ in 0..40 {
            let out = lpf.tick(fixed_int(1000));
            assert!(out >= prev);
            assert!(out <= fixed_int(1000));
            prev = out;
        }
        assert!(fixed_int(1000) - prev < fixed_int(1));
    }
}
