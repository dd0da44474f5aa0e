use serde::{Deserialize, Serialize};

/// Logistic function scaled by `amp`, squashes into `(0, amp)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    amp: f32,
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    // Expressed through the output, `exp(-z)` alone overflows for very negative `z`.
    pub fn df(&self, z: f32) -> f32 {
        let a = self.f(z);
        a * (self.amp - a) / self.amp
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn midpoint() {
        let sigmoid = Sigmoid::default();

        assert_eq!(sigmoid.f(0.), 0.5);
        assert_eq!(sigmoid.df(0.), 0.25);
    }

    #[test]
    fn saturates_without_nan() {
        let sigmoid = Sigmoid::default();

        for z in [-1e30, -500., 500., 1e30] {
            let (a, da) = (sigmoid.f(z), sigmoid.df(z));
            assert!((0. ..=1.).contains(&a), "f({z}) = {a}");
            assert!(da.is_finite() && da >= 0., "df({z}) = {da}");
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let sigmoid = Sigmoid::new(2.);
        let h = 1e-3;

        for z in [-2., -0.5, 0.3, 1.7] {
            let numeric = (sigmoid.f(z + h) - sigmoid.f(z - h)) / (2. * h);
            assert_abs_diff_eq!(sigmoid.df(z), numeric, epsilon = 1e-3);
        }
    }
}
