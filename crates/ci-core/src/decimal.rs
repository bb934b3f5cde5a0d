//! Fixed-precision numeric façade.
//!
//! All interval bounds, point estimates, and annualized values cross the API
//! boundary as `rust_decimal::Decimal`, quantized to an 8-decimal-place grid.
//! Internal bootstrap arithmetic runs in `f64` and converts at the edges.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
pub use rust_decimal::Decimal;

/// Quantization grid for values crossing the API boundary.
pub const QUANTIZE_DP: u32 = 8;

/// Domain constants used throughout the interval math.
pub mod consts {
    use rust_decimal::Decimal;

    pub const MINUS_ONE: Decimal = Decimal::NEGATIVE_ONE;
    pub const ZERO: Decimal = Decimal::ZERO;
    pub const ONE: Decimal = Decimal::ONE;
    pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
}

/// Convert an `f64` into the decimal domain.
///
/// Non-finite inputs collapse to zero; callers are expected to have filtered
/// non-finite replicate statistics before reaching the boundary.
pub fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(consts::ZERO)
}

/// Convert a decimal back into `f64` for internal arithmetic.
pub fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Round onto the 8-dp quantization grid. Equality on quantized values is
/// exact.
pub fn quantize(d: Decimal) -> Decimal {
    d.round_dp(QUANTIZE_DP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec as d;

    #[test]
    fn quantize_is_exact_on_grid() {
        let a = quantize(dec(0.123456789123));
        let b = quantize(dec(0.123456789456));
        assert_eq!(a, b);
        assert_eq!(a, d!(0.12345679));
    }

    #[test]
    fn non_finite_collapses_to_zero() {
        assert_eq!(dec(f64::NAN), consts::ZERO);
        assert_eq!(dec(f64::INFINITY), consts::ZERO);
    }

    #[test]
    fn domain_constants() {
        assert_eq!(to_f64(consts::MINUS_ONE), -1.0);
        assert_eq!(to_f64(consts::HUNDRED), 100.0);
    }
}
