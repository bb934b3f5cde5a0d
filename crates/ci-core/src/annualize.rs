//! Annualization of per-period returns and interval bounds.
//!
//! The transform is the stable geometric compounding `(1 + r)^K − 1`,
//! evaluated as `exp(K · log1p(r)) − 1` with guards around ruin: inputs at or
//! below −1 are clamped just above it, and a result that underflows to −1 is
//! bumped so the annualized value stays strictly greater than −1 on the
//! decimal grid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{consts, dec, quantize, to_f64, Decimal};
use crate::error::CoreError;
use crate::traits::IntradayBarDuration;

/// Clamp distance above −1 applied to inputs.
pub const RUIN_CLAMP_EPS: f64 = 1e-12;
/// Bump applied when the transform lands at or below −1.
pub const RUIN_BUMP: f64 = 1e-7;

/// Bar timeframe for annualization-factor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Intraday,
}

/// Periods per year for a timeframe, using market conventions of 252 trading
/// days and 6.5 trading hours per day.
pub fn annualization_factor(
    timeframe: Timeframe,
    intraday_minutes_per_bar: u32,
) -> Result<f64, CoreError> {
    annualization_factor_with(timeframe, intraday_minutes_per_bar, 252.0, 6.5)
}

/// Periods per year with explicit calendar parameters.
pub fn annualization_factor_with(
    timeframe: Timeframe,
    intraday_minutes_per_bar: u32,
    trading_days_per_year: f64,
    trading_hours_per_day: f64,
) -> Result<f64, CoreError> {
    match timeframe {
        Timeframe::Daily => Ok(trading_days_per_year),
        Timeframe::Weekly => Ok(52.0),
        Timeframe::Monthly => Ok(12.0),
        Timeframe::Quarterly => Ok(4.0),
        Timeframe::Yearly => Ok(1.0),
        Timeframe::Intraday => {
            if intraday_minutes_per_bar == 0 {
                return Err(CoreError::InvalidArgument(
                    "annualization_factor(Intraday): minutes per bar must be specified".into(),
                ));
            }
            let bars_per_hour = 60.0 / intraday_minutes_per_bar as f64;
            if !(bars_per_hour > 0.0) || !(trading_days_per_year > 0.0) || !(trading_hours_per_day > 0.0)
            {
                return Err(CoreError::InvalidArgument(
                    "annualization inputs must be positive finite values".into(),
                ));
            }
            Ok(trading_hours_per_day * bars_per_hour * trading_days_per_year)
        }
    }
}

/// Factor lookup that pulls intraday bar duration from the series itself.
pub fn annualization_factor_for_series<S: IntradayBarDuration>(
    timeframe: Timeframe,
    series: &S,
) -> Result<f64, CoreError> {
    let minutes = if timeframe == Timeframe::Intraday {
        series.intraday_minutes_per_bar()
    } else {
        0
    };
    annualization_factor(timeframe, minutes)
}

/// Participation-weighted effective factor: `max(1, trades · hold_bars)`.
pub fn effective_annualization_factor(
    annualized_trades: f64,
    median_hold_bars: u32,
    base_factor: f64,
) -> f64 {
    let k_eff = (annualized_trades * median_hold_bars as f64).max(1.0);
    let participation = if base_factor > 0.0 {
        k_eff / base_factor
    } else {
        1.0
    };
    debug!(
        base = base_factor,
        effective = k_eff,
        participation,
        "effective annualization factor"
    );
    k_eff
}

/// An annualized (lower, mean, upper) triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub lower: Decimal,
    pub mean: Decimal,
    pub upper: Decimal,
}

/// Annualize a single per-period return to `k` periods.
pub fn annualize_one(r: Decimal, k: f64) -> Result<Decimal, CoreError> {
    if !(k > 0.0) || !k.is_finite() {
        return Err(CoreError::InvalidArgument(
            "annualize_one: K must be positive and finite".into(),
        ));
    }
    let r_clip = to_f64(r).max(-1.0 + RUIN_CLAMP_EPS);
    let mut y = (k * r_clip.ln_1p()).exp_m1();
    if y <= -1.0 {
        y = -1.0 + RUIN_BUMP;
    }
    Ok(quantize(dec(y)))
}

/// Annualize (lower, mean, upper) together; the transform is monotone, so
/// ordering is preserved.
pub fn annualize_triplet(
    lower: Decimal,
    mean: Decimal,
    upper: Decimal,
    k: f64,
) -> Result<Triplet, CoreError> {
    Ok(Triplet {
        lower: annualize_one(lower, k)?,
        mean: annualize_one(mean, k)?,
        upper: annualize_one(upper, k)?,
    })
}

/// Exact inverse of [`annualize_one`]: `r = exp(log1p(R)/K) − 1`.
pub fn deannualize_one(annualized: Decimal, k: f64) -> Result<Decimal, CoreError> {
    if !(k > 0.0) || !k.is_finite() {
        return Err(CoreError::InvalidArgument(
            "deannualize_one: K must be positive and finite".into(),
        ));
    }
    let clamped = to_f64(annualized).max(-1.0 + RUIN_CLAMP_EPS);
    let mut r = (clamped.ln_1p() / k).exp_m1();
    if r <= -1.0 {
        r = -1.0 + RUIN_BUMP;
    }
    Ok(quantize(dec(r)))
}

/// De-annualize a triplet back to per-period scale.
pub fn deannualize_triplet(t: &Triplet, k: f64) -> Result<Triplet, CoreError> {
    Ok(Triplet {
        lower: deannualize_one(t.lower, k)?,
        mean: deannualize_one(t.mean, k)?,
        upper: deannualize_one(t.upper, k)?,
    })
}

/// Convenience guard used by tests and callers that assert ruin safety.
pub fn is_above_ruin(d: Decimal) -> bool {
    d > consts::MINUS_ONE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_factor_compounds() {
        let k = annualization_factor(Timeframe::Daily, 0).unwrap();
        let ann = annualize_one(dec(0.001), k).unwrap();
        let expected = (1.001f64).powi(252) - 1.0;
        assert!((to_f64(ann) - expected).abs() < 1e-8);
        assert!((expected - 0.28639).abs() < 1e-4);
    }

    #[test]
    fn triplet_preserves_ordering() {
        let t = annualize_triplet(dec(-0.01), dec(0.003), dec(0.02), 252.0).unwrap();
        assert!(t.lower < t.mean);
        assert!(t.mean < t.upper);
        assert_eq!(t.lower, annualize_one(dec(-0.01), 252.0).unwrap());
        assert_eq!(t.upper, annualize_one(dec(0.02), 252.0).unwrap());
    }

    #[test]
    fn round_trips_within_quantization() {
        // Near ruin the 8-dp grid keeps few significant digits of (1 + R),
        // which the 1/K root amplifies; the tolerance covers that.
        for &r in &[-0.05, -0.001, 0.0, 0.0007, 0.01, 0.2] {
            let ann = annualize_one(dec(r), 252.0).unwrap();
            let back = deannualize_one(ann, 252.0).unwrap();
            assert!(
                (to_f64(back) - r).abs() < 1e-4,
                "round trip drifted: r={} back={}",
                r,
                to_f64(back)
            );
        }
    }

    #[test]
    fn stays_above_ruin() {
        let ann = annualize_one(dec(-0.9999), 252.0).unwrap();
        assert!(is_above_ruin(ann));

        let clamped = annualize_one(dec(-1.5), 12.0).unwrap();
        assert!(is_above_ruin(clamped));
    }

    #[test]
    fn invalid_k_rejected() {
        assert!(annualize_one(dec(0.01), 0.0).is_err());
        assert!(annualize_one(dec(0.01), f64::NAN).is_err());
        assert!(deannualize_one(dec(0.01), -1.0).is_err());
    }

    #[test]
    fn intraday_requires_bar_minutes() {
        assert!(annualization_factor(Timeframe::Intraday, 0).is_err());
        let k = annualization_factor(Timeframe::Intraday, 30).unwrap();
        // 6.5 hours * 2 bars/hour * 252 days
        assert!((k - 3276.0).abs() < 1e-9);
    }

    #[test]
    fn series_supplies_intraday_bar_minutes() {
        struct ThirtyMinuteSeries;
        impl IntradayBarDuration for ThirtyMinuteSeries {
            fn intraday_minutes_per_bar(&self) -> u32 {
                30
            }
        }

        let k = annualization_factor_for_series(Timeframe::Intraday, &ThirtyMinuteSeries).unwrap();
        assert!((k - 3276.0).abs() < 1e-9);

        // Non-intraday timeframes ignore the series entirely.
        let k = annualization_factor_for_series(Timeframe::Weekly, &ThirtyMinuteSeries).unwrap();
        assert_eq!(k, 52.0);
    }

    #[test]
    fn effective_factor_floors_at_one() {
        assert_eq!(effective_annualization_factor(0.0, 5, 252.0), 1.0);
        assert_eq!(effective_annualization_factor(20.0, 6, 252.0), 120.0);
    }
}
