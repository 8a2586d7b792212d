//! Moon-phase index from elapsed time since a reference new moon.
//!
//! Mean-synodic-month model: no perturbation terms, so the result can drift
//! from the true phase by up to about half a day. That is well inside one
//! bucket (≈1.23 days), which is all the watch face needs.
//!
//! The cycle is split into 25 buckets. Bucket 0 and bucket 24 are both a
//! new moon: rounding the fractional phase to the nearest bucket sends the
//! last half-bucket of a cycle to 24 instead of wrapping it back to 0, so the
//! asset set carries a duplicate new-moon image at the end.

use chrono::{Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;

/// Milliseconds in one civil day.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Mean synodic month length in days.
pub const SYNODIC_PERIOD_DAYS: f64 = 29.530_587_705_76;

/// Number of discrete phase buckets (one full cycle, new moon at both ends).
pub const PHASE_BUCKETS: u8 = 25;

/// Highest valid bucket index.
pub const LAST_BUCKET: u8 = PHASE_BUCKETS - 1;

/// Discretised position within one lunar cycle, `0..=24`.
pub type PhaseIndex = u8;

/// Fixed reference new moon plus the cycle length it repeats with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonPhaseReference {
    /// Reference new moon as Unix milliseconds.
    pub epoch_ms: i64,
    /// Cycle length in days.
    pub synodic_days: f64,
}

impl MoonPhaseReference {
    pub const fn new(epoch_ms: i64, synodic_days: f64) -> Self {
        Self {
            epoch_ms,
            synodic_days,
        }
    }

    /// 2022-01-02 18:35 read as UTC wall-clock time.
    pub fn utc() -> Self {
        Self::new(reference_wall_clock_ms(), SYNODIC_PERIOD_DAYS)
    }

    /// 2022-01-02 18:35 read in the local time zone, as the watch does.
    pub fn local() -> Self {
        let wall_ms = reference_wall_clock_ms();
        let offset_ms = NaiveDate::from_ymd_opt(2022, 1, 2)
            .and_then(|d| d.and_hms_opt(18, 35, 0))
            .and_then(|naive| Local.offset_from_local_datetime(&naive).earliest())
            .map(|offset| i64::from(offset.local_minus_utc()) * 1000)
            .unwrap_or(0);
        Self::new(wall_ms - offset_ms, SYNODIC_PERIOD_DAYS)
    }

    /// Length of one cycle in milliseconds.
    pub fn period_ms(&self) -> f64 {
        self.synodic_days * MS_PER_DAY
    }
}

impl Default for MoonPhaseReference {
    fn default() -> Self {
        Self::local()
    }
}

/// Unix milliseconds of 2022-01-02 18:35:00 taken as if it were UTC.
fn reference_wall_clock_ms() -> i64 {
    Utc.with_ymd_and_hms(2022, 1, 2, 18, 35, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(1_641_148_500_000)
}

/// Coarse phase names, one per eighth of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    New,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    Full,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl PhaseName {
    pub fn label(self) -> &'static str {
        match self {
            PhaseName::New => "new moon",
            PhaseName::WaxingCrescent => "waxing crescent",
            PhaseName::FirstQuarter => "first quarter",
            PhaseName::WaxingGibbous => "waxing gibbous",
            PhaseName::Full => "full moon",
            PhaseName::WaningGibbous => "waning gibbous",
            PhaseName::LastQuarter => "last quarter",
            PhaseName::WaningCrescent => "waning crescent",
        }
    }

    fn from_fraction(fraction: f64) -> Self {
        // Same round-to-nearest rule as the bucket, on an 8-step scale.
        match ((fraction * 8.0) + 0.5).floor() as u8 & 7 {
            0 => PhaseName::New,
            1 => PhaseName::WaxingCrescent,
            2 => PhaseName::FirstQuarter,
            3 => PhaseName::WaxingGibbous,
            4 => PhaseName::Full,
            5 => PhaseName::WaningGibbous,
            6 => PhaseName::LastQuarter,
            _ => PhaseName::WaningCrescent,
        }
    }
}

/// Everything derivable from one evaluation of the phase model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonPhase {
    /// Asset bucket, `0..=24`.
    pub bucket: PhaseIndex,
    /// Position within the cycle, `[0, 1)`.
    pub fraction: f64,
    /// Days since the last new moon.
    pub age_days: f64,
    /// Illuminated fraction, linear proxy (0 = new, 1 = full).
    pub illumination: f64,
    pub name: PhaseName,
}

/// Fractional part that stays in `[0, 1)` for negative inputs too.
fn frac(v: f64) -> f64 {
    let f = v - v.floor();
    // `v - floor(v)` can round up to exactly 1.0 for tiny negative v.
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// Position within the current cycle, `[0, 1)`.
pub fn cycle_fraction(now_ms: i64, reference: &MoonPhaseReference) -> f64 {
    // Subtract as floats; the i64 difference overflows near the ends of the range.
    let elapsed_days = (now_ms as f64 - reference.epoch_ms as f64) / MS_PER_DAY;
    frac(elapsed_days / reference.synodic_days)
}

/// Map a cycle fraction onto an asset bucket, rounding to nearest.
pub fn bucket_for_fraction(fraction: f64) -> PhaseIndex {
    let scaled = (fraction * f64::from(LAST_BUCKET) + 0.5).floor();
    scaled.clamp(0.0, f64::from(LAST_BUCKET)) as PhaseIndex
}

/// Phase bucket for `now_ms` (Unix milliseconds).
pub fn phase_bucket(now_ms: i64, reference: &MoonPhaseReference) -> PhaseIndex {
    bucket_for_fraction(cycle_fraction(now_ms, reference))
}

/// Full phase report for `now_ms`.
pub fn moon_phase(now_ms: i64, reference: &MoonPhaseReference) -> MoonPhase {
    let fraction = cycle_fraction(now_ms, reference);
    let age_days = fraction * reference.synodic_days;
    let half = reference.synodic_days / 2.0;
    let illumination = (1.0 - (age_days - half).abs() / half).clamp(0.0, 1.0);

    MoonPhase {
        bucket: bucket_for_fraction(fraction),
        fraction,
        age_days,
        illumination,
        name: PhaseName::from_fraction(fraction),
    }
}
