//! BTC/USD exchange rate table
//!
//! One price per horizon day, generated by a seeded random walk:
//!
//! ```text
//! For each day d:
//! 1. published(d) = trend × (1 + jitter),  jitter ∈ [-jitter_bps, +jitter_bps]
//! 2. trend        = trend × (1 + drift),   drift  ∈ [drift_min_bps, drift_max_bps]
//! 3. both clamped into [floor_price_cents, ceiling_price_cents]
//! ```
//!
//! # Critical Invariants
//!
//! 1. Prices are i64 cents per whole BTC and strictly positive
//! 2. Every date of the horizon has exactly one entry
//! 3. Lookups outside the horizon fail; there is no nearest-date fallback

use crate::rng::RngManager;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Satoshis per BTC
pub const SATS_PER_BTC: i64 = 100_000_000;

const BPS_SCALE: i64 = 10_000;

/// Parameters of the daily price walk (bps = basis points, 1/100 of a percent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateWalkConfig {
    /// Trend level on the first day (cents per BTC)
    pub opening_price_cents: i64,

    /// Maximum daily deviation of the published price from the trend
    pub jitter_bps: i64,

    /// Lower bound of the daily trend drift
    pub drift_min_bps: i64,

    /// Upper bound of the daily trend drift
    pub drift_max_bps: i64,

    /// Lowest price the walk may publish (cents)
    pub floor_price_cents: i64,

    /// Highest price the walk may publish (cents)
    pub ceiling_price_cents: i64,
}

impl Default for RateWalkConfig {
    fn default() -> Self {
        Self {
            opening_price_cents: 5_900_000, // $59,000
            jitter_bps: 500,                // ±5%
            drift_min_bps: -200,            // -2%
            drift_max_bps: 300,             // +3%
            floor_price_cents: 100_000,     // $1,000
            ceiling_price_cents: 50_000_000, // $500,000
        }
    }
}

impl RateWalkConfig {
    pub fn validate(&self) -> Result<(), RateError> {
        if self.floor_price_cents <= 0 {
            return Err(RateError::InvalidConfig(
                "floor_price_cents must be > 0".to_string(),
            ));
        }
        if self.ceiling_price_cents < self.floor_price_cents {
            return Err(RateError::InvalidConfig(
                "ceiling_price_cents must be >= floor_price_cents".to_string(),
            ));
        }
        if self.opening_price_cents < self.floor_price_cents
            || self.opening_price_cents > self.ceiling_price_cents
        {
            return Err(RateError::InvalidConfig(format!(
                "opening price {} outside [{}, {}]",
                self.opening_price_cents, self.floor_price_cents, self.ceiling_price_cents
            )));
        }
        if !(0..BPS_SCALE).contains(&self.jitter_bps) {
            return Err(RateError::InvalidConfig(
                "jitter_bps must be in [0, 10000)".to_string(),
            ));
        }
        if self.drift_min_bps > self.drift_max_bps || self.drift_min_bps <= -BPS_SCALE {
            return Err(RateError::InvalidConfig(format!(
                "invalid drift range [{}, {}]",
                self.drift_min_bps, self.drift_max_bps
            )));
        }
        Ok(())
    }

    fn clamp(&self, price: i64) -> i64 {
        price.clamp(self.floor_price_cents, self.ceiling_price_cents)
    }
}

/// One published daily price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRateEntry {
    pub date: NaiveDate,
    pub price_cents: i64,
}

/// Exchange rate lookup/construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("no exchange rate for {date}: table covers {first}..={last}")]
    NotFound {
        date: NaiveDate,
        first: NaiveDate,
        last: NaiveDate,
    },

    #[error("invalid exchange rate table: {0}")]
    InvalidConfig(String),

    #[error("rate must be positive, got {0} cents")]
    NonPositiveRate(i64),

    #[error("converting {amount} at {rate_cents} cents/BTC overflows i64")]
    ConversionOverflow { amount: i64, rate_cents: i64 },
}

/// Date-indexed BTC/USD price series
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use txgen_core_rs::rates::{ExchangeRateTable, RateWalkConfig};
/// use txgen_core_rs::RngManager;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// let mut rng = RngManager::new(42);
/// let table = ExchangeRateTable::generate(start, end, &RateWalkConfig::default(), &mut rng).unwrap();
///
/// assert_eq!(table.len(), 31);
/// assert!(table.rate_on(start).unwrap() > 0);
/// assert!(table.rate_on(end.succ_opt().unwrap()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRateTable {
    first_date: NaiveDate,
    prices: Vec<i64>,
}

impl ExchangeRateTable {
    /// Generate one entry per day across `start..=end`
    pub fn generate(
        start: NaiveDate,
        end: NaiveDate,
        config: &RateWalkConfig,
        rng: &mut RngManager,
    ) -> Result<Self, RateError> {
        config.validate()?;
        if end < start {
            return Err(RateError::InvalidConfig(format!(
                "horizon end {} precedes start {}",
                end, start
            )));
        }

        let num_days = (end - start).num_days() + 1;
        let mut prices = Vec::with_capacity(num_days as usize);
        let mut trend = config.opening_price_cents;

        for _ in 0..num_days {
            let jitter = rng.range_inclusive(-config.jitter_bps, config.jitter_bps);
            prices.push(config.clamp(apply_bps(trend, jitter)));

            let drift = rng.range_inclusive(config.drift_min_bps, config.drift_max_bps);
            trend = config.clamp(apply_bps(trend, drift));
        }

        Ok(Self {
            first_date: start,
            prices,
        })
    }

    /// Build a table from explicit entries (consecutive days, positive prices)
    pub fn from_entries(entries: &[ExchangeRateEntry]) -> Result<Self, RateError> {
        let first = entries
            .first()
            .ok_or_else(|| RateError::InvalidConfig("no entries".to_string()))?;

        let mut prices = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let expected = first.date + Duration::days(i as i64);
            if entry.date != expected {
                return Err(RateError::InvalidConfig(format!(
                    "entry {} has date {}, expected {}",
                    i, entry.date, expected
                )));
            }
            if entry.price_cents <= 0 {
                return Err(RateError::InvalidConfig(format!(
                    "non-positive price on {}",
                    entry.date
                )));
            }
            prices.push(entry.price_cents);
        }

        Ok(Self {
            first_date: first.date,
            prices,
        })
    }

    /// Price in cents per BTC on `date`
    pub fn rate_on(&self, date: NaiveDate) -> Result<i64, RateError> {
        let offset = (date - self.first_date).num_days();
        if offset < 0 || offset as usize >= self.prices.len() {
            return Err(RateError::NotFound {
                date,
                first: self.first_date,
                last: self.last_date(),
            });
        }
        Ok(self.prices[offset as usize])
    }

    /// Satoshis needed to cover `usd_cents` at the rate of `date` (rounded up)
    pub fn usd_to_sats(&self, usd_cents: i64, date: NaiveDate) -> Result<i64, RateError> {
        usd_cents_to_sats(usd_cents, self.rate_on(date)?)
    }

    /// USD cents worth of `sats` at the rate of `date` (rounded down)
    pub fn sats_to_usd(&self, sats: i64, date: NaiveDate) -> Result<i64, RateError> {
        sats_to_usd_cents(sats, self.rate_on(date)?)
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.first_date + Duration::days(self.prices.len() as i64 - 1)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Entries in date order
    pub fn entries(&self) -> impl Iterator<Item = ExchangeRateEntry> + '_ {
        self.prices
            .iter()
            .enumerate()
            .map(move |(i, &price_cents)| ExchangeRateEntry {
                date: self.first_date + Duration::days(i as i64),
                price_cents,
            })
    }
}

/// Ceiling conversion so that re-valuing the result never undershoots `usd_cents`
pub fn usd_cents_to_sats(usd_cents: i64, rate_cents: i64) -> Result<i64, RateError> {
    if rate_cents <= 0 {
        return Err(RateError::NonPositiveRate(rate_cents));
    }
    let numerator = usd_cents as i128 * SATS_PER_BTC as i128;
    let rate = rate_cents as i128;
    i64::try_from((numerator + rate - 1).div_euclid(rate)).map_err(|_| {
        RateError::ConversionOverflow {
            amount: usd_cents,
            rate_cents,
        }
    })
}

/// Floor conversion of satoshis to USD cents
pub fn sats_to_usd_cents(sats: i64, rate_cents: i64) -> Result<i64, RateError> {
    if rate_cents <= 0 {
        return Err(RateError::NonPositiveRate(rate_cents));
    }
    let cents = (sats as i128 * rate_cents as i128).div_euclid(SATS_PER_BTC as i128);
    i64::try_from(cents).map_err(|_| RateError::ConversionOverflow {
        amount: sats,
        rate_cents,
    })
}

/// Scale by (1 + bps / 10,000), saturating at the i64 bounds
fn apply_bps(value: i64, bps: i64) -> i64 {
    let scaled = value as i128 * (BPS_SCALE + bps) as i128 / BPS_SCALE as i128;
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
