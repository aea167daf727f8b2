//! Tests for the exchange rate table
//!
//! Critical invariants tested:
//! - One strictly positive price per horizon day
//! - Same seed → same prices
//! - Lookups outside the horizon fail
//! - USD → sats → USD never loses a cent

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use txgen_core_rs::rates::{
    sats_to_usd_cents, usd_cents_to_sats, ExchangeRateEntry, RateWalkConfig,
};
use txgen_core_rs::{ExchangeRateTable, RateError, RngManager};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn table(seed: u64) -> ExchangeRateTable {
    let mut rng = RngManager::new(seed);
    ExchangeRateTable::generate(
        date(2024, 1, 1),
        date(2024, 12, 31),
        &RateWalkConfig::default(),
        &mut rng,
    )
    .unwrap()
}

#[test]
fn test_covers_every_day() {
    let rates = table(42);
    assert_eq!(rates.len(), 366);
    assert_eq!(rates.first_date(), date(2024, 1, 1));
    assert_eq!(rates.last_date(), date(2024, 12, 31));

    let mut day = rates.first_date();
    for entry in rates.entries() {
        assert_eq!(entry.date, day);
        day += Duration::days(1);
    }
}

#[test]
fn test_prices_within_bounds() {
    let config = RateWalkConfig::default();
    for seed in [1, 42, 999] {
        for entry in table(seed).entries() {
            assert!(entry.price_cents >= config.floor_price_cents);
            assert!(entry.price_cents <= config.ceiling_price_cents);
        }
    }
}

#[test]
fn test_same_seed_same_prices() {
    let a: Vec<_> = table(42).entries().collect();
    let b: Vec<_> = table(42).entries().collect();
    let c: Vec<_> = table(43).entries().collect();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_first_price_near_opening() {
    let rates = table(42);
    let opening = RateWalkConfig::default().opening_price_cents;
    let first = rates.rate_on(date(2024, 1, 1)).unwrap();
    // Within the ±5% daily jitter
    assert!(first >= opening * 95 / 100 && first <= opening * 105 / 100);
}

#[test]
fn test_lookup_outside_horizon_fails() {
    let rates = table(42);
    let err = rates.rate_on(date(2025, 1, 1)).unwrap_err();
    assert_eq!(
        err,
        RateError::NotFound {
            date: date(2025, 1, 1),
            first: date(2024, 1, 1),
            last: date(2024, 12, 31),
        }
    );
    assert!(rates.rate_on(date(2023, 12, 31)).is_err());
}

#[test]
fn test_flat_walk_stays_flat() {
    let config = RateWalkConfig {
        jitter_bps: 0,
        drift_min_bps: 0,
        drift_max_bps: 0,
        ..RateWalkConfig::default()
    };
    let mut rng = RngManager::new(5);
    let rates =
        ExchangeRateTable::generate(date(2024, 1, 1), date(2024, 1, 10), &config, &mut rng)
            .unwrap();
    assert!(rates
        .entries()
        .all(|e| e.price_cents == config.opening_price_cents));
}

#[test]
fn test_from_entries_round_trip() {
    let original = table(42);
    let entries: Vec<ExchangeRateEntry> = original.entries().collect();
    let rebuilt = ExchangeRateTable::from_entries(&entries).unwrap();
    assert_eq!(rebuilt, original);
}

#[test]
fn test_conversion_helpers_use_date_rate() {
    let entries = [
        ExchangeRateEntry {
            date: date(2024, 1, 1),
            price_cents: 5_000_000,
        },
        ExchangeRateEntry {
            date: date(2024, 1, 2),
            price_cents: 10_000_000,
        },
    ];
    let rates = ExchangeRateTable::from_entries(&entries).unwrap();
    // $1,000 at $50,000 and $100,000 per BTC
    assert_eq!(rates.usd_to_sats(100_000, date(2024, 1, 1)).unwrap(), 2_000_000);
    assert_eq!(rates.usd_to_sats(100_000, date(2024, 1, 2)).unwrap(), 1_000_000);
    assert_eq!(rates.sats_to_usd(1_000_000, date(2024, 1, 2)).unwrap(), 100_000);
}

proptest! {
    #[test]
    fn prop_usd_survives_conversion(
        usd_cents in 1i64..1_000_000_000,
        rate_cents in 100_000i64..=50_000_000,
    ) {
        let sats = usd_cents_to_sats(usd_cents, rate_cents).unwrap();
        prop_assert_eq!(sats_to_usd_cents(sats, rate_cents).unwrap(), usd_cents);
    }
}
