//! Calendar and event scheduling
//!
//! The simulated chain produces one block every `block_interval_secs`
//! starting at midnight of the first horizon day. Heights are always derived
//! from time (never the reverse), so a later timestamp can never carry a
//! lower height.
//!
//! Scheduling works in block space: a window of N blocks can host at most N
//! events with strictly increasing heights. Asking for more is a
//! configuration error reported before anything touches the ledger.

use crate::rng::RngManager;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

const SECONDS_PER_DAY: u64 = 86_400;

/// Block-production parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Height of the first block of the horizon
    pub genesis_height: u64,

    /// Average block time in seconds (must divide a day evenly)
    pub block_interval_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            genesis_height: 100,
            block_interval_secs: 600,
        }
    }
}

/// How events are spread across a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacingPolicy {
    /// n distinct blocks drawn uniformly, then sorted
    UniformRandom,

    /// Window split into n equal periods, one event on the last block of each
    FixedInterval,
}

/// A scheduled point in simulated time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    pub block_height: u64,
}

/// Inclusive range of block heights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub first: u64,
    pub last: u64,
}

impl BlockWindow {
    /// Number of blocks in the window
    pub fn len(&self) -> u64 {
        if self.last < self.first {
            0
        } else {
            self.last - self.first + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, height: u64) -> bool {
        height >= self.first && height <= self.last
    }
}

/// Scheduling failures (all raised at planning time)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("cannot fit {requested} events with distinct heights into a window of {capacity} blocks")]
    Range { requested: usize, capacity: u64 },

    #[error("block window {first}..={last} lies outside horizon {horizon_first}..={horizon_last}")]
    OutsideHorizon {
        first: u64,
        last: u64,
        horizon_first: u64,
        horizon_last: u64,
    },

    #[error("horizon end {end} precedes start {start}")]
    InvertedHorizon { start: NaiveDate, end: NaiveDate },

    #[error("block interval of {0}s does not divide a day")]
    InvalidBlockInterval(u64),
}

/// Maps simulated time to block heights and schedules events
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use txgen_core_rs::core::calendar::{Calendar, CalendarConfig, SpacingPolicy};
/// use txgen_core_rs::RngManager;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
/// let calendar = Calendar::new(start, end, CalendarConfig::default()).unwrap();
///
/// let mut rng = RngManager::new(42);
/// let slots = calendar
///     .schedule(6, start, end, SpacingPolicy::FixedInterval, &mut rng)
///     .unwrap();
/// assert_eq!(slots.len(), 6);
/// assert!(slots.windows(2).all(|w| w[0].block_height < w[1].block_height));
/// ```
#[derive(Debug, Clone)]
pub struct Calendar {
    start: NaiveDate,
    end: NaiveDate,
    origin: NaiveDateTime,
    config: CalendarConfig,
}

impl Calendar {
    /// Create a calendar covering whole days `start..=end`
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        config: CalendarConfig,
    ) -> Result<Self, ScheduleError> {
        if end < start {
            return Err(ScheduleError::InvertedHorizon { start, end });
        }
        let interval = config.block_interval_secs;
        if interval == 0 || SECONDS_PER_DAY % interval != 0 {
            return Err(ScheduleError::InvalidBlockInterval(interval));
        }

        // Midnight always exists for a NaiveDate
        let origin = start
            .and_hms_opt(0, 0, 0)
            .ok_or(ScheduleError::InvertedHorizon { start, end })?;

        Ok(Self {
            start,
            end,
            origin,
            config,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Number of days in the horizon (inclusive)
    pub fn num_days(&self) -> u64 {
        ((self.end - self.start).num_days() + 1) as u64
    }

    /// Number of calendar months touched by the horizon
    ///
    /// 2024-01-01..=2024-12-31 spans 12 months; 2024-01-15..=2024-02-03 spans 2.
    pub fn num_months(&self) -> u32 {
        let years = self.end.year() - self.start.year();
        (years * 12 + self.end.month() as i32 - self.start.month() as i32 + 1) as u32
    }

    /// Whole-day periods of `interval_months` calendar months, clamped to the horizon
    ///
    /// Groups start at the first month of the horizon. With an interval of 2,
    /// 2024-01-15..=2024-06-10 yields Jan 15..=Feb 29, Mar 1..=Apr 30 and
    /// May 1..=Jun 10.
    pub fn month_periods(&self, interval_months: u32) -> Vec<(NaiveDate, NaiveDate)> {
        let step = Months::new(interval_months.max(1));
        let mut periods = Vec::new();
        let mut group_first = self.start.with_day(1);

        while let Some(first) = group_first {
            if first > self.end {
                break;
            }
            let next = first.checked_add_months(step);
            let last = next
                .and_then(|d| d.pred_opt())
                .map_or(self.end, |d| d.min(self.end));
            periods.push((first.max(self.start), last));
            group_first = next;
        }
        periods
    }

    pub fn blocks_per_day(&self) -> u64 {
        SECONDS_PER_DAY / self.config.block_interval_secs
    }

    /// Every block whose start time falls inside the horizon
    pub fn horizon_window(&self) -> BlockWindow {
        BlockWindow {
            first: self.config.genesis_height,
            last: self.config.genesis_height + self.num_days() * self.blocks_per_day() - 1,
        }
    }

    /// Block height covering `timestamp`, or None before the horizon start
    pub fn height_at(&self, timestamp: NaiveDateTime) -> Option<u64> {
        let secs = (timestamp - self.origin).num_seconds();
        if secs < 0 {
            return None;
        }
        Some(self.config.genesis_height + secs as u64 / self.config.block_interval_secs)
    }

    /// Start time of the block at `height`, or None below genesis
    pub fn block_time(&self, height: u64) -> Option<NaiveDateTime> {
        let offset = height.checked_sub(self.config.genesis_height)?;
        let secs = offset.checked_mul(self.config.block_interval_secs)?;
        Some(self.origin + Duration::seconds(i64::try_from(secs).ok()?))
    }

    /// Slot for a block inside the horizon
    pub fn slot(&self, height: u64) -> Result<Slot, ScheduleError> {
        let horizon = self.horizon_window();
        if !horizon.contains(height) {
            return Err(self.outside(BlockWindow {
                first: height,
                last: height,
            }));
        }
        let timestamp = self.block_time(height).ok_or_else(|| {
            self.outside(BlockWindow {
                first: height,
                last: height,
            })
        })?;
        Ok(Slot {
            timestamp,
            date: timestamp.date(),
            block_height: height,
        })
    }

    /// Blocks covering whole days `start..=end`
    pub fn window_for_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BlockWindow, ScheduleError> {
        if end < start {
            return Err(ScheduleError::InvertedHorizon { start, end });
        }
        if start < self.start || end > self.end {
            return Err(ScheduleError::OutsideHorizon {
                first: self.day_first_block(start),
                last: self.day_first_block(end) + self.blocks_per_day() - 1,
                horizon_first: self.horizon_window().first,
                horizon_last: self.horizon_window().last,
            });
        }
        Ok(BlockWindow {
            first: self.day_first_block(start),
            last: self.day_first_block(end) + self.blocks_per_day() - 1,
        })
    }

    /// Blocks strictly after `height` up to the end of the horizon
    pub fn window_after(&self, height: u64) -> Result<BlockWindow, ScheduleError> {
        let horizon = self.horizon_window();
        let window = BlockWindow {
            first: height.saturating_add(1).max(horizon.first),
            last: horizon.last,
        };
        if window.is_empty() {
            return Err(self.outside(window));
        }
        Ok(window)
    }

    /// Schedule `n` events over whole days `start..=end`
    pub fn schedule(
        &self,
        n: usize,
        start: NaiveDate,
        end: NaiveDate,
        policy: SpacingPolicy,
        rng: &mut RngManager,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let window = self.window_for_dates(start, end)?;
        self.schedule_blocks(n, window, policy, rng)
    }

    /// Schedule `n` events inside a block window
    ///
    /// Returned slots are strictly increasing in timestamp and height.
    /// `FixedInterval` consumes no randomness.
    pub fn schedule_blocks(
        &self,
        n: usize,
        window: BlockWindow,
        policy: SpacingPolicy,
        rng: &mut RngManager,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let horizon = self.horizon_window();
        if window.is_empty() || window.first < horizon.first || window.last > horizon.last {
            return Err(self.outside(window));
        }

        let capacity = window.len();
        if n as u64 > capacity {
            return Err(ScheduleError::Range {
                requested: n,
                capacity,
            });
        }

        let offsets = match policy {
            SpacingPolicy::UniformRandom => sample_distinct(capacity, n as u64, rng),
            SpacingPolicy::FixedInterval => period_ends(capacity, n as u64),
        };

        offsets
            .into_iter()
            .map(|offset| self.slot(window.first + offset))
            .collect()
    }

    fn day_first_block(&self, date: NaiveDate) -> u64 {
        let days = (date - self.start).num_days().max(0) as u64;
        self.config.genesis_height + days * self.blocks_per_day()
    }

    fn outside(&self, window: BlockWindow) -> ScheduleError {
        let horizon = self.horizon_window();
        ScheduleError::OutsideHorizon {
            first: window.first,
            last: window.last,
            horizon_first: horizon.first,
            horizon_last: horizon.last,
        }
    }
}

/// Floyd's algorithm: n distinct offsets from [0, capacity) with exactly n draws
fn sample_distinct(capacity: u64, n: u64, rng: &mut RngManager) -> Vec<u64> {
    let mut chosen = BTreeSet::new();
    for j in (capacity - n)..capacity {
        let t = rng.range(0, j as i64 + 1) as u64;
        if !chosen.insert(t) {
            chosen.insert(j);
        }
    }
    chosen.into_iter().collect()
}

/// Last offset of each of n equal periods; strictly increasing when n <= capacity
fn period_ends(capacity: u64, n: u64) -> Vec<u64> {
    (1..=n).map(|k| k * capacity / n - 1).collect()
}
