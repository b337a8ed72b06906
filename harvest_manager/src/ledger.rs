//! Harvest accounting log.
//!
//! Records are append-only and cadence-gated: a harvest that completes
//! inside the cadence window still distributes fees, it just leaves no
//! record, so the log is a down-sampled view of harvest activity rather
//! than a complete audit trail. Trailing-window queries are computed over
//! the stored records with fixed-point arithmetic; every returned ratio is
//! scaled by `SCALE`.

use std::borrow::Cow;

use alloy_primitives::{I256, U256};
use candid::{CandidType, Decode, Encode, Int, Nat};
use ic_stable_structures::{storable::Bound, Storable};
use serde::Deserialize;

use crate::{
    constants::{scale, seconds_per_year},
    state::{HARVEST_LOG, HARVEST_LOG_CADENCE},
    utils::{
        common::{i256_to_int, int_to_i256, nat_to_u256, u256_to_i256, u256_to_nat},
        error::{arithmetic_err, zero_division_err, StrategyError, StrategyResult},
    },
};

/// One logged harvest. Immutable once appended.
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub struct HarvestRecord {
    /// Harvest completion time in seconds
    pub timestamp: u64,
    /// Total strategy value before this harvest's profit was realized
    pub tvl: Nat,
    /// Realized gain in base-asset units; negative when slippage or
    /// penalties exceeded the claimed rewards
    pub profit: Int,
    /// Seconds since the previous harvest call, not the previous record
    pub time_since_last: u64,
}

impl Storable for HarvestRecord {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(Encode!(self).unwrap())
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Decode!(bytes.as_ref(), Self).unwrap()
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 256,
        is_fixed_size: false,
    };
}

/// Appends a record unless the cadence window since the last record is
/// still open. Returns whether a record was written.
pub fn append_harvest_record(
    now: u64,
    tvl: U256,
    profit: I256,
    time_since_last: u64,
) -> StrategyResult<bool> {
    let cadence = HARVEST_LOG_CADENCE.get();

    HARVEST_LOG.with(|log| {
        let mut log = log.borrow_mut();

        if let Some(last) = log.len().checked_sub(1).and_then(|index| log.get(index)) {
            if last.timestamp + cadence > now {
                return Ok(false);
            }
        }

        let record = HarvestRecord {
            timestamp: now,
            tvl: u256_to_nat(&tvl),
            profit: i256_to_int(&profit),
            time_since_last,
        };

        log.push(&record).map_err(|_| {
            StrategyError::Custom("The harvest log could not grow its stable memory.".to_string())
        })?;

        Ok(true)
    })
}

/// Number of records in the log
pub fn record_count() -> u64 {
    HARVEST_LOG.with(|log| log.borrow().len())
}

/// The last `n` records in their original order.
/// Errs with `InvalidRange` when `n` exceeds the log length.
pub fn latest_slice(n: u64) -> StrategyResult<Vec<HarvestRecord>> {
    HARVEST_LOG.with(|log| {
        let log = log.borrow();
        let len = log.len();

        if n > len {
            return Err(StrategyError::InvalidRange);
        }

        Ok(((len - n)..len).filter_map(|index| log.get(index)).collect())
    })
}

/// All records with `timestamp >= since`, in their original order
fn window_since(since: u64) -> Vec<HarvestRecord> {
    HARVEST_LOG.with(|log| {
        let log = log.borrow();
        let mut window: Vec<HarvestRecord> = Vec::new();

        for index in (0..log.len()).rev() {
            match log.get(index) {
                Some(record) if record.timestamp >= since => window.push(record),
                _ => break,
            }
        }

        window.reverse();
        window
    })
}

/// Mean of `profit * SCALE / tvl` over the records in the window
fn average_scaled_return(records: &[HarvestRecord]) -> StrategyResult<I256> {
    if records.is_empty() {
        return Err(zero_division_err("No harvest records in the requested window."));
    }

    let scale = u256_to_i256(scale())?;
    let mut sum = I256::ZERO;

    for record in records {
        let tvl = u256_to_i256(nat_to_u256(&record.tvl)?)?;
        if tvl == I256::ZERO {
            return Err(zero_division_err("A visited harvest record has zero TVL."));
        }

        let term = int_to_i256(&record.profit)?
            .checked_mul(scale)
            .ok_or_else(|| arithmetic_err("The scaled profit overflowed."))?
            .checked_div(tvl)
            .ok_or_else(|| arithmetic_err("The per-record return could not be computed."))?;

        sum = sum
            .checked_add(term)
            .ok_or_else(|| arithmetic_err("The return sum overflowed."))?;
    }

    let count = I256::try_from(records.len() as u64)
        .map_err(|_| arithmetic_err("The record count does not fit into I256."))?;
    sum.checked_div(count)
        .ok_or_else(|| arithmetic_err("The averaged return could not be computed."))
}

/// Mean annualized return over the window, skipping the oldest visited
/// record whose `time_since_last` is structurally meaningless
fn average_scaled_apr(records: &[HarvestRecord]) -> StrategyResult<I256> {
    let annualizable = records.get(1..).unwrap_or_default();
    if annualizable.is_empty() {
        return Err(zero_division_err(
            "The window leaves no annualizable harvest records.",
        ));
    }

    let scale = u256_to_i256(scale())?;
    let seconds_per_year = u256_to_i256(seconds_per_year())?;
    let mut sum = I256::ZERO;

    for record in annualizable {
        if record.time_since_last == 0 {
            return Err(zero_division_err(
                "A visited harvest record has a zero harvest interval.",
            ));
        }
        let tvl = u256_to_i256(nat_to_u256(&record.tvl)?)?;
        if tvl == I256::ZERO {
            return Err(zero_division_err("A visited harvest record has zero TVL."));
        }

        let interval = I256::try_from(record.time_since_last)
            .map_err(|_| arithmetic_err("The harvest interval does not fit into I256."))?;

        let annualized = int_to_i256(&record.profit)?
            .checked_mul(seconds_per_year)
            .ok_or_else(|| arithmetic_err("The annualized profit overflowed."))?
            .checked_div(interval)
            .ok_or_else(|| arithmetic_err("The annualized profit could not be computed."))?;

        let term = annualized
            .checked_mul(scale)
            .ok_or_else(|| arithmetic_err("The scaled APR term overflowed."))?
            .checked_div(tvl)
            .ok_or_else(|| arithmetic_err("The per-record APR could not be computed."))?;

        sum = sum
            .checked_add(term)
            .ok_or_else(|| arithmetic_err("The APR sum overflowed."))?;
    }

    let count = I256::try_from(annualizable.len() as u64)
        .map_err(|_| arithmetic_err("The record count does not fit into I256."))?;
    sum.checked_div(count)
        .ok_or_else(|| arithmetic_err("The averaged APR could not be computed."))
}

/// Average scaled return over all records since the given timestamp
pub fn average_return_since(since: u64) -> StrategyResult<I256> {
    average_scaled_return(&window_since(since))
}

/// Average scaled return over the last `n` records
pub fn average_return_last_n(n: u64) -> StrategyResult<I256> {
    average_scaled_return(&latest_slice(n)?)
}

/// Average scaled APR over all records since the given timestamp
pub fn average_apr_since(since: u64) -> StrategyResult<I256> {
    average_scaled_apr(&window_since(since))
}

/// Average scaled APR over the last `n` records
pub fn average_apr_last_n(n: u64) -> StrategyResult<I256> {
    average_scaled_apr(&latest_slice(n)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_HARVEST_LOG_CADENCE, SCALE, SECONDS_PER_YEAR};

    fn push_record(timestamp: u64, tvl: u128, profit: i128, time_since_last: u64) {
        HARVEST_LOG.with(|log| {
            log.borrow_mut()
                .push(&HarvestRecord {
                    timestamp,
                    tvl: u256_to_nat(&U256::from(tvl)),
                    profit: i256_to_int(&I256::try_from(profit).unwrap()),
                    time_since_last,
                })
                .unwrap();
        });
    }

    #[test]
    fn cadence_gates_appends() {
        // cadence = 43200s: t=0 logs, t=1000 is swallowed, t=50000 logs
        assert_eq!(HARVEST_LOG_CADENCE.get(), DEFAULT_HARVEST_LOG_CADENCE);

        assert!(append_harvest_record(0, U256::from(1_000), I256::ZERO, 0).unwrap());
        assert_eq!(record_count(), 1);

        assert!(!append_harvest_record(1_000, U256::from(1_000), I256::ZERO, 1_000).unwrap());
        assert_eq!(record_count(), 1);

        assert!(append_harvest_record(50_000, U256::from(1_000), I256::ZERO, 49_000).unwrap());
        assert_eq!(record_count(), 2);
    }

    #[test]
    fn first_append_always_logs() {
        assert_eq!(record_count(), 0);
        assert!(append_harvest_record(5, U256::from(1), I256::ZERO, 0).unwrap());
    }

    #[test]
    fn slice_of_the_full_log_preserves_order() {
        push_record(10, 100, 1, 0);
        push_record(20, 200, 2, 10);
        push_record(30, 300, 3, 10);

        let slice = latest_slice(3).unwrap();
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].timestamp, 10);
        assert_eq!(slice[2].timestamp, 30);
    }

    #[test]
    fn oversized_slice_requests_fail() {
        push_record(10, 100, 1, 0);
        assert_eq!(latest_slice(2), Err(StrategyError::InvalidRange));
        assert!(latest_slice(1).is_ok());
        assert_eq!(latest_slice(0).unwrap(), vec![]);
    }

    #[test]
    fn trailing_average_matches_the_reference_values() {
        push_record(10, 1_000, 10, 0);
        push_record(20, 2_000, 20, 10);
        push_record(30, 1_500, 30, 10);

        // mean of 20/2000 and 30/1500, scaled: (0.01 + 0.02) / 2 = 0.015
        let average = average_return_last_n(2).unwrap();
        assert_eq!(
            average,
            I256::try_from(SCALE as i128 * 15 / 1_000).unwrap()
        );

        // all three: (0.01 + 0.01 + 0.02) / 3
        let average = average_return_last_n(3).unwrap();
        assert_eq!(
            average,
            I256::try_from(SCALE as i128 * 4 / 300).unwrap()
        );
    }

    #[test]
    fn window_queries_select_by_timestamp() {
        push_record(10, 1_000, 10, 0);
        push_record(20, 2_000, 20, 10);
        push_record(30, 1_500, 30, 10);

        // only the records at t=20 and t=30 qualify
        let average = average_return_since(15).unwrap();
        assert_eq!(
            average,
            I256::try_from(SCALE as i128 * 15 / 1_000).unwrap()
        );

        // nothing after t=31
        assert!(matches!(
            average_return_since(31),
            Err(StrategyError::ZeroDivision(_))
        ));
    }

    #[test]
    fn negative_profit_yields_a_negative_average() {
        push_record(10, 1_000, -10, 0);
        let average = average_return_last_n(1).unwrap();
        assert_eq!(average, I256::try_from(-(SCALE as i128) / 100).unwrap());
    }

    #[test]
    fn zero_tvl_records_poison_the_window() {
        push_record(10, 0, 10, 0);
        assert!(matches!(
            average_return_last_n(1),
            Err(StrategyError::ZeroDivision(_))
        ));
    }

    #[test]
    fn empty_windows_are_an_error_not_zero() {
        assert!(matches!(
            average_return_last_n(0),
            Err(StrategyError::ZeroDivision(_))
        ));
    }

    #[test]
    fn apr_skips_the_oldest_visited_record() {
        // the oldest record carries absurd values that would dominate the
        // average if it were counted
        push_record(10, 1, i128::from(i64::MAX), 1);
        push_record(
            10 + SECONDS_PER_YEAR,
            10_000,
            100,
            SECONDS_PER_YEAR,
        );

        // one year between harvests: annualized profit equals the profit,
        // 100 / 10000 = 0.01 scaled
        let apr = average_apr_last_n(2).unwrap();
        assert_eq!(apr, I256::try_from(SCALE as i128 / 100).unwrap());
    }

    #[test]
    fn apr_requires_at_least_two_records() {
        push_record(10, 1_000, 10, 0);
        assert!(matches!(
            average_apr_last_n(1),
            Err(StrategyError::ZeroDivision(_))
        ));
        assert_eq!(average_apr_last_n(2), Err(StrategyError::InvalidRange));
    }

    #[test]
    fn apr_rejects_zero_intervals() {
        push_record(10, 1_000, 10, 0);
        push_record(20, 1_000, 10, 0);
        assert!(matches!(
            average_apr_last_n(2),
            Err(StrategyError::ZeroDivision(_))
        ));
    }

    #[test]
    fn apr_halves_when_harvests_come_twice_as_fast() {
        push_record(10, 10_000, 100, 1);
        push_record(20, 10_000, 100, SECONDS_PER_YEAR / 2);

        // half a year between harvests doubles the annualized profit
        let apr = average_apr_last_n(2).unwrap();
        assert_eq!(apr, I256::try_from(SCALE as i128 * 2 / 100).unwrap());
    }

    #[test]
    fn records_round_trip_through_stable_storage() {
        let record = HarvestRecord {
            timestamp: 1_700_000_000,
            tvl: u256_to_nat(&U256::from(123_456_789_u64)),
            profit: i256_to_int(&I256::try_from(-42).unwrap()),
            time_since_last: 3_600,
        };

        let bytes = record.to_bytes();
        assert!(bytes.len() <= 256);
        assert_eq!(HarvestRecord::from_bytes(bytes), record);
    }
}
