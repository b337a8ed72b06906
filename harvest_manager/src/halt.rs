//! Pause switch and stale-harvest watchdog.
//!
//! Pausing blocks deposits and harvests; withdraw and retire stay
//! available so the vault can always pull funds back.

use candid::CandidType;
use chrono::Duration;

use crate::{
    constants::STALE_HARVEST_DAYS,
    journal::{JournalCollection, LogType},
    state::{HALT_STATE, STRATEGY_STATE},
    utils::error::{StrategyError, StrategyResult},
};

/// Pause state with the reason it was entered
#[derive(Clone, CandidType, Debug, PartialEq)]
pub struct Halt {
    pub status: HaltStatus,
    /// Populated when the status is not `Functional`
    pub message: Option<String>,
}

impl Default for Halt {
    fn default() -> Self {
        Self {
            status: HaltStatus::Functional,
            message: None,
        }
    }
}

#[derive(Clone, CandidType, Debug, PartialEq)]
pub enum HaltStatus {
    /// Functioning as expected
    Functional,
    /// Deposits and harvests are blocked
    Paused {
        /// Timestamp in seconds at which the strategy was paused
        paused_at: u64,
    },
}

/// Returns `true` while the strategy is not paused
pub fn is_functional() -> bool {
    HALT_STATE.with(|halt| halt.borrow().status == HaltStatus::Functional)
}

/// Errs with `Paused` when the strategy is paused
pub fn require_functional() -> StrategyResult<()> {
    if is_functional() {
        Ok(())
    } else {
        Err(StrategyError::Paused)
    }
}

/// Flips the pause switch. Idempotent.
pub fn set_paused(paused: bool, now: u64, message: Option<String>) {
    HALT_STATE.with(|halt| {
        let mut halt = halt.borrow_mut();
        if paused {
            if halt.status == HaltStatus::Functional {
                *halt = Halt {
                    status: HaltStatus::Paused { paused_at: now },
                    message,
                };
            }
        } else {
            *halt = Halt::default();
        }
    });
}

/// Watchdog pass, run daily by a timer.
///
/// Pauses the strategy when no harvest has completed within
/// `STALE_HARVEST_DAYS`, so stale positions stop accepting deposits
/// until an operator investigates.
pub fn update_halt_status(now: u64) {
    if !is_functional() {
        return;
    }

    let last_harvest = STRATEGY_STATE.with(|state| state.borrow().data.last_harvest);

    if is_older_than(last_harvest, STALE_HARVEST_DAYS, now) {
        let message = format!(
            "No successful harvest in the past {} days.",
            STALE_HARVEST_DAYS
        );
        set_paused(true, now, Some(message.clone()));
        JournalCollection::open(now, None).append_note(Ok(()), LogType::Watchdog, message);
    }
}

/// Check if a given timestamp (seconds) is older than the given number of days.
/// A zero timestamp means "never", which is not considered stale.
fn is_older_than(timestamp_s: u64, days: i64, now_s: u64) -> bool {
    if timestamp_s == 0 {
        return false;
    }

    let threshold = now_s.saturating_sub(Duration::days(days).num_seconds() as u64);
    timestamp_s < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    #[test]
    fn pause_and_unpause_round_trip() {
        assert!(is_functional());

        set_paused(true, 1_000, Some("manual".to_string()));
        assert!(!is_functional());
        assert_eq!(require_functional(), Err(StrategyError::Paused));

        set_paused(false, 2_000, None);
        assert!(is_functional());
        assert!(require_functional().is_ok());
    }

    #[test]
    fn pausing_twice_keeps_the_original_timestamp() {
        set_paused(true, 1_000, None);
        set_paused(true, 5_000, None);

        HALT_STATE.with(|halt| {
            assert_eq!(
                halt.borrow().status,
                HaltStatus::Paused { paused_at: 1_000 }
            );
        });
    }

    #[test]
    fn watchdog_pauses_on_stale_harvest() {
        STRATEGY_STATE.with(|state| state.borrow_mut().data.last_harvest = 10 * DAY);

        // Within the window: nothing happens
        update_halt_status(10 * DAY + (STALE_HARVEST_DAYS as u64 - 1) * DAY);
        assert!(is_functional());

        // Past the window: paused
        update_halt_status(10 * DAY + (STALE_HARVEST_DAYS as u64 + 1) * DAY);
        assert!(!is_functional());
    }

    #[test]
    fn watchdog_ignores_fresh_strategies() {
        // last_harvest == 0 means the strategy has never harvested
        STRATEGY_STATE.with(|state| state.borrow_mut().data.last_harvest = 0);
        update_halt_status(100 * DAY);
        assert!(is_functional());
    }
}
