//! Strategy locking.
//!
//! Every multi-step sequence (harvest, withdraw, retire, deposit) runs
//! under this lock, so no concurrent caller can observe or mutate the
//! strategy between its balance snapshots. A crashed sequence leaves the
//! lock behind; acquisition reclaims it after `HARVEST_LOCK_TIMEOUT`.
//!
//! ```plain
//!              ┌──────────┐
//!         ┌────► Unlocked │◄────┐
//!         │    └──────────┘     │
//! timeout │         │        release
//! reclaim │     try_lock        │
//!         │         ▼           │
//!         │    ┌─────────┐      │
//!         └────┤ Locked  ├──────┘
//!              └─────────┘
//! ```

use candid::CandidType;

use crate::{
    constants::HARVEST_LOCK_TIMEOUT,
    utils::error::{StrategyError, StrategyResult},
};

/// Runtime lock with timeout-based reclamation of abandoned holds
#[derive(Clone, Default)]
pub struct Lock {
    /// Current lock state
    pub is_locked: bool,
    /// Last successful lock acquisition time in seconds
    pub last_locked_at: Option<u64>,
}

impl Lock {
    /// Attempts to acquire the lock.
    ///
    /// Succeeds when the lock is free, or when the existing hold is older
    /// than `HARVEST_LOCK_TIMEOUT`.
    pub fn try_lock(&mut self, now: u64) -> StrategyResult<()> {
        if let Some(last_locked_at) = self.last_locked_at {
            if self.is_locked && now.saturating_sub(last_locked_at) > HARVEST_LOCK_TIMEOUT {
                self.is_locked = false;
            }
        }

        if !self.is_locked {
            self.is_locked = true;
            self.last_locked_at = Some(now);
            Ok(())
        } else {
            Err(StrategyError::Locked)
        }
    }

    /// Releases the lock if the caller actually holds it.
    pub fn release(&mut self, acquired_lock: bool) -> &mut Self {
        if acquired_lock {
            self.is_locked = false;
            self.last_locked_at = None;
        }
        self
    }
}

/// Persistent lock state for the stable strategy snapshot.
/// Carries no locking logic.
#[derive(Clone, Default, CandidType)]
pub struct StableLock {
    /// `true` represents locked and `false` unlocked
    pub is_locked: bool,
    /// Last locked timestamp in seconds
    pub last_locked_at: Option<u64>,
}

impl From<StableLock> for Lock {
    fn from(value: StableLock) -> Self {
        Self {
            is_locked: value.is_locked,
            last_locked_at: value.last_locked_at,
        }
    }
}

impl From<Lock> for StableLock {
    fn from(value: Lock) -> Self {
        StableLock {
            is_locked: value.is_locked,
            last_locked_at: value.last_locked_at,
        }
    }
}
