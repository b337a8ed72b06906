//! Execution journal.
//!
//! Every externally triggered sequence (harvest, withdraw, retire,
//! deposit, maintenance) opens a collection and appends entries as it
//! progresses. Entries carry the caller identity, so a committed
//! `HarvestResult` doubles as the completion event of a harvest.

use candid::{CandidType, Principal};
use serde::Deserialize;

use crate::{state::insert_journal_entry, utils::error::StrategyResult};

/// Journal entry categories
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum LogType {
    /// Progress notes inside a sequence
    Info,
    /// Outcome of a harvest sequence
    HarvestResult,
    /// Outcome of a withdraw sequence
    WithdrawResult,
    /// Outcome of a retire sequence
    RetireResult,
    /// Outcome of a deposit sequence
    DepositResult,
    /// Watchdog state changes
    Watchdog,
    /// Daily maintenance
    Cleanup,
}

/// A single committed journal entry
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub struct JournalEntry {
    /// Operation timestamp in seconds
    pub timestamp: u64,
    pub entry: StrategyResult<()>,
    pub log_type: LogType,
    /// Principal that triggered the sequence, if any
    pub caller: Option<Principal>,
    pub note: Option<String>,
}

/// Scope of one operation's journal entries.
///
/// Entries are committed eagerly so that a trapped sequence still leaves
/// its progress notes behind.
pub struct JournalCollection {
    timestamp: u64,
    caller: Option<Principal>,
}

impl JournalCollection {
    /// Opens a collection stamped with the operation time
    pub fn open(timestamp: u64, caller: Option<Principal>) -> Self {
        Self { timestamp, caller }
    }

    /// Appends one entry to the journal
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: StrategyResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        insert_journal_entry(JournalEntry {
            timestamp: self.timestamp,
            entry,
            log_type,
            caller: self.caller,
            note: Some(note.as_ref().to_string()),
        });
        self
    }
}
