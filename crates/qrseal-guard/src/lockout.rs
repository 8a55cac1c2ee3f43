//! Per-identity lockout after repeated decryption failures
//!
//! ```text
//! Clear ──failure──▶ Counting(n) ──n ≥ threshold──▶ Locked(until)
//!   ▲                    │                               │
//!   └──────success───────┘◀──────── window elapsed ──────┘
//! ```
//!
//! State lives in process memory only; a restart clears it. Each public call
//! is one read-modify-write under the map's mutex, so concurrent attempts for
//! the same identity cannot lose updates.
//!
//! `begin_attempt` admits an attempt and reserves one failure slot for it in
//! the same critical section. Attempts still running count against the
//! threshold, so parallel guesses cannot outrun the lockout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use qrseal_core::{FailureRecord, LockoutConfig, LockoutStatus};

use crate::clock::{Clock, SystemClock};

type Records = HashMap<String, FailureRecord>;

pub struct LockoutGuard {
    records: Mutex<Records>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
}

/// Recover the map from a poisoned mutex; the records are still usable.
fn lock_records(mutex: &Mutex<Records>) -> MutexGuard<'_, Records> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("lockout mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl LockoutGuard {
    pub fn new(config: LockoutConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LockoutConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Gate for a decryption attempt.
    ///
    /// An expired lockout is cleared here, so the identity starts over with
    /// a full set of attempts.
    pub fn check_allowed(&self, identity: &str) -> LockoutStatus {
        let now = self.clock.now_millis();
        let mut records = lock_records(&self.records);

        if let Some(record) = records.get_mut(identity) {
            if matches!(record.locked_until, Some(until) if now >= until) {
                if record.in_flight == 0 {
                    records.remove(identity);
                } else {
                    record.consecutive_failures = 0;
                    record.locked_until = None;
                }
                tracing::debug!(identity, "lockout window elapsed, clearing record");
            }
        }

        self.status_of(records.get(identity), now)
    }

    /// Admit one decryption attempt, or refuse it.
    ///
    /// Refuses while locked, and while failures plus running attempts
    /// already reach the threshold (`retry_after_seconds` is then 1). The
    /// returned `Attempt` releases its slot when dropped unsettled.
    pub fn begin_attempt(&self, identity: &str) -> Result<Attempt<'_>, LockoutStatus> {
        let now = self.clock.now_millis();
        let mut records = lock_records(&self.records);

        let record = records
            .entry(identity.to_string())
            .or_insert_with(|| FailureRecord {
                consecutive_failures: 0,
                last_failure_at: now,
                locked_until: None,
                in_flight: 0,
            });
        if matches!(record.locked_until, Some(until) if now >= until) {
            record.consecutive_failures = 0;
            record.locked_until = None;
            tracing::debug!(identity, "lockout window elapsed, clearing record");
        }

        let status = self.status_of(Some(&*record), now);
        if !status.allowed {
            return Err(status);
        }
        if record.consecutive_failures.saturating_add(record.in_flight) >= self.config.threshold {
            tracing::debug!(
                identity,
                in_flight = record.in_flight,
                "attempt refused, pending attempts could exhaust the threshold"
            );
            return Err(LockoutStatus {
                allowed: false,
                retry_after_seconds: 1,
                remaining_attempts: 0,
            });
        }

        record.in_flight += 1;
        self.cleanup(&mut records, identity, now);
        Ok(Attempt {
            guard: self,
            identity: identity.to_string(),
            settled: false,
        })
    }

    /// Read-only view for display. Never mutates state.
    pub fn status(&self, identity: &str) -> LockoutStatus {
        let now = self.clock.now_millis();
        let records = lock_records(&self.records);
        match records.get(identity) {
            Some(FailureRecord {
                locked_until: Some(until),
                ..
            }) if now >= *until => self.status_of(None, now),
            record => self.status_of(record, now),
        }
    }

    /// Count a failed attempt that did not go through `begin_attempt`;
    /// starts the lockout once the threshold is hit.
    pub fn record_failure(&self, identity: &str) -> LockoutStatus {
        self.settle_failure(identity, false)
    }

    /// Forget the identity's failure streak after a verified unlock.
    pub fn record_success(&self, identity: &str) {
        self.settle_success(identity, false)
    }

    fn settle_failure(&self, identity: &str, reserved: bool) -> LockoutStatus {
        let now = self.clock.now_millis();
        let mut records = lock_records(&self.records);

        let record = records
            .entry(identity.to_string())
            .or_insert(FailureRecord {
                consecutive_failures: 0,
                last_failure_at: now,
                locked_until: None,
                in_flight: 0,
            });
        if reserved {
            record.in_flight = record.in_flight.saturating_sub(1);
        }

        if matches!(record.locked_until, Some(until) if now >= until) {
            record.consecutive_failures = 0;
            record.locked_until = None;
        }

        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure_at = now;

        if record.consecutive_failures >= self.config.threshold && record.locked_until.is_none() {
            record.locked_until =
                Some(now.saturating_add(self.config.duration_secs.saturating_mul(1000)));
            tracing::warn!(
                identity,
                failures = record.consecutive_failures,
                lockout_secs = self.config.duration_secs,
                "too many failed decryption attempts, locking"
            );
        } else {
            tracing::warn!(
                identity,
                failures = record.consecutive_failures,
                "failed decryption attempt"
            );
        }

        let status = self.status_of(Some(&*record), now);
        self.cleanup(&mut records, identity, now);
        status
    }

    /// The record is dropped unless other admitted attempts still hold it.
    fn settle_success(&self, identity: &str, reserved: bool) {
        let mut records = lock_records(&self.records);
        let Some(record) = records.get_mut(identity) else {
            return;
        };
        if reserved {
            record.in_flight = record.in_flight.saturating_sub(1);
        }
        if record.in_flight == 0 {
            records.remove(identity);
        } else {
            record.consecutive_failures = 0;
            record.locked_until = None;
        }
        tracing::debug!(identity, "failure streak cleared after success");
    }

    /// Give back a reserved slot without counting anything.
    fn release(&self, identity: &str) {
        let mut records = lock_records(&self.records);
        let Some(record) = records.get_mut(identity) else {
            return;
        };
        record.in_flight = record.in_flight.saturating_sub(1);
        let idle = record.in_flight == 0 && record.consecutive_failures == 0;
        if idle && record.locked_until.is_none() {
            records.remove(identity);
        }
    }

    /// Snapshot of the stored record, if any.
    pub fn record(&self, identity: &str) -> Option<FailureRecord> {
        lock_records(&self.records).get(identity).cloned()
    }

    pub fn tracked_identities(&self) -> usize {
        lock_records(&self.records).len()
    }

    fn status_of(&self, record: Option<&FailureRecord>, now: u64) -> LockoutStatus {
        match record {
            Some(FailureRecord {
                locked_until: Some(until),
                ..
            }) if now < *until => LockoutStatus {
                allowed: false,
                retry_after_seconds: (until - now).div_ceil(1000),
                remaining_attempts: 0,
            },
            Some(record) => LockoutStatus {
                allowed: true,
                retry_after_seconds: 0,
                remaining_attempts: self
                    .config
                    .threshold
                    .saturating_sub(record.consecutive_failures),
            },
            None => LockoutStatus {
                allowed: true,
                retry_after_seconds: 0,
                remaining_attempts: self.config.threshold,
            },
        }
    }

    /// Keep the map bounded: drop elapsed lockouts first, then the stalest
    /// unlocked records, then the stalest locked ones. `keep` is never evicted.
    fn cleanup(&self, records: &mut Records, keep: &str, now: u64) {
        let max = self.config.max_tracked_identities;
        if records.len() <= max {
            return;
        }

        records.retain(|id, r| {
            id == keep
                || r.in_flight > 0
                || !matches!(r.locked_until, Some(until) if now >= until)
        });
        if records.len() <= max {
            return;
        }

        let mut entries: Vec<(String, bool, u64)> = records
            .iter()
            .filter(|(id, r)| id.as_str() != keep && r.in_flight == 0)
            .map(|(id, r)| (id.clone(), r.locked_until.is_some(), r.last_failure_at))
            .collect();
        entries.sort_by_key(|(_, locked, last)| (*locked, *last));

        let remove_count = records.len().saturating_sub(max).min(entries.len());
        for (id, _, _) in entries.into_iter().take(remove_count) {
            records.remove(&id);
        }
        tracing::debug!(tracked = records.len(), "evicted stale lockout records");
    }
}

/// An admitted decryption attempt holding one failure slot.
///
/// Settle it with `failed` or `succeeded`. Dropping it unsettled (the
/// payload turned out unreadable, say) frees the slot without counting.
#[must_use = "an unsettled attempt is released on drop"]
pub struct Attempt<'a> {
    guard: &'a LockoutGuard,
    identity: String,
    settled: bool,
}

impl Attempt<'_> {
    pub fn failed(mut self) -> LockoutStatus {
        self.settled = true;
        self.guard.settle_failure(&self.identity, true)
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.guard.settle_success(&self.identity, true);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.release(&self.identity);
        }
    }
}
