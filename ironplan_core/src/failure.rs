//! Consecutive-failure tracking, scoped per (lift, progression rule).
//!
//! Counters are only ever mutated through progression dispatch; the CLI
//! and any other outer layer read them at most.

use crate::types::FailureCounter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// All of a user's failure counters, keyed by lift and progression
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FailureLedger {
    counters: HashMap<String, FailureCounter>,
}

fn key(lift_id: &str, progression_id: &str) -> String {
    format!("{}/{}", lift_id, progression_id)
}

impl FailureLedger {
    pub fn get(&self, lift_id: &str, progression_id: &str) -> Option<&FailureCounter> {
        self.counters.get(&key(lift_id, progression_id))
    }

    /// Current consecutive-failure count, 0 when no counter exists yet
    pub fn consecutive(&self, lift_id: &str, progression_id: &str) -> u32 {
        self.get(lift_id, progression_id)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    /// Record an under-target performance; returns the new count
    pub fn record_failure(
        &mut self,
        user_id: Uuid,
        lift_id: &str,
        progression_id: &str,
        at: DateTime<Utc>,
    ) -> u32 {
        let counter = self
            .counters
            .entry(key(lift_id, progression_id))
            .or_insert_with(|| FailureCounter::new(user_id, lift_id, progression_id));
        counter.consecutive_failures += 1;
        counter.last_failure_at = Some(at);
        tracing::debug!(
            "Failure recorded for {}/{}: {} consecutive",
            lift_id,
            progression_id,
            counter.consecutive_failures
        );
        counter.consecutive_failures
    }

    /// Record an on-target performance, resetting the streak to zero
    pub fn record_success(&mut self, lift_id: &str, progression_id: &str) {
        if let Some(counter) = self.counters.get_mut(&key(lift_id, progression_id)) {
            if counter.consecutive_failures > 0 {
                tracing::debug!(
                    "Failure streak for {}/{} reset from {}",
                    lift_id,
                    progression_id,
                    counter.consecutive_failures
                );
            }
            counter.consecutive_failures = 0;
        }
    }

    /// Explicit reset, used by deloads configured to clear the streak
    pub fn reset(&mut self, lift_id: &str, progression_id: &str) {
        self.record_success(lift_id, progression_id);
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// All counters, for display layers
    pub fn counters(&self) -> impl Iterator<Item = &FailureCounter> {
        self.counters.values()
    }
}
