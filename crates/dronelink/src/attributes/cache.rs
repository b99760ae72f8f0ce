// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Last-known value per attribute.
//!
//! Written only by the pump's dispatch step, read from any thread. Every
//! write bumps the record's version, even when the value is unchanged, so
//! `version` counts updating messages.

use super::value::AttributeValue;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One cached attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    pub value: AttributeValue,
    /// Starts at 1 on first population.
    pub version: u64,
    pub updated: Instant,
}

/// Result of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub version: u64,
    /// Value differs from the previous one (or is the first).
    pub changed: bool,
}

/// Attribute cache.
#[derive(Debug, Default)]
pub struct AttributeCache {
    records: RwLock<HashMap<String, AttributeRecord>>,
    /// Bumped on every write; lets `wait_populated` sleep between updates
    epoch: Mutex<u64>,
    populated: Condvar,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record, `None` if never populated. Never blocks on the pump
    /// for longer than one record write.
    pub fn get(&self, name: &str) -> Option<AttributeRecord> {
        self.records.read().get(name).cloned()
    }

    /// Current value, `None` if never populated.
    pub fn value(&self, name: &str) -> Option<AttributeValue> {
        self.records.read().get(name).map(|r| r.value.clone())
    }

    /// Version of `name`, 0 if never populated.
    pub fn version(&self, name: &str) -> u64 {
        self.records.read().get(name).map_or(0, |r| r.version)
    }

    pub fn is_populated(&self, name: &str) -> bool {
        self.records.read().contains_key(name)
    }

    /// Names of every populated attribute, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Store `value` under `name`, bumping its version.
    pub fn update(&self, name: &str, value: AttributeValue) -> Update {
        let update = {
            let mut records = self.records.write();
            match records.get_mut(name) {
                Some(record) => {
                    let changed = record.value != value;
                    record.value = value;
                    record.version += 1;
                    record.updated = Instant::now();
                    Update {
                        version: record.version,
                        changed,
                    }
                }
                None => {
                    records.insert(
                        name.to_string(),
                        AttributeRecord {
                            value,
                            version: 1,
                            updated: Instant::now(),
                        },
                    );
                    Update {
                        version: 1,
                        changed: true,
                    }
                }
            }
        };

        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.populated.notify_all();
        update
    }

    /// Block until every name in `names` is populated.
    ///
    /// Returns the names still missing at `deadline` (empty on success).
    /// `abort` is polled between wakeups so a closing session releases
    /// waiters.
    pub fn wait_populated(
        &self,
        names: &[&str],
        timeout: Duration,
        abort: &dyn Fn() -> bool,
    ) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let missing = self.missing(names);
            if missing.is_empty() || abort() {
                return missing;
            }
            let now = Instant::now();
            if now >= deadline {
                return missing;
            }

            let mut epoch = self.epoch.lock();
            // Recheck under the epoch lock so an update between `missing`
            // and here is not lost
            if !self.missing(names).is_empty() {
                let wait = (deadline - now).min(Duration::from_millis(100));
                self.populated.wait_for(&mut epoch, wait);
            }
        }
    }

    fn missing(&self, names: &[&str]) -> Vec<String> {
        let records = self.records.read();
        names
            .iter()
            .filter(|n| !records.contains_key(**n))
            .map(|n| (*n).to_string())
            .collect()
    }

    /// Wake every waiter (used on close).
    pub fn wake_all(&self) {
        let _epoch = self.epoch.lock();
        self.populated.notify_all();
    }
}
