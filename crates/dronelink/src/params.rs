// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter sync manager.
//!
//! Keeps the vehicle's full parameter table. `PARAM_VALUE` messages are
//! absorbed on the pump thread whenever they arrive; [`ParameterManager::sync`]
//! drives a full download from the caller thread:
//!
//! ```text
//! Idle --sync()--> Requesting { total, received } --all indexes--> Complete
//!                        |
//!                        +--max_sweeps with gaps--> Stalled
//! ```
//!
//! Every `sweep_interval` the caller re-requests each missing index with
//! `PARAM_REQUEST_READ`; while the total is still unknown it re-sends
//! `PARAM_REQUEST_LIST` instead. Names are case-insensitive (uppercase
//! key) and keep the casing last seen from the vehicle.

use crate::config::SessionConfig;
use crate::engine::{CommandEngine, CorrelationKey, Request};
use crate::error::{Error, Result};
use crate::message::constants::MAV_PARAM_TYPE_REAL32;
use crate::message::{param_id_is_valid, Message, MessageKind, Packet, PARAM_INDEX_UNSOLICITED};
use crate::sink::{SessionEvent, SessionSink};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One vehicle parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    /// Name as last seen from the vehicle.
    pub name: String,
    pub value: f32,
    /// `u16::MAX` if only seen as an unsolicited echo.
    pub index: u16,
    /// `MAV_PARAM_TYPE`.
    pub kind: u8,
}

/// Parameter download state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Requesting {
        /// Reported by the vehicle, unknown until the first value arrives.
        total: Option<u16>,
        received: usize,
    },
    Complete,
    Stalled {
        received: usize,
        total: usize,
    },
}

/// Value change reported by [`ParameterManager::on_packet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterChange {
    pub name: String,
    pub value: f32,
    /// Value differs from the previous one (or is the first).
    pub changed: bool,
}

#[derive(Debug)]
struct Table {
    entries: HashMap<String, ParameterEntry>,
    received: HashSet<u16>,
    total: Option<u16>,
    state: SyncState,
    closed: bool,
}

impl Table {
    fn missing(&self) -> Vec<u16> {
        match self.total {
            Some(total) => (0..total).filter(|i| !self.received.contains(i)).collect(),
            None => Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if total > 0 && self.missing().is_empty())
    }

    /// Received indexes below the reported total.
    fn received_count(&self) -> usize {
        match self.total {
            Some(total) => self.received.iter().filter(|i| **i < total).count(),
            None => 0,
        }
    }

    fn refresh_state(&mut self) {
        match self.state {
            SyncState::Idle | SyncState::Requesting { .. } if self.is_complete() => {
                self.state = SyncState::Complete;
            }
            SyncState::Requesting { .. } => {
                self.state = SyncState::Requesting {
                    total: self.total,
                    received: self.received_count(),
                };
            }
            _ => {}
        }
    }
}

/// Parameter table + sync protocol.
pub struct ParameterManager {
    table: Mutex<Table>,
    updated: Condvar,
    engine: Arc<CommandEngine>,
    sink: Arc<dyn SessionSink>,
    sweep_interval: Duration,
    max_sweeps: u32,
    set_timeout: Duration,
    set_retries: u32,
    read_timeout: Duration,
    read_retries: u32,
}

fn canonical(name: &str) -> String {
    name.trim_end_matches('\0').to_ascii_uppercase()
}

fn validate_name(name: &str) -> Result<()> {
    if param_id_is_valid(name) {
        Ok(())
    } else {
        Err(Error::InvalidParameterName(name.to_string()))
    }
}

fn is_value_of(packet: &Packet, canonical_name: &str) -> bool {
    matches!(&packet.message, Message::ParamValue { param_id, .. }
        if param_id.trim_end_matches('\0').eq_ignore_ascii_case(canonical_name))
}

impl ParameterManager {
    pub fn new(
        engine: Arc<CommandEngine>,
        sink: Arc<dyn SessionSink>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                received: HashSet::new(),
                total: None,
                state: SyncState::Idle,
                closed: false,
            }),
            updated: Condvar::new(),
            engine,
            sink,
            sweep_interval: config.param_sweep_interval(),
            max_sweeps: config.param_max_sweeps,
            set_timeout: config.param_set_timeout(),
            set_retries: config.param_set_retries,
            read_timeout: config.command_timeout(),
            read_retries: config.command_retries,
        }
    }

    // ========================================================================
    // Pump side
    // ========================================================================

    /// Absorb a `PARAM_VALUE`. Other messages are ignored.
    pub fn on_packet(&self, packet: &Packet) -> Option<ParameterChange> {
        let Message::ParamValue {
            param_id,
            param_value,
            param_type,
            param_count,
            param_index,
        } = &packet.message
        else {
            return None;
        };

        let display = param_id.trim_end_matches('\0').to_string();
        let key = display.to_ascii_uppercase();
        let mut table = self.table.lock();

        let changed = match table.entries.get_mut(&key) {
            Some(entry) => {
                let changed = entry.value.to_bits() != param_value.to_bits();
                entry.name = display.clone();
                entry.value = *param_value;
                entry.kind = *param_type;
                if *param_index != PARAM_INDEX_UNSOLICITED {
                    entry.index = *param_index;
                }
                changed
            }
            None => {
                table.entries.insert(
                    key,
                    ParameterEntry {
                        name: display.clone(),
                        value: *param_value,
                        index: *param_index,
                        kind: *param_type,
                    },
                );
                true
            }
        };

        if *param_index != PARAM_INDEX_UNSOLICITED {
            if *param_index < *param_count {
                table.received.insert(*param_index);
            } else {
                log::debug!(
                    "[Params] {} index {} outside count {}",
                    display,
                    param_index,
                    param_count
                );
            }
            table.total = Some(*param_count);
        }
        table.refresh_state();
        drop(table);
        self.updated.notify_all();

        Some(ParameterChange {
            name: display,
            value: *param_value,
            changed,
        })
    }

    /// Wake waiters and refuse further syncs.
    pub fn close(&self) {
        self.table.lock().closed = true;
        self.updated.notify_all();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current value, case-insensitive.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.table.lock().entries.get(&canonical(name)).map(|e| e.value)
    }

    pub fn entry(&self, name: &str) -> Option<ParameterEntry> {
        self.table.lock().entries.get(&canonical(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.lock().entries.contains_key(&canonical(name))
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in index order (unindexed echoes last, by name).
    pub fn entries(&self) -> Vec<ParameterEntry> {
        let mut entries: Vec<ParameterEntry> =
            self.table.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    pub fn state(&self) -> SyncState {
        self.table.lock().state.clone()
    }

    /// Total reported by the vehicle.
    pub fn total(&self) -> Option<u16> {
        self.table.lock().total
    }

    /// Indexes not yet received, empty while the total is unknown.
    pub fn missing(&self) -> Vec<u16> {
        self.table.lock().missing()
    }

    // ========================================================================
    // Caller side
    // ========================================================================

    /// Download the full table, sweeping for gaps until complete.
    ///
    /// Entries received before a `ParameterSyncStalled` error stay readable.
    pub fn sync(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        {
            let mut table = self.table.lock();
            if table.closed {
                return Err(Error::LinkClosed);
            }
            table.received.clear();
            table.total = None;
            table.state = SyncState::Requesting {
                total: None,
                received: 0,
            };
        }
        log::debug!("[Params] requesting parameter list");
        self.request_list()?;

        let mut sweeps = 0u32;
        loop {
            let mut table = self.table.lock();
            let sweep_at = (Instant::now() + self.sweep_interval).min(deadline);
            while !table.is_complete() && !table.closed {
                if self.updated.wait_until(&mut table, sweep_at).timed_out() {
                    break;
                }
            }

            if table.closed {
                return Err(Error::LinkClosed);
            }
            if table.is_complete() {
                table.state = SyncState::Complete;
                let total = table.total.map_or(0, usize::from);
                drop(table);
                self.sink.event(&SessionEvent::ParameterSyncComplete {
                    total,
                    elapsed: start.elapsed(),
                });
                return Ok(());
            }

            let total = table.total;
            let missing = table.missing();
            if sweeps >= self.max_sweeps || Instant::now() >= deadline {
                let Some(total) = total else {
                    table.state = SyncState::Idle;
                    return Err(Error::timeout(
                        MessageKind::ParamValue.name(),
                        sweeps + 1,
                        timeout,
                    ));
                };
                let received = table.received_count();
                table.state = SyncState::Stalled {
                    received,
                    total: total as usize,
                };
                drop(table);
                self.sink.event(&SessionEvent::ParameterSyncStalled {
                    received,
                    total: total as usize,
                });
                return Err(Error::ParameterSyncStalled {
                    received,
                    total: total as usize,
                    missing,
                });
            }
            drop(table);

            sweeps += 1;
            match total {
                None => {
                    log::debug!("[Params] sweep {}: nothing yet, re-requesting list", sweeps);
                    self.request_list()?;
                }
                Some(total) => {
                    log::debug!(
                        "[Params] sweep {}: {} of {} missing",
                        sweeps,
                        missing.len(),
                        total
                    );
                    for index in missing {
                        self.engine.writer().send(Message::ParamRequestRead {
                            target_system: 0,
                            target_component: 0,
                            param_id: String::new(),
                            param_index: index as i16,
                        })?;
                    }
                }
            }
        }
    }

    /// Block until a sync (started elsewhere) completes.
    pub fn wait_complete(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table.lock();
        loop {
            if table.closed {
                return Err(Error::LinkClosed);
            }
            match &table.state {
                SyncState::Complete => return Ok(()),
                SyncState::Stalled { received, total } => {
                    return Err(Error::ParameterSyncStalled {
                        received: *received,
                        total: *total,
                        missing: table.missing(),
                    })
                }
                _ => {}
            }
            if self.updated.wait_until(&mut table, deadline).timed_out() {
                return Err(Error::timeout("parameter sync", 1, timeout));
            }
        }
    }

    /// Set `name` to `value` and wait for the vehicle's echo.
    ///
    /// A differing echoed value is `ParameterRejected`.
    pub fn set(&self, name: &str, value: f32) -> Result<ParameterEntry> {
        validate_name(name)?;
        let key = canonical(name);
        let kind = self
            .entry(&key)
            .map_or(MAV_PARAM_TYPE_REAL32, |entry| entry.kind);

        let predicate_key = key.clone();
        let reply = self.engine.send(
            Request::new(
                Message::ParamSet {
                    target_system: 0,
                    target_component: 0,
                    param_id: key.clone(),
                    param_value: value,
                    param_type: kind,
                },
                CorrelationKey::Parameter(key.clone()),
                move |p| is_value_of(p, &predicate_key),
            )
            .timeout(self.set_timeout)
            .retries(self.set_retries),
        )?;

        let entry = Self::entry_from(&reply).ok_or_else(|| {
            Error::Protocol(format!("unexpected reply to PARAM_SET {}", key))
        })?;
        if entry.value != value {
            return Err(Error::ParameterRejected {
                name: entry.name,
                requested: value,
                actual: entry.value,
            });
        }
        log::debug!("[Params] {} = {}", entry.name, entry.value);
        Ok(entry)
    }

    /// Re-read one parameter by name.
    pub fn refresh(&self, name: &str) -> Result<ParameterEntry> {
        validate_name(name)?;
        let key = canonical(name);
        let predicate_key = key.clone();
        let reply = self.engine.send(
            Request::new(
                Message::ParamRequestRead {
                    target_system: 0,
                    target_component: 0,
                    param_id: key.clone(),
                    param_index: -1,
                },
                CorrelationKey::Sequenced {
                    kind: MessageKind::ParamRequestRead,
                    seq: self.engine.next_sequence(),
                },
                move |p| is_value_of(p, &predicate_key),
            )
            .timeout(self.read_timeout)
            .retries(self.read_retries),
        )?;
        Self::entry_from(&reply)
            .ok_or_else(|| Error::Protocol(format!("unexpected reply to read of {}", key)))
    }

    fn request_list(&self) -> Result<()> {
        self.engine.writer().send(Message::ParamRequestList {
            target_system: 0,
            target_component: 0,
        })
    }

    fn entry_from(packet: &Packet) -> Option<ParameterEntry> {
        match &packet.message {
            Message::ParamValue {
                param_id,
                param_value,
                param_type,
                param_index,
                ..
            } => Some(ParameterEntry {
                name: param_id.trim_end_matches('\0').to_string(),
                value: *param_value,
                index: *param_index,
                kind: *param_type,
            }),
            _ => None,
        }
    }
}
