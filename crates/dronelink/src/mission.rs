// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mission transfer protocol.
//!
//! Uploads and downloads ordered mission items on top of the command
//! engine. Every step (and `set_current` / `clear`) runs under the single
//! [`CorrelationKey::Mission`] key, so at most one mission exchange is in
//! flight per session.
//!
//! # Download
//!
//! ```text
//! Idle -> CountRequested -> ItemRequested(0) -> ItemReceived(0) -> ... -> Complete
//! ```
//!
//! Each item request has its own retries. A missing item aborts the whole
//! download. A `MISSION_COUNT` with a different count mid-transfer is a
//! protocol error.
//!
//! # Upload
//!
//! ```text
//! Idle -> CountSent -> ItemSent(i) -> ... -> Complete (ACCEPTED ack)
//! ```
//!
//! The vehicle drives the upload by requesting items. A request for the
//! expected index advances; a request for an index already sent is served
//! again without advancing; anything beyond `count - 1` or ahead of the
//! expected index aborts.

use crate::attributes::Location;
use crate::engine::{CommandEngine, CorrelationKey, Exchange, Predicate};
use crate::error::{Error, Result};
use crate::message::constants::*;
use crate::message::{Message, MissionItem, Packet};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Progress of the current (or last) mission exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    // Download
    CountRequested,
    ItemRequested(u16),
    ItemReceived(u16),
    // Upload
    CountSent,
    ItemSent(u16),
    Complete,
    Failed,
}

// ============================================================================
// Mission plan builder
// ============================================================================

/// Ordered list of mission items with contiguous sequence numbers.
///
/// Positions are in the relative-altitude frame (metres above home).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionPlan {
    items: Vec<MissionItem>,
}

fn positioned(command: u16, location: &Location) -> MissionItem {
    let mut item = MissionItem::new(command);
    item.x = location.lat_e7();
    item.y = location.lon_e7();
    item.z = location.alt as f32;
    item
}

impl MissionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw items, renumbering them.
    pub fn from_items(items: impl IntoIterator<Item = MissionItem>) -> Self {
        let mut plan = Self::new();
        for item in items {
            plan.push(item);
        }
        plan
    }

    /// Append an item, assigning the next sequence number.
    pub fn push(&mut self, mut item: MissionItem) -> &mut Self {
        item.seq = self.items.len() as u16;
        self.items.push(item);
        self
    }

    /// Fly to `location`. `hold` is the dwell time in seconds.
    pub fn waypoint(&mut self, location: &Location, hold: f32) -> &mut Self {
        let mut item = positioned(MAV_CMD_NAV_WAYPOINT, location);
        item.param1 = hold;
        item.param2 = 2.0; // acceptance radius, m
        self.push(item)
    }

    /// Take off to `altitude` metres above home.
    pub fn takeoff(&mut self, altitude: f32) -> &mut Self {
        let mut item = MissionItem::new(MAV_CMD_NAV_TAKEOFF);
        item.z = altitude;
        self.push(item)
    }

    /// Land at `location`, or where the vehicle is when `None`.
    pub fn land(&mut self, location: Option<&Location>) -> &mut Self {
        let mut item = match location {
            Some(location) => positioned(MAV_CMD_NAV_LAND, location),
            None => MissionItem::new(MAV_CMD_NAV_LAND),
        };
        item.z = 0.0;
        self.push(item)
    }

    /// Return to launch.
    pub fn rtl(&mut self) -> &mut Self {
        self.push(MissionItem::new(MAV_CMD_NAV_RETURN_TO_LAUNCH))
    }

    /// Loiter at `location` for `duration`, or indefinitely when `None`.
    pub fn loiter(
        &mut self,
        location: &Location,
        duration: Option<Duration>,
        radius: f32,
    ) -> &mut Self {
        let mut item = match duration {
            Some(d) if !d.is_zero() => {
                let mut item = positioned(MAV_CMD_NAV_LOITER_TIME, location);
                item.param1 = d.as_secs_f32();
                item
            }
            _ => positioned(MAV_CMD_NAV_LOITER_UNLIM, location),
        };
        item.param3 = radius;
        self.push(item)
    }

    /// Remove item `index`, renumbering the rest.
    pub fn remove(&mut self, index: usize) -> Option<MissionItem> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        for (seq, item) in self.items.iter_mut().enumerate().skip(index) {
            item.seq = seq as u16;
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[MissionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Transfers
// ============================================================================

fn is_upload_reply(packet: &Packet) -> bool {
    matches!(
        packet.message,
        Message::MissionRequestInt { .. } | Message::MissionAck { .. }
    )
}

/// Mission upload/download over the command engine.
pub struct MissionManager {
    engine: Arc<CommandEngine>,
    timeout: Duration,
    retries: u32,
    state: Mutex<TransferState>,
}

impl MissionManager {
    pub fn new(engine: Arc<CommandEngine>, timeout: Duration, retries: u32) -> Self {
        Self {
            engine,
            timeout,
            retries,
            state: Mutex::new(TransferState::Idle),
        }
    }

    pub fn state(&self) -> TransferState {
        *self.state.lock()
    }

    fn set_state(&self, state: TransferState) {
        log::trace!("[Mission] {:?}", state);
        *self.state.lock() = state;
    }

    /// Wrap a step failure; session-wide errors pass through unwrapped.
    fn abort(&self, direction: &'static str, item: Option<u16>, err: Error) -> Error {
        self.set_state(TransferState::Failed);
        if err.is_session_fatal() {
            return err;
        }
        log::warn!("[Mission] {} aborted at item {:?}: {}", direction, item, err);
        Error::Transfer {
            direction,
            item,
            source: Box::new(err),
        }
    }

    fn step(
        &self,
        exchange: &Exchange<'_>,
        message: Message,
        predicate: Predicate,
    ) -> Result<Packet> {
        exchange.request(message, predicate, self.timeout, self.retries)
    }

    /// Download the vehicle's mission.
    pub fn download(&self) -> Result<Vec<MissionItem>> {
        let exchange = self.engine.open(CorrelationKey::Mission)?;

        self.set_state(TransferState::CountRequested);
        let reply = self
            .step(
                &exchange,
                Message::MissionRequestList {
                    target_system: 0,
                    target_component: 0,
                },
                Box::new(|p| matches!(p.message, Message::MissionCount { .. })),
            )
            .map_err(|e| self.abort("download", None, e))?;
        let Message::MissionCount { count, .. } = reply.message else {
            return Err(self.abort(
                "download",
                None,
                Error::Protocol("expected MISSION_COUNT".into()),
            ));
        };
        log::debug!("[Mission] downloading {} item(s)", count);

        let mut items = Vec::with_capacity(count as usize);
        for seq in 0..count {
            self.set_state(TransferState::ItemRequested(seq));
            let reply = self
                .step(
                    &exchange,
                    Message::MissionRequestInt {
                        target_system: 0,
                        target_component: 0,
                        seq,
                    },
                    Box::new(move |p| match &p.message {
                        Message::MissionItemInt { item, .. } => item.seq == seq,
                        Message::MissionCount { count: c, .. } => *c != count,
                        _ => false,
                    }),
                )
                .map_err(|e| self.abort("download", Some(seq), e))?;

            match reply.message {
                Message::MissionItemInt { item, .. } => {
                    items.push(item);
                    self.set_state(TransferState::ItemReceived(seq));
                }
                Message::MissionCount { count: changed, .. } => {
                    return Err(self.abort(
                        "download",
                        Some(seq),
                        Error::Protocol(format!(
                            "mission count changed from {} to {} mid-transfer",
                            count, changed
                        )),
                    ));
                }
                other => {
                    return Err(self.abort(
                        "download",
                        Some(seq),
                        Error::Protocol(format!("unexpected {}", other.kind())),
                    ));
                }
            }
        }

        self.engine
            .writer()
            .send(Message::MissionAck {
                target_system: 0,
                target_component: 0,
                result: MAV_MISSION_ACCEPTED,
            })
            .map_err(|e| self.abort("download", None, e))?;
        self.set_state(TransferState::Complete);
        log::debug!("[Mission] download complete ({} items)", items.len());
        Ok(items)
    }

    /// Upload `items` (sequence numbers are reassigned in order).
    pub fn upload(&self, items: &[MissionItem]) -> Result<()> {
        let count = u16::try_from(items.len())
            .map_err(|_| Error::Protocol(format!("{} items exceed u16 range", items.len())))?;
        let exchange = self.engine.open(CorrelationKey::Mission)?;

        self.set_state(TransferState::CountSent);
        let mut reply = self
            .step(
                &exchange,
                Message::MissionCount {
                    target_system: 0,
                    target_component: 0,
                    count,
                },
                Box::new(is_upload_reply),
            )
            .map_err(|e| self.abort("upload", None, e))?;

        // Index the vehicle should request next
        let mut next: u16 = 0;
        loop {
            match reply.message {
                Message::MissionRequestInt { seq, .. } => {
                    if seq >= count {
                        return Err(self.abort(
                            "upload",
                            Some(seq),
                            Error::Protocol(format!(
                                "request for item {} beyond count {}",
                                seq, count
                            )),
                        ));
                    }
                    if seq > next {
                        return Err(self.abort(
                            "upload",
                            Some(seq),
                            Error::Protocol(format!(
                                "request for item {} ahead of expected {}",
                                seq, next
                            )),
                        ));
                    }
                    if seq == next {
                        next += 1;
                    } else {
                        log::debug!("[Mission] vehicle re-requested item {}", seq);
                    }

                    let mut item = items[seq as usize].clone();
                    item.seq = seq;
                    self.set_state(TransferState::ItemSent(seq));
                    reply = self
                        .step(
                            &exchange,
                            Message::MissionItemInt {
                                target_system: 0,
                                target_component: 0,
                                item,
                            },
                            Box::new(is_upload_reply),
                        )
                        .map_err(|e| self.abort("upload", Some(seq), e))?;
                }
                Message::MissionAck { result, .. } => {
                    if result != MAV_MISSION_ACCEPTED {
                        return Err(self.abort(
                            "upload",
                            None,
                            Error::Protocol(format!("vehicle rejected mission (result {})", result)),
                        ));
                    }
                    if next < count {
                        return Err(self.abort(
                            "upload",
                            Some(next),
                            Error::Protocol(format!(
                                "ack after {} of {} items",
                                next, count
                            )),
                        ));
                    }
                    self.set_state(TransferState::Complete);
                    log::debug!("[Mission] upload complete ({} items)", count);
                    return Ok(());
                }
                other => {
                    return Err(self.abort(
                        "upload",
                        None,
                        Error::Protocol(format!("unexpected {}", other.kind())),
                    ));
                }
            }
        }
    }

    /// Make item `seq` the current target; waits for `MISSION_CURRENT`.
    pub fn set_current(&self, seq: u16) -> Result<()> {
        let exchange = self.engine.open(CorrelationKey::Mission)?;
        exchange.request(
            Message::MissionSetCurrent {
                target_system: 0,
                target_component: 0,
                seq,
            },
            Box::new(move |p| matches!(p.message, Message::MissionCurrent { seq: s } if s == seq)),
            self.timeout,
            self.retries,
        )?;
        Ok(())
    }

    /// Erase the vehicle's mission; waits for an accepted ack.
    pub fn clear(&self) -> Result<()> {
        let exchange = self.engine.open(CorrelationKey::Mission)?;
        let reply = exchange.request(
            Message::MissionClearAll {
                target_system: 0,
                target_component: 0,
            },
            Box::new(|p| matches!(p.message, Message::MissionAck { .. })),
            self.timeout,
            self.retries,
        )?;
        match reply.message {
            Message::MissionAck { result, .. } if result == MAV_MISSION_ACCEPTED => Ok(()),
            Message::MissionAck { result, .. } => Err(Error::Protocol(format!(
                "vehicle refused to clear mission (result {})",
                result
            ))),
            other => Err(Error::Protocol(format!("unexpected {}", other.kind()))),
        }
    }
}
