// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted simulated vehicle for integration tests.
//!
//! `SimVehicle` sits on the far end of a `MemoryLink` pair and answers the
//! session like a minimal ArduCopter: parameters, mission protocol, mode,
//! arming and `COMMAND_LONG`. Outgoing frames can be dropped per message
//! with [`SimVehicle::drop_matching`].

#![allow(dead_code)]

use dronelink::message::constants::*;
use dronelink::{
    Codec, Decoded, FrameCodec, Header, Link, MemoryLink, Message, MissionItem, Packet, Session,
    SessionConfig,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const VEHICLE_SYSTEM: u8 = 1;
pub const VEHICLE_COMPONENT: u8 = 1;

/// Drops the next `remaining` outgoing messages that match.
struct DropRule {
    matches: Box<dyn Fn(&Message) -> bool + Send>,
    remaining: usize,
}

/// 4.5.1 stable.
pub const SIM_FLIGHT_SW_VERSION: u32 = 0x0405_01FF;
pub const SIM_CAPABILITIES: u64 = MAV_PROTOCOL_CAPABILITY_MISSION_INT
    | MAV_PROTOCOL_CAPABILITY_COMMAND_INT
    | MAV_PROTOCOL_CAPABILITY_SET_POSITION_TARGET_LOCAL_NED;

/// Vehicle state the simulator answers from.
#[derive(Default)]
pub struct SimState {
    pub custom_mode: u32,
    pub armed: bool,
    pub params: Vec<(String, f32)>,
    /// Echo this value instead of the requested one on `PARAM_SET`.
    pub param_overrides: HashMap<String, f32>,
    pub mission: Vec<MissionItem>,
    /// Items received during the last upload, in arrival order.
    pub uploaded: Vec<MissionItem>,
    upload_count: u16,
    /// Item requests to issue during an upload, followed by in-order
    /// requests once exhausted.
    pub upload_requests: VecDeque<u16>,
    /// Result for `COMMAND_LONG` other than arm/disarm.
    pub command_result: u8,
    /// Ignore everything the session sends.
    pub silent: bool,
    drops: Vec<DropRule>,
    received: Vec<Message>,
    sequence: u8,
}

impl SimState {
    fn heartbeat(&self) -> Message {
        let armed = if self.armed {
            MAV_MODE_FLAG_SAFETY_ARMED
        } else {
            0
        };
        Message::Heartbeat {
            mav_type: MAV_TYPE_QUADROTOR,
            autopilot: MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode: MAV_MODE_FLAG_CUSTOM_MODE_ENABLED | armed,
            custom_mode: self.custom_mode,
            system_status: MAV_STATE_STANDBY,
        }
    }

    fn param_value(&self, index: usize) -> Message {
        let (name, value) = &self.params[index];
        Message::ParamValue {
            param_id: name.clone(),
            param_value: *value,
            param_type: MAV_PARAM_TYPE_REAL32,
            param_count: self.params.len() as u16,
            param_index: index as u16,
        }
    }

    fn ack(result: u8) -> Message {
        Message::MissionAck {
            target_system: 255,
            target_component: 0,
            result,
        }
    }

    fn request_item(seq: u16) -> Message {
        Message::MissionRequestInt {
            target_system: 255,
            target_component: 0,
            seq,
        }
    }

    /// Replies to one message from the session.
    fn respond(&mut self, message: &Message) -> Vec<Message> {
        self.received.push(message.clone());
        if self.silent {
            return Vec::new();
        }

        match message {
            Message::ParamRequestList { .. } => {
                (0..self.params.len()).map(|i| self.param_value(i)).collect()
            }
            Message::ParamRequestRead {
                param_id,
                param_index,
                ..
            } => {
                let index = if *param_index >= 0 {
                    Some(*param_index as usize).filter(|i| *i < self.params.len())
                } else {
                    self.params
                        .iter()
                        .position(|(n, _)| n.eq_ignore_ascii_case(param_id))
                };
                index.map(|i| self.param_value(i)).into_iter().collect()
            }
            Message::ParamSet {
                param_id,
                param_value,
                ..
            } => {
                let key = param_id.to_ascii_uppercase();
                let actual = self.param_overrides.get(&key).copied().unwrap_or(*param_value);
                let index = match self.params.iter().position(|(n, _)| *n == key) {
                    Some(i) => i,
                    None => {
                        self.params.push((key, actual));
                        self.params.len() - 1
                    }
                };
                self.params[index].1 = actual;
                vec![self.param_value(index)]
            }
            Message::MissionRequestList { .. } => vec![Message::MissionCount {
                target_system: 255,
                target_component: 0,
                count: self.mission.len() as u16,
            }],
            Message::MissionRequestInt { seq, .. } => self
                .mission
                .get(*seq as usize)
                .map(|item| Message::MissionItemInt {
                    target_system: 255,
                    target_component: 0,
                    item: item.clone(),
                })
                .into_iter()
                .collect(),
            Message::MissionCount { count, .. } => {
                self.upload_count = *count;
                self.uploaded.clear();
                if *count == 0 {
                    self.mission.clear();
                    return vec![Self::ack(MAV_MISSION_ACCEPTED)];
                }
                let first = self.upload_requests.pop_front().unwrap_or(0);
                vec![Self::request_item(first)]
            }
            Message::MissionItemInt { item, .. } => {
                if item.current == 2 {
                    // guided goto, not part of an upload
                    return Vec::new();
                }
                self.uploaded.push(item.clone());
                if let Some(scripted) = self.upload_requests.pop_front() {
                    return vec![Self::request_item(scripted)];
                }
                if item.seq + 1 < self.upload_count {
                    return vec![Self::request_item(item.seq + 1)];
                }
                let mut mission: Vec<MissionItem> = Vec::new();
                for item in &self.uploaded {
                    if !mission.iter().any(|m| m.seq == item.seq) {
                        mission.push(item.clone());
                    }
                }
                mission.sort_by_key(|m| m.seq);
                self.mission = mission;
                vec![Self::ack(MAV_MISSION_ACCEPTED)]
            }
            Message::MissionClearAll { .. } => {
                self.mission.clear();
                vec![Self::ack(MAV_MISSION_ACCEPTED)]
            }
            Message::MissionSetCurrent { seq, .. } => vec![Message::MissionCurrent { seq: *seq }],
            Message::SetMode { custom_mode, .. } => {
                self.custom_mode = *custom_mode;
                vec![self.heartbeat()]
            }
            Message::CommandLong {
                command, params, ..
            } if *command == MAV_CMD_COMPONENT_ARM_DISARM => {
                self.armed = params[0] == 1.0;
                vec![
                    Message::CommandAck {
                        command: *command,
                        result: MAV_RESULT_ACCEPTED,
                    },
                    self.heartbeat(),
                ]
            }
            Message::CommandLong { command, .. }
                if *command == MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES =>
            {
                vec![
                    Message::CommandAck {
                        command: *command,
                        result: MAV_RESULT_ACCEPTED,
                    },
                    Message::AutopilotVersion {
                        capabilities: SIM_CAPABILITIES,
                        flight_sw_version: SIM_FLIGHT_SW_VERSION,
                        middleware_sw_version: 0,
                        os_sw_version: 0,
                        board_version: 0,
                        vendor_id: 0,
                        product_id: 0,
                        uid: 0x1234,
                    },
                ]
            }
            Message::CommandLong { command, .. } => vec![Message::CommandAck {
                command: *command,
                result: self.command_result,
            }],
            _ => Vec::new(),
        }
    }
}

/// Simulated vehicle on the far end of a memory link.
pub struct SimVehicle {
    link: Arc<MemoryLink>,
    state: Arc<Mutex<SimState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn emit(link: &MemoryLink, state: &mut SimState, message: Message) {
    emit_as(link, state, VEHICLE_SYSTEM, message);
}

fn emit_as(link: &MemoryLink, state: &mut SimState, system_id: u8, message: Message) {
    for rule in state.drops.iter_mut() {
        if rule.remaining > 0 && (rule.matches)(&message) {
            rule.remaining -= 1;
            return;
        }
    }
    let packet = Packet::new(
        Header {
            system_id,
            component_id: VEHICLE_COMPONENT,
            sequence: state.sequence,
        },
        message,
    );
    state.sequence = state.sequence.wrapping_add(1);
    let frame = FrameCodec::default().encode(&packet).expect("encode");
    // The session may already be gone
    let _ = link.write(&frame);
}

impl SimVehicle {
    pub fn start(link: Arc<MemoryLink>) -> Self {
        let state = Arc::new(Mutex::new(SimState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let link = Arc::clone(&link);
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let codec = FrameCodec::default();
                let mut chunk = vec![0u8; 4096];
                let mut buffer = Vec::new();
                while !stop.load(Ordering::Acquire) {
                    match link.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                        Err(_) => continue,
                    }
                    loop {
                        match codec.decode(&buffer) {
                            Decoded::Packet(packet, consumed) => {
                                buffer.drain(..consumed);
                                let mut state = state.lock();
                                for reply in state.respond(&packet.message) {
                                    emit(&link, &mut state, reply);
                                }
                            }
                            Decoded::Malformed { consumed, .. } => {
                                buffer.drain(..consumed.max(1));
                            }
                            Decoded::NeedMoreData => break,
                        }
                    }
                }
            })
        };
        Self {
            link,
            state,
            stop,
            handle: Some(handle),
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Load `count` parameters named `PARAM_000`, `PARAM_001`, ...
    pub fn load_params(&self, count: usize) {
        self.with_state(|s| {
            s.params = (0..count)
                .map(|i| (format!("PARAM_{:03}", i), i as f32))
                .collect();
        });
    }

    /// Drop the next `times` outgoing messages matching `matches`.
    pub fn drop_matching(
        &self,
        times: usize,
        matches: impl Fn(&Message) -> bool + Send + 'static,
    ) {
        self.with_state(|s| {
            s.drops.push(DropRule {
                matches: Box::new(matches),
                remaining: times,
            });
        });
    }

    pub fn send(&self, message: Message) {
        let mut state = self.state.lock();
        emit(&self.link, &mut state, message);
    }

    /// Send as if from another system on the same link.
    pub fn send_from(&self, system_id: u8, message: Message) {
        let mut state = self.state.lock();
        emit_as(&self.link, &mut state, system_id, message);
    }

    pub fn heartbeat(&self) {
        let mut state = self.state.lock();
        let heartbeat = state.heartbeat();
        emit(&self.link, &mut state, heartbeat);
    }

    /// Messages received from the session that satisfy `pred`.
    pub fn count(&self, pred: impl Fn(&Message) -> bool) -> usize {
        self.state.lock().received.iter().filter(|m| pred(m)).count()
    }

    /// Block until `count(pred) >= n`.
    pub fn wait_for(&self, n: usize, pred: impl Fn(&Message) -> bool) {
        wait_until(Duration::from_secs(5), || self.count(&pred) >= n);
    }

    pub fn close(&self) {
        let _ = self.link.close();
    }
}

impl Drop for SimVehicle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Poll `cond` until true; panics after `timeout`.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in {:?}", timeout);
        thread::sleep(Duration::from_millis(5));
    }
}

/// Short timeouts so retry paths run quickly.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        command_timeout_ms: 200,
        command_retries: 3,
        param_sweep_interval_ms: 100,
        param_max_sweeps: 5,
        param_set_timeout_ms: 200,
        param_set_retries: 3,
        mission_item_timeout_ms: 150,
        mission_retries: 3,
        ..SessionConfig::default()
    }
}

/// Session and simulator connected, vehicle heartbeat already seen.
pub fn connected(config: SessionConfig) -> (Session, SimVehicle) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (ours, theirs) = MemoryLink::pair();
    let session = Session::open(ours, config).expect("open session");
    let sim = SimVehicle::start(theirs);
    sim.heartbeat();
    session
        .wait_heartbeat(Duration::from_secs(2))
        .expect("vehicle heartbeat");
    (session, sim)
}
