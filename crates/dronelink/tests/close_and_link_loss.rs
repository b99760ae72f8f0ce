// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shutdown: `close()` and link loss release every blocked caller and
//! silence listeners.

mod common;

use common::{connected, fast_config, wait_until};
use dronelink::message::constants::*;
use dronelink::{Error, EventKind, Message, MessageKind, Selector, SessionConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn slow_config() -> SessionConfig {
    SessionConfig {
        command_timeout_ms: 10_000,
        param_set_timeout_ms: 10_000,
        mission_item_timeout_ms: 10_000,
        ..fast_config()
    }
}

#[test]
fn test_close_fails_pending_requests_and_mission() {
    let (session, sim) = connected(slow_config());
    sim.with_state(|s| s.silent = true);

    let events = Arc::new(AtomicUsize::new(0));
    {
        let events = Arc::clone(&events);
        session.add_listener(Selector::Wildcard, move |_| {
            events.fetch_add(1, Ordering::SeqCst);
        });
    }
    let disconnects = Arc::new(AtomicUsize::new(0));
    {
        let disconnects = Arc::clone(&disconnects);
        session.on_disconnect(move |_| {
            disconnects.fetch_add(1, Ordering::SeqCst);
        });
    }

    std::thread::scope(|scope| {
        let command =
            scope.spawn(|| session.command_long(MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN, [1.0; 7]));
        let mode = scope.spawn(|| session.set_mode("GUIDED"));
        let param = scope.spawn(|| session.parameters().set("RTL_ALT", 1500.0));
        let mission = scope.spawn(|| session.mission().download());

        sim.wait_for(1, |m| matches!(m, Message::CommandLong { .. }));
        sim.wait_for(1, |m| matches!(m, Message::SetMode { .. }));
        sim.wait_for(1, |m| matches!(m, Message::ParamSet { .. }));
        sim.wait_for(1, |m| matches!(m, Message::MissionRequestList { .. }));

        let start = Instant::now();
        session.close();

        let results = [
            command.join().expect("command"),
            mode.join().expect("mode"),
            param.join().expect("param").map(|_| ()),
            mission.join().expect("mission").map(|_| ()),
        ];
        assert!(start.elapsed() < Duration::from_secs(2));
        for result in results {
            assert!(matches!(result, Err(Error::LinkClosed)), "{:?}", result);
        }
    });

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    let seen = events.load(Ordering::SeqCst);
    sim.with_state(|s| s.silent = false);
    sim.heartbeat();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(events.load(Ordering::SeqCst), seen);

    assert!(matches!(session.arm(), Err(Error::LinkClosed)));
    session.close();
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn test_link_loss_notifies_disconnect_once() {
    let (session, sim) = connected(slow_config());
    let reasons = Arc::new(Mutex::new(Vec::new()));
    {
        let reasons = Arc::clone(&reasons);
        session.on_disconnect(move |event| {
            if let EventKind::Disconnect { reason } = event.kind {
                reasons.lock().push(reason.to_string());
            }
        });
    }
    sim.with_state(|s| s.silent = true);

    std::thread::scope(|scope| {
        let waiter = scope.spawn(|| session.command_long(MAV_CMD_NAV_LAND, [0.0; 7]));
        sim.wait_for(1, |m| matches!(m, Message::CommandLong { .. }));
        sim.close();
        assert!(matches!(waiter.join().expect("waiter"), Err(Error::LinkClosed)));
    });

    wait_until(Duration::from_secs(2), || !reasons.lock().is_empty());
    assert!(session.is_closed());
    assert_eq!(*reasons.lock(), vec!["end of stream".to_string()]);
    session.close();
    assert_eq!(reasons.lock().len(), 1);
}

#[test]
fn test_close_from_listener_does_not_deadlock() {
    let (session, sim) = connected(fast_config());
    let session = Arc::new(session);
    {
        let weak = Arc::downgrade(&session);
        session.on_message(MessageKind::StatusText, move |_| {
            if let Some(session) = weak.upgrade() {
                session.close();
            }
        });
    }
    sim.send(Message::StatusText {
        severity: MAV_SEVERITY_INFO,
        text: "bye".into(),
    });
    wait_until(Duration::from_secs(2), || session.is_closed());
}
