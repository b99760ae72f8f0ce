// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Test assertions with constants

//! Mission upload/download against a lossy simulated vehicle.

mod common;

use common::{connected, fast_config};
use dronelink::message::constants::*;
use dronelink::{CorrelationKey, Error, Location, Message, MissionPlan, TransferState};
use std::time::Duration;

fn plan() -> MissionPlan {
    let home = Location::new(-35.363_261, 149.165_230, 0.0);
    let mut plan = MissionPlan::new();
    plan.takeoff(15.0)
        .waypoint(&Location::new(home.lat + 0.001, home.lon, 20.0), 0.0)
        .waypoint(&Location::new(home.lat + 0.001, home.lon + 0.001, 20.0), 5.0)
        .loiter(&home, Some(Duration::from_secs(10)), 8.0)
        .rtl();
    plan
}

fn item_requests(seq: u16) -> impl Fn(&Message) -> bool {
    move |m| matches!(m, Message::MissionRequestInt { seq: s, .. } if *s == seq)
}

fn items_sent(seq: u16) -> impl Fn(&Message) -> bool {
    move |m| matches!(m, Message::MissionItemInt { item, .. } if item.seq == seq)
}

#[test]
fn test_download_retries_dropped_item_once() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.mission = plan().items().to_vec());
    sim.drop_matching(1, |m| {
        matches!(m, Message::MissionItemInt { item, .. } if item.seq == 2)
    });

    let items = session.mission().download().expect("download");

    let seqs: Vec<u16> = items.iter().map(|i| i.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    assert_eq!(items, plan().items().to_vec());
    assert_eq!(sim.count(item_requests(2)), 2);
    for seq in [0, 1, 3, 4] {
        assert_eq!(sim.count(item_requests(seq)), 1, "item {}", seq);
    }
    sim.wait_for(1, |m| {
        matches!(m, Message::MissionAck { result, .. } if *result == MAV_MISSION_ACCEPTED)
    });
    assert_eq!(session.mission().state(), TransferState::Complete);
}

#[test]
fn test_download_aborts_when_item_never_arrives() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.mission = plan().items().to_vec());
    sim.drop_matching(usize::MAX, |m| {
        matches!(m, Message::MissionItemInt { item, .. } if item.seq == 3)
    });

    let err = session.mission().download().expect_err("item 3 lost");
    match err {
        Error::Transfer {
            direction,
            item,
            source,
        } => {
            assert_eq!(direction, "download");
            assert_eq!(item, Some(3));
            assert!(matches!(*source, Error::Timeout { attempts: 4, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.mission().state(), TransferState::Failed);
}

#[test]
fn test_upload_serves_repeated_requests_without_advancing() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.upload_requests = [0, 1, 1, 1, 2].into_iter().collect());

    let mut plan = MissionPlan::new();
    plan.takeoff(10.0).rtl().land(None);
    session.mission().upload(plan.items()).expect("upload");

    assert_eq!(sim.count(items_sent(0)), 1);
    assert_eq!(sim.count(items_sent(1)), 3);
    assert_eq!(sim.count(items_sent(2)), 1);
    let stored = sim.with_state(|s| s.mission.clone());
    assert_eq!(stored, plan.items().to_vec());
}

#[test]
fn test_upload_rejects_request_beyond_count() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.upload_requests = [0, 5].into_iter().collect());

    let mut plan = MissionPlan::new();
    plan.takeoff(10.0).rtl();
    let err = session.mission().upload(plan.items()).expect_err("bad request");
    assert!(matches!(
        err,
        Error::Transfer { direction: "upload", item: Some(5), ref source }
            if matches!(**source, Error::Protocol(_))
    ));
}

#[test]
fn test_upload_rejects_skipped_item() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.upload_requests = [0, 2].into_iter().collect());

    let mut plan = MissionPlan::new();
    plan.takeoff(10.0).rtl().land(None);
    let err = session.mission().upload(plan.items()).expect_err("skipped item 1");
    assert!(matches!(err, Error::Transfer { item: Some(2), .. }));
}

#[test]
fn test_concurrent_transfer_is_duplicate() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| {
        s.mission = plan().items().to_vec();
        s.silent = true;
    });

    std::thread::scope(|scope| {
        let first = scope.spawn(|| session.mission().download());
        sim.wait_for(1, |m| matches!(m, Message::MissionRequestList { .. }));

        let err = session.mission().clear().expect_err("busy");
        assert!(matches!(err, Error::DuplicateRequest(CorrelationKey::Mission)));

        let first = first.join().expect("join");
        assert!(matches!(first, Err(Error::Transfer { item: None, .. })));
    });
}

#[test]
fn test_set_current_and_clear() {
    let (session, sim) = connected(fast_config());
    sim.with_state(|s| s.mission = plan().items().to_vec());

    session.mission().set_current(3).expect("set current");
    assert_eq!(session.next_waypoint(), Some(3));

    session.mission().clear().expect("clear");
    assert!(sim.with_state(|s| s.mission.is_empty()));
    assert!(session.mission().download().expect("download").is_empty());
}
