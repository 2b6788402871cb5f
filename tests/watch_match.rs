#![allow(non_snake_case)]

use chamber_agent::{
    executor::Executor,
    test_helpers::{
        FakeLedger,
        FakeReasoner,
        match_state,
        test_key,
    },
    types::Phase,
    watcher::{
        GameWatcher,
        WatchStatus,
    },
};
use std::time::Duration;

fn watcher_for(ledger: &FakeLedger) -> GameWatcher<FakeLedger, FakeReasoner> {
    GameWatcher::new(
        ledger.clone(),
        None,
        vec![test_key("0xaa")],
        Executor::new(3, Duration::ZERO),
    )
}

#[tokio::test]
async fn poll_once__acts_once_per_turn_deadline() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 60, vec![])
            .deadline(1_000)
            .build(),
    );
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);

    // when
    let first = watcher.poll_once().await.unwrap();
    let second = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Acted(true), first);
    assert_eq!(WatchStatus::Idle, second);
    assert_eq!(1, ledger.write_count("shoot_opponent(0xbb)"));
}

#[tokio::test]
async fn poll_once__acts_again_when_deadline_advances() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .player("0xaa", 80, vec![])
            .player("0xbb", 60, vec![])
            .deadline(1_000)
            .build(),
    );
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);
    watcher.poll_once().await.unwrap();

    // when: same turn holder, new deadline, i.e. a fresh turn
    ledger.update_match(1, |state| state.turn_deadline = 2_000);
    let status = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Acted(true), status);
    assert_eq!(2, ledger.write_count("shoot_opponent(0xbb)"));
}

#[tokio::test]
async fn poll_once__opponents_turn_is_idle() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .player("0xbb", 60, vec![])
            .player("0xaa", 80, vec![])
            .build(),
    );
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);

    // when
    let status = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Idle, status);
    assert!(ledger.write_log().is_empty());
}

#[tokio::test]
async fn poll_once__waiting_match_activates_after_deadline() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .phase(Phase::Waiting)
            .player("0xaa", 100, vec![])
            .player("0xbb", 100, vec![])
            .activation_deadline(100)
            .build(),
    );
    ledger.set_time(150);
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);

    // when
    let waiting = watcher.poll_once().await.unwrap();
    let active = watcher.poll_once().await.unwrap();

    // then: activation flips the phase, the next cycle plays the turn
    assert_eq!(WatchStatus::Waiting, waiting);
    assert_eq!(1, ledger.write_count("activate_match"));
    assert_eq!(WatchStatus::Acted(true), active);
}

#[tokio::test]
async fn poll_once__waiting_match_left_alone_before_deadline() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .phase(Phase::Waiting)
            .player("0xaa", 100, vec![])
            .player("0xbb", 100, vec![])
            .activation_deadline(100)
            .build(),
    );
    ledger.set_time(50);
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);

    // when
    let status = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Waiting, status);
    assert_eq!(0, ledger.write_count("activate_match"));
}

#[tokio::test]
async fn poll_once__finished_match_is_released() {
    // given
    let ledger = FakeLedger::new().with_match(
        match_state()
            .phase(Phase::Finished)
            .player("0xaa", 80, vec![])
            .dead_player("0xbb")
            .winner("0xaa")
            .build(),
    );
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);

    // when
    let status = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Finished, status);
    assert_eq!(None, watcher.match_id());
    assert_eq!(WatchStatus::NoMatch, watcher.poll_once().await.unwrap());
}

#[tokio::test]
async fn set_match__clears_claims_from_previous_match() {
    // given: two matches whose turn deadlines happen to coincide
    let ledger = FakeLedger::new()
        .with_match(
            match_state()
                .match_id(1)
                .player("0xaa", 80, vec![])
                .player("0xbb", 60, vec![])
                .deadline(1_000)
                .build(),
        )
        .with_match(
            match_state()
                .match_id(2)
                .player("0xaa", 80, vec![])
                .player("0xcc", 40, vec![])
                .deadline(1_000)
                .build(),
        );
    let mut watcher = watcher_for(&ledger);
    watcher.set_match(1);
    watcher.poll_once().await.unwrap();

    // when
    watcher.set_match(2);
    let status = watcher.poll_once().await.unwrap();

    // then
    assert_eq!(WatchStatus::Acted(true), status);
    assert_eq!(1, ledger.write_count("shoot_opponent(0xbb)"));
    assert_eq!(1, ledger.write_count("shoot_opponent(0xcc)"));
}
