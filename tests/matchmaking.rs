#![allow(non_snake_case)]

use chamber_agent::{
    ledger::LedgerError,
    matchmaker::Matchmaker,
    test_helpers::{
        FakeLedger,
        test_key,
    },
    types::Address,
};
use std::time::Duration;

fn matchmaker_for(ledger: &FakeLedger, wallets: &[&str], table_size: usize) -> Matchmaker<FakeLedger> {
    Matchmaker::new(
        ledger.clone(),
        wallets.iter().copied().map(test_key).collect(),
        1_000,
        table_size,
        Duration::ZERO,
        Duration::ZERO,
    )
}

#[tokio::test]
async fn attempt__starts_and_adopts_match_when_queue_fills() {
    // given
    let ledger = FakeLedger::new();
    let matchmaker = matchmaker_for(&ledger, &["0xaa", "0xbb"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then
    assert_eq!(Some(1), adopted);
    assert_eq!(1, ledger.write_count("start_match"));
    assert_eq!(2, ledger.write_count("join_queue"));
}

#[tokio::test]
async fn attempt__no_match_while_queue_is_short() {
    // given
    let ledger = FakeLedger::new();
    let matchmaker = matchmaker_for(&ledger, &["0xaa"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then
    assert_eq!(None, adopted);
    assert_eq!(0, ledger.write_count("start_match"));
}

#[tokio::test]
async fn attempt__repeat_joins_are_tolerated() {
    // given
    let ledger = FakeLedger::new();
    let matchmaker = matchmaker_for(&ledger, &["0xaa", "0xbb"], 3);
    matchmaker.attempt().await.unwrap();

    // when: both agents are still queued, so both joins come back rejected
    let adopted = matchmaker.attempt().await.unwrap();

    // then
    assert_eq!(None, adopted);
    assert_eq!(4, ledger.write_count("join_queue"));
}

#[tokio::test]
async fn attempt__adopts_match_started_by_third_party() {
    // given: another operator starts match 5 with one of our agents seated,
    // right as our second agent is joining the queue
    let ledger = FakeLedger::new();
    ledger.set_next_match_id(5);
    ledger.external_start_after_joins(
        2,
        5,
        vec![Address::from("0xaa"), Address::from("0xdd")],
    );
    let matchmaker = matchmaker_for(&ledger, &["0xaa", "0xbb"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then: the external start pulled our agent out of the queue, so no
    // direct start was possible; the scan from the anchor finds the match
    assert_eq!(Some(5), adopted);
    assert_eq!(0, ledger.write_count("start_match"));
}

#[tokio::test]
async fn attempt__failed_own_start_still_adopts_external_match_from_anchor() {
    // given: match 5 appears externally with one managed agent while the
    // rest of the roster is still queued, and our own start attempt bounces
    let ledger = FakeLedger::new();
    ledger.set_next_match_id(5);
    ledger.external_start_after_joins(
        3,
        5,
        vec![Address::from("0xaa"), Address::from("0xdd")],
    );
    ledger.fail_start(LedgerError::Reverted("queue changed".to_string()));
    let matchmaker = matchmaker_for(&ledger, &["0xaa", "0xbb", "0xcc"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then
    assert_eq!(Some(5), adopted);
    assert_eq!(1, ledger.write_count("start_match"));
}

#[tokio::test]
async fn attempt__rejected_start_still_scans_from_anchor() {
    // given
    let ledger = FakeLedger::new();
    ledger.fail_start(LedgerError::Reverted("started elsewhere".to_string()));
    let matchmaker = matchmaker_for(&ledger, &["0xaa", "0xbb"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then: start bounced and nothing adoptable exists yet
    assert_eq!(None, adopted);
    assert_eq!(1, ledger.write_count("start_match"));
}

#[tokio::test]
async fn attempt__ignores_matches_without_managed_agents() {
    // given: a stranger match appears in the scanned range
    let ledger = FakeLedger::new();
    ledger.set_next_match_id(3);
    ledger.external_start_after_joins(
        1,
        3,
        vec![Address::from("0xdd"), Address::from("0xee")],
    );
    let matchmaker = matchmaker_for(&ledger, &["0xaa"], 2);

    // when
    let adopted = matchmaker.attempt().await.unwrap();

    // then
    assert_eq!(None, adopted);
}

#[tokio::test(start_paused = true)]
async fn acquire__retries_until_a_match_appears() {
    // given: nothing adoptable on the first pass; an external start lands
    // during the second pass
    let ledger = FakeLedger::new();
    ledger.set_next_match_id(7);
    ledger.external_start_after_joins(
        2,
        7,
        vec![Address::from("0xaa"), Address::from("0xbb")],
    );
    let matchmaker = matchmaker_for(&ledger, &["0xaa"], 2);

    // when
    let adopted = matchmaker.acquire().await;

    // then
    assert_eq!(7, adopted);
}
