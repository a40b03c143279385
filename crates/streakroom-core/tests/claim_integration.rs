//! Integration tests for daily claims against an on-disk database.
//!
//! Covers concurrent claims from separate connections, a full seven-day
//! cycle, and ledger persistence across reopen.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use streakroom_core::{
    ClaimEngine, ClaimError, CyclePolicy, Database, FixedClock, RewardStore, TransactionType,
};

fn clock_at_noon() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap(),
    ))
}

#[test]
fn concurrent_claims_grant_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streakroom.db");
    let clock = clock_at_noon();

    // Open (and migrate) every connection up front so only the claims race.
    let engines: Vec<_> = (0..4)
        .map(|_| {
            ClaimEngine::new(Database::open_at(&path).unwrap()).with_clock(clock.clone())
        })
        .collect();
    let barrier = Arc::new(Barrier::new(engines.len()));

    let handles: Vec<_> = engines
        .into_iter()
        .map(|engine| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.claim_daily(Some("racer"))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already = results
        .iter()
        .filter(|r| matches!(r, Err(ClaimError::AlreadyClaimed)))
        .count();
    assert_eq!(successes, 1, "results: {results:?}");
    assert_eq!(already, results.len() - 1, "results: {results:?}");

    let db = Database::open_at(&path).unwrap();
    let ledger = db.get_streak("racer").unwrap().unwrap();
    assert_eq!(ledger.current_day, 1);
    assert_eq!(ledger.days_completed.len(), 1);

    let engine = ClaimEngine::new(db).with_clock(clock);
    let page = engine.transactions(Some("racer"), 1).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].transaction_type, TransactionType::DailyReward);
}

#[test]
fn full_week_then_eighth_day() {
    let clock = clock_at_noon();
    let engine = ClaimEngine::new(Database::open_memory().unwrap()).with_clock(clock.clone());

    let mut paid = Vec::new();
    for _ in 0..7 {
        paid.push(engine.claim_daily(Some("weekly")).unwrap().reward_amount);
        clock.advance(Duration::days(1));
    }
    assert_eq!(paid, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 10.0]);

    let status = engine.streak_status(Some("weekly")).unwrap();
    assert_eq!(status.current_day, 6);
    assert!(status.days.iter().all(|d| d.completed));
    assert_eq!(status.next_reward.amount, 10.0);

    let eighth = engine.claim_daily(Some("weekly")).unwrap();
    assert_eq!(eighth.current_day, 6);
    assert_eq!(eighth.days_completed.len(), 7);
}

#[test]
fn second_claim_on_bonus_day_is_rejected() {
    for policy in [CyclePolicy::Freeze, CyclePolicy::Wrap] {
        let clock = clock_at_noon();
        let engine = ClaimEngine::new(Database::open_memory().unwrap())
            .with_clock(clock.clone())
            .with_policy(policy);

        for day in 0..7 {
            if day > 0 {
                clock.advance(Duration::days(1));
            }
            engine.claim_daily(Some("bonus")).unwrap();
        }
        let before = engine.store().get_streak("bonus").unwrap().unwrap();
        assert_eq!(before.current_day, 6);
        assert!(before.days_completed.contains(&6));

        // 23:00 on the bonus day, still before the next local midnight.
        clock.advance(Duration::hours(11));
        assert!(
            matches!(engine.claim_daily(Some("bonus")), Err(ClaimError::AlreadyClaimed)),
            "policy {policy}"
        );
        assert_eq!(engine.store().get_streak("bonus").unwrap().unwrap(), before);
        assert_eq!(engine.transactions(Some("bonus"), 1).unwrap().total, 7);
    }
}

#[test]
fn claim_just_before_midnight_allows_claim_at_midnight() {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 59).unwrap() + Duration::nanoseconds(999_999_999),
    ));
    let engine = ClaimEngine::new(Database::open_memory().unwrap()).with_clock(clock.clone());

    engine.claim_daily(Some("late")).unwrap();
    clock.set(Utc.with_ymd_and_hms(2026, 5, 5, 0, 0, 0).unwrap());
    let next = engine.claim_daily(Some("late")).unwrap();
    assert_eq!(next.current_day, 2);
}

#[test]
fn skipped_days_do_not_reset_the_streak() {
    let clock = clock_at_noon();
    let engine = ClaimEngine::new(Database::open_memory().unwrap()).with_clock(clock.clone());

    engine.claim_daily(Some("lapsed")).unwrap();
    clock.advance(Duration::days(5));
    let second = engine.claim_daily(Some("lapsed")).unwrap();
    assert_eq!(second.current_day, 2);
    assert_eq!(second.days_completed, vec![0, 1]);
}

#[test]
fn ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streakroom.db");
    let clock = clock_at_noon();

    {
        let engine = ClaimEngine::new(Database::open_at(&path).unwrap())
            .with_clock(clock.clone())
            .with_policy(CyclePolicy::Wrap);
        engine.claim_daily(Some("persist")).unwrap();
    }

    let engine = ClaimEngine::new(Database::open_at(&path).unwrap())
        .with_clock(clock.clone())
        .with_policy(CyclePolicy::Wrap);
    assert!(matches!(
        engine.claim_daily(Some("persist")),
        Err(ClaimError::AlreadyClaimed)
    ));

    clock.advance(Duration::days(1));
    let next = engine.claim_daily(Some("persist")).unwrap();
    assert_eq!(next.current_day, 2);
}

#[test]
fn history_pages_newest_first() {
    let clock = clock_at_noon();
    let engine = ClaimEngine::new(Database::open_memory().unwrap()).with_clock(clock.clone());

    for _ in 0..12 {
        engine.claim_daily(Some("pager")).unwrap();
        clock.advance(Duration::days(1));
    }

    let first = engine.transactions(Some("pager"), 1).unwrap();
    assert_eq!(first.total, 12);
    assert_eq!(first.items.len(), 10);
    assert!(first.has_next());
    assert!(first
        .items
        .windows(2)
        .all(|w| w[0].created_at >= w[1].created_at));

    let second = engine.transactions(Some("pager"), 2).unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(!second.has_next());

    let beyond = engine.transactions(Some("pager"), 3).unwrap();
    assert!(beyond.items.is_empty());
}
