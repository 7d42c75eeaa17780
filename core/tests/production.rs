//! Idle production: tick arithmetic, play time, and a full opening session.

use chrono::{TimeZone, Utc};
use clicker_core::{
    clock::ManualClock,
    config::{Catalog, GameConfig},
    engine::{Engine, PurchaseOutcome},
};
use std::sync::Arc;
use std::time::Duration;

fn build_engine() -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Engine::new(
        Arc::new(Catalog::builtin().expect("builtin catalog")),
        GameConfig::default(),
        Arc::new(ManualClock::new(start)),
    )
}

/// An engine with a mixed set of buildings and a couple of multipliers.
fn build_producing_engine() -> Engine {
    let mut engine = build_engine();
    let mut record = engine.snapshot();
    record.currency = 100_000.0;
    record.total_earned = 100_000.0;
    engine.restore(&record).expect("seed funds");

    for id in ["cursor", "cursor", "cursor", "grandma", "grandma", "farm"] {
        assert!(engine.buy_building(id).unwrap().is_success(), "could not buy {id}");
    }
    assert!(engine.buy_upgrade("cursor_upgrade_1").unwrap().is_success());
    assert!(engine.buy_upgrade("global_upgrade_1").unwrap().is_success());
    engine
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn opening_session() {
    let mut engine = build_engine();
    assert!(
        !engine.buy_building("cursor").unwrap().is_success(),
        "a cursor cannot be bought with no currency"
    );
    assert_eq!(engine.building_count("cursor").unwrap(), 0);

    for _ in 0..15 {
        engine.click();
    }
    assert_eq!(engine.currency(), 15.0);
    assert_eq!(engine.total_earned(), 15.0);
    assert_eq!(engine.state().stats.total_clicks, 15);

    assert_eq!(engine.buy_building("cursor").unwrap(), PurchaseOutcome::Bought { cost: 15.0 });
    assert_eq!(engine.currency(), 0.0);
    assert_eq!(engine.building_cost("cursor").unwrap(), 17.0);
    assert!((engine.cookies_per_second() - 0.1).abs() < 1e-12);

    let granted = engine.tick(Duration::from_millis(1000));
    assert!((granted - 0.1).abs() < 1e-12);
    assert!((engine.currency() - 0.1).abs() < 1e-12);
    assert!((engine.total_earned() - 15.1).abs() < 1e-12);
}

#[test]
fn tick_without_buildings_grants_nothing() {
    let mut engine = build_engine();
    assert_eq!(engine.tick(Duration::from_secs(3600)), 0.0);
    assert_eq!(engine.currency(), 0.0);
    assert_eq!(engine.state().stats.play_time_elapsed, Duration::from_secs(3600));
}

#[test]
fn zero_length_tick_changes_nothing() {
    let mut engine = build_producing_engine();
    let before = engine.state().clone();
    assert_eq!(engine.tick(Duration::ZERO), 0.0);
    assert_eq!(engine.state(), &before);
}

#[test]
fn tick_grants_rate_times_elapsed() {
    let mut engine = build_producing_engine();
    // 3 cursors × 0.1 × 2 + 2 grandmas × 1 + 1 farm × 8, then × 1.1
    let expected_rate = (0.6 + 2.0 + 8.0) * 1.1;
    assert!(close(engine.cookies_per_second(), expected_rate));

    let currency = engine.currency();
    let granted = engine.tick(Duration::from_millis(2500));
    assert!(close(granted, expected_rate * 2.5));
    assert!(close(engine.currency(), currency + granted));
}

#[test]
fn split_ticks_match_one_long_tick() {
    let mut whole = build_producing_engine();
    let mut split = build_producing_engine();

    whole.tick(Duration::from_millis(10_000));
    for _ in 0..100 {
        split.tick(Duration::from_millis(100));
    }

    assert!(
        close(whole.currency(), split.currency()),
        "currency diverged: {} vs {}",
        whole.currency(),
        split.currency()
    );
    assert!(close(whole.total_earned(), split.total_earned()));
    assert_eq!(
        whole.state().stats.play_time_elapsed,
        split.state().stats.play_time_elapsed
    );
}

#[test]
fn sub_unit_production_is_kept() {
    let mut engine = build_engine();
    for _ in 0..15 {
        engine.click();
    }
    engine.buy_building("cursor").unwrap();

    // 0.1/s over 16ms frames: nothing is rounded away.
    for _ in 0..625 {
        engine.tick(Duration::from_millis(16));
    }
    assert!(close(engine.currency(), 1.0), "got {}", engine.currency());
}

#[test]
fn play_time_accumulates_across_ticks() {
    let mut engine = build_engine();
    engine.tick(Duration::from_millis(400));
    engine.tick(Duration::from_millis(600));
    engine.tick(Duration::from_secs(2));
    assert_eq!(engine.state().stats.play_time_elapsed, Duration::from_secs(3));
}

#[test]
fn click_yield_follows_click_multiplier() {
    let mut engine = build_engine();
    let mut record = engine.snapshot();
    record.currency = 20_000.0;
    record.total_earned = 20_000.0;
    engine.restore(&record).unwrap();

    for id in ["click_upgrade_1", "click_upgrade_2", "click_upgrade_3"] {
        assert!(engine.buy_upgrade(id).unwrap().is_success(), "could not buy {id}");
    }
    assert_eq!(engine.click_yield(), 8.0);
    let currency = engine.currency();
    assert_eq!(engine.click(), 8.0);
    assert_eq!(engine.currency(), currency + 8.0);
}

#[test]
fn reset_returns_to_fresh_game() {
    let mut engine = build_producing_engine();
    engine.tick(Duration::from_secs(60));
    engine.reset();

    let fresh = build_engine();
    assert_eq!(engine.currency(), 0.0);
    assert_eq!(engine.total_earned(), 0.0);
    assert_eq!(engine.cookies_per_second(), 0.0);
    assert_eq!(engine.click_yield(), 1.0);
    assert!(engine.state().purchased_upgrades.is_empty());
    assert_eq!(engine.state().owned_buildings, fresh.state().owned_buildings);
    assert_eq!(engine.state().multipliers, fresh.state().multipliers);
    assert_eq!(engine.state().stats.play_time_elapsed, Duration::ZERO);
}
