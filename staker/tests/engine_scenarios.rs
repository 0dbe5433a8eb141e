//! End-to-end distribution scenarios against the public engine API.

use regen_oracle::{AddressWhitelist, BalanceOracle};
use regen_staker::{
    Collaborators, DelegatedCustody, DelegatedStaker, StakerConfig, StakerEngine,
};
use regen_token::{FungibleToken, MemoryToken};
use regen_types::{Address, Timestamp};
use std::sync::Arc;

const WEEK: u64 = 7 * 86_400;
const POOL: u128 = 30_000_000;

fn addr(name: &str) -> Address {
    Address::new(format!("rgn_{name}"))
}

fn ts(secs: u64) -> Timestamp {
    Timestamp::new(secs)
}

/// Engine with no whitelists, balance-proportional earning power, the
/// same token staked and rewarded, and a funded 7-day distribution.
fn engine_with_pool(pool: u128) -> (DelegatedStaker, Arc<MemoryToken>) {
    regen_utils::init_tracing();
    let token = Arc::new(MemoryToken::new(addr("asset")));
    let collab = Collaborators {
        stake_token: token.clone(),
        reward_token: token.clone(),
        earning_power_oracle: Arc::new(BalanceOracle),
        staker_whitelist: None,
        contribution_whitelist: None,
        allocation_mechanism_whitelist: Arc::new(AddressWhitelist::new()),
    };
    let mut config = StakerConfig::defaults();
    config.reward_duration_secs = WEEK;
    let mut engine = StakerEngine::new(
        addr("engine"),
        addr("admin"),
        collab,
        DelegatedCustody::new(),
        config,
    )
    .unwrap();
    engine
        .set_reward_notifier(&addr("admin"), &addr("notifier"), true)
        .unwrap();
    token.mint(&addr("engine"), pool);
    token.mint(&addr("a"), 10_000_000);
    token.mint(&addr("b"), 10_000_000);
    engine
        .notify_reward_amount(&addr("notifier"), pool, ts(0))
        .unwrap();
    (engine, token)
}

/// Truncation loses at most a few smallest units per operation; the
/// allowed drift is one part per million plus a couple of units of dust.
fn assert_close(actual: u128, expected: u128, context: &str) {
    let tolerance = expected / 1_000_000 + 2;
    let distance = expected.abs_diff(actual);
    assert!(
        distance <= tolerance,
        "{context}: {actual} not within {tolerance} of {expected}"
    );
}

#[test]
fn half_period_joiner_splits_the_second_half() {
    let (mut engine, _token) = engine_with_pool(POOL);
    let half = WEEK / 2;

    let a = engine
        .stake(&addr("a"), 1000, &addr("a"), &addr("a"), ts(0))
        .unwrap();
    let b = engine
        .stake(&addr("b"), 1000, &addr("b"), &addr("b"), ts(half))
        .unwrap();

    let claim_a = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
    let claim_b = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();

    // A alone for the first half (15M), then an even split (7.5M each).
    assert_close(claim_a, 22_500_000, "full-period staker");
    assert_close(claim_b, 7_500_000, "half-period staker");
    assert_close(claim_a + claim_b, POOL, "conservation");
}

#[test]
fn payout_is_independent_of_claim_order() {
    let half = WEEK / 2;
    let run = |claim_b_first: bool| {
        let (mut engine, _token) = engine_with_pool(POOL);
        let a = engine
            .stake(&addr("a"), 1000, &addr("a"), &addr("a"), ts(0))
            .unwrap();
        let b = engine
            .stake(&addr("b"), 1000, &addr("b"), &addr("b"), ts(half))
            .unwrap();
        if claim_b_first {
            let cb = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();
            let ca = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
            (ca, cb)
        } else {
            let ca = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
            let cb = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();
            (ca, cb)
        }
    };

    let (a_first, b_second) = run(false);
    let (a_second, b_first) = run(true);
    assert_eq!(a_first, a_second);
    assert_eq!(b_second, b_first);
}

#[test]
fn pro_rata_split_for_unequal_stakes() {
    let (mut engine, _token) = engine_with_pool(POOL);
    let a = engine
        .stake(&addr("a"), 3000, &addr("a"), &addr("a"), ts(0))
        .unwrap();
    let b = engine
        .stake(&addr("b"), 1000, &addr("b"), &addr("b"), ts(0))
        .unwrap();

    let claim_a = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
    let claim_b = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();

    assert_close(claim_a, 22_500_000, "3/4 share");
    assert_close(claim_b, 7_500_000, "1/4 share");
}

#[test]
fn late_joiner_earns_proportionally_to_presence() {
    let (mut engine, _token) = engine_with_pool(POOL);
    let quarter = WEEK / 4;

    let a = engine
        .stake(&addr("a"), 1000, &addr("a"), &addr("a"), ts(0))
        .unwrap();
    let b = engine
        .stake(&addr("b"), 1000, &addr("b"), &addr("b"), ts(quarter))
        .unwrap();

    let claim_a = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
    let claim_b = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();

    // B is present for 3/4 of the period in an even pool: ¾ of the 15M a
    // full-period peer of equal size receives.
    assert_close(claim_b, 11_250_000, "late joiner");
    assert_close(claim_a, 18_750_000, "early staker");
    assert_close(claim_a + claim_b, POOL, "conservation");
}

#[test]
fn interleaved_operations_conserve_the_pool() {
    let (mut engine, _token) = engine_with_pool(POOL);
    let day = 86_400;

    let a = engine
        .stake(&addr("a"), 5000, &addr("a"), &addr("a"), ts(0))
        .unwrap();
    let b = engine
        .stake(&addr("b"), 1000, &addr("b"), &addr("b"), ts(day))
        .unwrap();
    engine.stake_more(&addr("b"), b, 4000, ts(2 * day)).unwrap();
    engine.withdraw(&addr("a"), a, 2500, ts(4 * day)).unwrap();
    let mid_claim = engine.claim_reward(&addr("b"), b, ts(5 * day)).unwrap();

    let claim_a = engine.claim_reward(&addr("a"), a, ts(WEEK)).unwrap();
    let claim_b = engine.claim_reward(&addr("b"), b, ts(WEEK)).unwrap();

    assert_close(mid_claim + claim_a + claim_b, POOL, "conservation");
    // Totals track the net deltas exactly.
    assert_eq!(engine.accrual().total_staked, 7500);
}

#[test]
fn two_depositors_share_one_surrogate() {
    let (mut engine, token) = engine_with_pool(POOL);
    engine
        .stake(&addr("a"), 1000, &addr("shared"), &addr("a"), ts(0))
        .unwrap();
    engine
        .stake(&addr("b"), 2000, &addr("shared"), &addr("b"), ts(0))
        .unwrap();
    engine
        .stake(&addr("a"), 700, &addr("other"), &addr("a"), ts(0))
        .unwrap();

    let shared = engine.surrogate_for(&addr("shared")).unwrap();
    let other = engine.surrogate_for(&addr("other")).unwrap();
    assert_ne!(shared, other);
    // Both deposits pooled behind the one surrogate.
    assert_eq!(token.balance_of(&shared), 3000);
    assert_eq!(token.balance_of(&other), 700);
}

#[test]
fn sum_of_deposits_always_matches_totals() {
    let (mut engine, _token) = engine_with_pool(POOL);
    let day = 86_400;

    let a = engine
        .stake(&addr("a"), 4000, &addr("a"), &addr("a"), ts(0))
        .unwrap();
    let b = engine
        .stake(&addr("b"), 2000, &addr("b"), &addr("b"), ts(day))
        .unwrap();
    engine.withdraw(&addr("a"), a, 4000, ts(2 * day)).unwrap();
    engine
        .compound_rewards(&addr("b"), b, ts(3 * day))
        .unwrap();

    let balance_sum: u128 = engine.deposits().map(|(_, d)| d.balance).sum();
    let power_sum: u128 = engine.deposits().map(|(_, d)| d.earning_power).sum();
    assert_eq!(engine.accrual().total_staked, balance_sum);
    assert_eq!(engine.accrual().total_earning_power, power_sum);
}

#[test]
fn second_notification_extends_the_period() {
    let (mut engine, token) = engine_with_pool(POOL);
    let a = engine
        .stake(&addr("a"), 1000, &addr("a"), &addr("a"), ts(0))
        .unwrap();

    // Halfway through, double down with a second pool of the same size.
    let half = WEEK / 2;
    token.mint(&addr("engine"), POOL);
    engine
        .notify_reward_amount(&addr("notifier"), POOL, ts(half))
        .unwrap();
    assert_eq!(engine.accrual().period_end, ts(half + WEEK));

    // Sole staker over the extended window collects both pools.
    let claim = engine.claim_reward(&addr("a"), a, ts(half + WEEK)).unwrap();
    assert_close(claim, 2 * POOL, "extended distribution");
}
