//! Property-based tests for offspring state normalization
//!
//! Random patch sequences are pushed through the normalizer. Rejected patches
//! are dropped, accepted ones become the next stored state, exactly as the
//! persistence layer would do it. The invariants below must hold for every
//! state reachable that way.

use chrono::{Duration, TimeZone, Utc};
use offspring_lifecycle::{
    Field, FinancialState, FixedClock, KeeperIntent, LifeState, Normalizer, OffspringPatch,
    OffspringState, PaperworkState, PlacementState, TerminalRegressionPolicy, TimeStamp,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

// These property tests cover:
//
// 1. Placed offspring always carry a placement date
// 2. Placement dates survive while placed and into a return
// 3. Deceased offspring always carry a date of death
// 4. Promoted offspring are always kept
// 5. Idempotency of normalization under a fixed clock
// 6. Terminal payment/paperwork states never regress as a side effect
//
// What these tests DON'T cover (deliberately):
//
// - Persistence and revision handling (see scenarios.rs)

fn normalizer() -> Normalizer<FixedClock> {
    Normalizer::with_clock(FixedClock::at(2024, 6, 1, 12, 0, 0).unwrap())
}

/// Strategy to generate a timestamp within a year of 2023-01-01
fn timestamp_strategy() -> impl Strategy<Value = TimeStamp<Utc>> {
    (0i64..365).prop_map(|days| {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        TimeStamp::from(start + Duration::days(days))
    })
}

/// Strategy for a patch field: mostly untouched, sometimes cleared or set
fn field_strategy<T: std::fmt::Debug + Clone + 'static>(
    value: impl Strategy<Value = T> + 'static,
) -> impl Strategy<Value = Field<T>> {
    prop_oneof![
        6 => Just(Field::Unset),
        1 => Just(Field::Null),
        3 => value.prop_map(Field::Value),
    ]
}

/// Strategy for an explicit axis assignment, absent most of the time
fn axis_strategy<T: std::fmt::Debug + Clone + 'static>(
    values: Vec<T>,
) -> impl Strategy<Value = Option<T>> {
    prop::option::weighted(0.2, prop::sample::select(values))
}

fn small_id() -> impl Strategy<Value = u64> {
    1u64..=5
}

fn patch_strategy() -> impl Strategy<Value = OffspringPatch> {
    let axes = (
        axis_strategy(vec![LifeState::Alive, LifeState::Deceased]),
        axis_strategy(vec![
            PlacementState::Unassigned,
            PlacementState::Reserved,
            PlacementState::Placed,
            PlacementState::Returned,
        ]),
        axis_strategy(vec![
            FinancialState::None,
            FinancialState::DepositPending,
            FinancialState::PaidInFull,
        ]),
        axis_strategy(vec![
            PaperworkState::None,
            PaperworkState::Sent,
            PaperworkState::Signed,
        ]),
        axis_strategy(vec![
            KeeperIntent::Available,
            KeeperIntent::Keep,
            KeeperIntent::Withheld,
        ]),
    );
    let dates = (
        field_strategy(timestamp_strategy()),
        field_strategy(timestamp_strategy()),
        field_strategy(timestamp_strategy()),
        field_strategy(timestamp_strategy()),
    );
    let links = (
        field_strategy(small_id()),
        field_strategy(small_id()),
        field_strategy(1_000u64..=50_000),
        field_strategy((1u32..=3).prop_map(|n| format!("ctr_{n}"))),
        field_strategy(small_id()),
    );

    (axes, dates, links).prop_map(
        |(
            (life_state, placement_state, financial_state, paperwork_state, keeper_intent),
            (died_at, placed_at, paid_in_full_at, contract_signed_at),
            (buyer_contact_id, buyer_organization_id, deposit_cents, contract_id, promoted_animal_id),
        )| OffspringPatch {
            life_state,
            placement_state,
            financial_state,
            paperwork_state,
            keeper_intent,
            died_at,
            placed_at,
            paid_in_full_at,
            contract_signed_at,
            buyer_contact_id,
            buyer_organization_id,
            deposit_cents,
            contract_id,
            promoted_animal_id,
        },
    )
}

/// Strategy to generate a sequence of patches (1 to 20)
fn patch_sequence_strategy() -> impl Strategy<Value = Vec<OffspringPatch>> {
    prop::collection::vec(patch_strategy(), 1..=20)
}

/// Replay `patches` from a fresh record, keeping only accepted ones
fn reach(normalizer: &Normalizer<FixedClock>, patches: &[OffspringPatch]) -> OffspringState {
    let mut state = OffspringState::default();
    for patch in patches {
        if let Ok(next) = normalizer.apply(Some(&state), patch) {
            state = next;
        }
    }
    state
}

fn check_invariants(s: &OffspringState) -> Result<(), TestCaseError> {
    if s.placement_state == PlacementState::Placed {
        prop_assert!(s.placed_at.is_some(), "placed without placed_at: {:?}", s);
    }
    if s.placed_at.is_some() {
        prop_assert!(
            matches!(
                s.placement_state,
                PlacementState::Placed | PlacementState::Returned
            ),
            "placed_at outside placement: {:?}",
            s
        );
    }
    if s.life_state == LifeState::Deceased {
        prop_assert!(s.died_at.is_some(), "deceased without died_at: {:?}", s);
    }
    if s.promoted_animal_id.is_some() {
        prop_assert_eq!(s.keeper_intent, KeeperIntent::Keep);
    }
    if s.financial_state == FinancialState::DepositPending {
        prop_assert!(s.has_buyer() && s.deposit_cents.is_some());
    }
    if s.financial_state == FinancialState::PaidInFull {
        prop_assert!(s.paid_in_full_at.is_some());
    }
    if s.paperwork_state == PaperworkState::Sent {
        prop_assert!(s.contract_id.is_some());
    }
    if s.paperwork_state == PaperworkState::Signed {
        prop_assert!(s.contract_signed_at.is_some());
    }
    Ok(())
}

proptest! {
    /// Property: every state reachable through accepted patches satisfies the
    /// cross-field invariants (placed ⇒ placed_at, deceased ⇒ died_at,
    /// promoted ⇒ KEEP, and the financial/paperwork preconditions).
    #[test]
    fn prop_invariants_hold_for_every_reachable_state(
        patches in patch_sequence_strategy()
    ) {
        let n = normalizer();
        let mut state = OffspringState::default();

        for patch in &patches {
            if let Ok(next) = n.apply(Some(&state), patch) {
                check_invariants(&next)?;
                state = next;
            }
        }
    }

    /// Property: a placement date is never lost while placed, and a return
    /// keeps the exact date the offspring was placed on.
    #[test]
    fn prop_placed_at_is_preserved(
        patches in patch_sequence_strategy()
    ) {
        let n = normalizer();
        let mut state = OffspringState::default();

        for patch in &patches {
            let Ok(next) = n.apply(Some(&state), patch) else { continue };

            match (state.placement_state, next.placement_state) {
                (PlacementState::Placed, PlacementState::Placed) => {
                    prop_assert!(next.placed_at.is_some());
                }
                (PlacementState::Placed | PlacementState::Returned, PlacementState::Returned) => {
                    prop_assert_eq!(&next.placed_at, &state.placed_at);
                }
                _ => {}
            }
            state = next;
        }
    }

    /// Property: normalize() is a pure function of (current, patch) under a
    /// fixed clock, whatever the regression policy.
    #[test]
    fn prop_normalize_is_idempotent(
        history in patch_sequence_strategy(),
        patch in patch_strategy(),
        allow in prop::bool::ANY,
    ) {
        let policy = if allow {
            TerminalRegressionPolicy::Allow
        } else {
            TerminalRegressionPolicy::Reject
        };
        let n = normalizer().with_policy(policy);
        let current = reach(&n, &history);

        let first = n.normalize(Some(&current), &patch);
        let second = n.normalize(Some(&current), &patch);

        prop_assert_eq!(first, second);
    }

    /// Property: replaying an accepted patch on its own result is a no-op.
    #[test]
    fn prop_replay_is_a_fixed_point(
        history in patch_sequence_strategy(),
        patch in patch_strategy(),
    ) {
        let n = normalizer();
        let current = reach(&n, &history);

        if let Ok(once) = n.apply(Some(&current), &patch) {
            let twice = n.apply(Some(&once), &patch);
            prop_assert_eq!(twice, Ok(once));
        }
    }

    /// Property: PAID_IN_FULL and SIGNED are never undone by a patch that
    /// does not touch the axis or its timestamp.
    #[test]
    fn prop_terminal_states_do_not_regress_as_a_side_effect(
        patches in patch_sequence_strategy()
    ) {
        let n = normalizer();
        let mut state = OffspringState::default();

        for patch in &patches {
            let Ok(next) = n.apply(Some(&state), patch) else { continue };

            if state.financial_state == FinancialState::PaidInFull
                && patch.financial_state.is_none()
                && !patch.paid_in_full_at.is_set()
            {
                prop_assert_eq!(next.financial_state, FinancialState::PaidInFull);
            }
            if state.paperwork_state == PaperworkState::Signed
                && patch.paperwork_state.is_none()
                && !patch.contract_signed_at.is_set()
            {
                prop_assert_eq!(next.paperwork_state, PaperworkState::Signed);
            }
            state = next;
        }
    }

    /// Property: a deceased offspring never gains placement progress.
    #[test]
    fn prop_deceased_offspring_do_not_progress(
        patches in patch_sequence_strategy()
    ) {
        let n = normalizer();
        let mut state = OffspringState::default();

        for patch in &patches {
            let Ok(next) = n.apply(Some(&state), patch) else { continue };

            if next.life_state == LifeState::Deceased {
                prop_assert!(
                    next.placement_state.progress() <= state.placement_state.progress(),
                    "deceased offspring progressed from {:?} to {:?}",
                    state.placement_state,
                    next.placement_state
                );
            }
            state = next;
        }
    }
}
