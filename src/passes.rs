//! Derivation passes over the merged candidate record
//!
//! Each pass reads the stored record (`base`), the raw patch and the
//! candidate as left by the passes before it. Passes only ever move the
//! candidate through the `derive_*` setters, which keep `derived` in step so
//! that `base ⊕ patch ⊕ derived == candidate` holds at every point.
use super::clock::TimeStamp;
use super::config::TerminalRegressionPolicy;
use super::error::TransitionError;
use super::offspring::{
    DerivedFields, FinancialState, KeeperIntent, LifeState, OffspringPatch, OffspringState,
    PaperworkState, PlacementState,
};
use chrono::Utc;
use tracing::debug;

pub(crate) struct Derivation<'a> {
    pub base: &'a OffspringState,
    pub patch: &'a OffspringPatch,
    pub candidate: OffspringState,
    pub derived: DerivedFields,
    pub now: TimeStamp<Utc>,
    pub policy: TerminalRegressionPolicy,
}

pub(crate) struct Pass {
    pub name: &'static str,
    pub run: fn(&mut Derivation<'_>) -> Result<(), TransitionError>,
}

pub(crate) const PIPELINE: [Pass; 7] = [
    Pass {
        name: "placement",
        run: placement,
    },
    Pass {
        name: "placement_clearing_guard",
        run: placement_clearing_guard,
    },
    Pass {
        name: "life_state",
        run: life_state,
    },
    Pass {
        name: "keeper_intent",
        run: keeper_intent,
    },
    Pass {
        name: "financial",
        run: financial,
    },
    Pass {
        name: "paperwork",
        run: paperwork,
    },
    Pass {
        name: "validate",
        run: validate,
    },
];

impl<'a> Derivation<'a> {
    pub fn new(
        base: &'a OffspringState,
        patch: &'a OffspringPatch,
        now: TimeStamp<Utc>,
        policy: TerminalRegressionPolicy,
    ) -> Self {
        Self {
            base,
            patch,
            candidate: base.merge_patch(patch),
            derived: DerivedFields::default(),
            now,
            policy,
        }
    }

    fn derive_life(&mut self, state: LifeState) {
        if self.candidate.life_state != state {
            debug!(from = ?self.candidate.life_state, to = ?state, "derived life state");
            self.candidate.life_state = state;
            self.derived.life_state = Some(state);
        }
    }
    fn derive_placement(&mut self, state: PlacementState) {
        if self.candidate.placement_state != state {
            debug!(from = ?self.candidate.placement_state, to = ?state, "derived placement state");
            self.candidate.placement_state = state;
            self.derived.placement_state = Some(state);
        }
    }
    fn derive_financial(&mut self, state: FinancialState) {
        if self.candidate.financial_state != state {
            debug!(from = ?self.candidate.financial_state, to = ?state, "derived financial state");
            self.candidate.financial_state = state;
            self.derived.financial_state = Some(state);
        }
    }
    fn derive_paperwork(&mut self, state: PaperworkState) {
        if self.candidate.paperwork_state != state {
            debug!(from = ?self.candidate.paperwork_state, to = ?state, "derived paperwork state");
            self.candidate.paperwork_state = state;
            self.derived.paperwork_state = Some(state);
        }
    }
    fn derive_keeper(&mut self, intent: KeeperIntent) {
        if self.candidate.keeper_intent != intent {
            debug!(from = ?self.candidate.keeper_intent, to = ?intent, "derived keeper intent");
            self.candidate.keeper_intent = intent;
            self.derived.keeper_intent = Some(intent);
        }
    }
    fn derive_died_at(&mut self, at: Option<TimeStamp<Utc>>) {
        if self.candidate.died_at != at {
            self.candidate.died_at = at.clone();
            self.derived.died_at = at.into();
        }
    }
    fn derive_placed_at(&mut self, at: Option<TimeStamp<Utc>>) {
        if self.candidate.placed_at != at {
            self.candidate.placed_at = at.clone();
            self.derived.placed_at = at.into();
        }
    }
    fn derive_paid_in_full_at(&mut self, at: Option<TimeStamp<Utc>>) {
        if self.candidate.paid_in_full_at != at {
            self.candidate.paid_in_full_at = at.clone();
            self.derived.paid_in_full_at = at.into();
        }
    }
    fn derive_contract_signed_at(&mut self, at: Option<TimeStamp<Utc>>) {
        if self.candidate.contract_signed_at != at {
            self.candidate.contract_signed_at = at.clone();
            self.derived.contract_signed_at = at.into();
        }
    }

    // The life pass runs after placement, so placement has to anticipate a
    // death the patch implies through `died_at` alone.
    fn is_or_becomes_deceased(&self) -> bool {
        self.candidate.life_state == LifeState::Deceased
            || (self.patch.life_state != Some(LifeState::Alive)
                && self.candidate.died_at.is_some())
    }

    fn placement_error(&self, reason: &'static str) -> TransitionError {
        TransitionError::IllegalPlacementTransition {
            from: self.base.placement_state,
            to: self.candidate.placement_state,
            reason,
        }
    }
    fn life_error(&self, reason: &'static str) -> TransitionError {
        TransitionError::IllegalLifeStateTransition {
            from: self.base.life_state,
            to: self.candidate.life_state,
            reason,
        }
    }
    fn financial_error(&self, to: FinancialState, reason: &'static str) -> TransitionError {
        TransitionError::IllegalFinancialTransition {
            from: self.base.financial_state,
            to,
            reason,
        }
    }
    fn paperwork_error(&self, to: PaperworkState, reason: &'static str) -> TransitionError {
        TransitionError::IllegalPaperworkTransition {
            from: self.base.paperwork_state,
            to,
            reason,
        }
    }
}

fn placement(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    match d.patch.placement_state {
        Some(PlacementState::Returned) => {
            if !matches!(
                d.base.placement_state,
                PlacementState::Placed | PlacementState::Returned
            ) {
                return Err(d.placement_error("only a placed offspring can be returned"));
            }
            // The original placement date stays on record as provenance.
            if d.patch.placed_at.is_set() {
                let retained = d.base.placed_at.clone();
                d.derive_placed_at(retained);
            }
        }
        Some(PlacementState::Placed) => {
            if d.candidate.placed_at.is_none() {
                return Err(d.placement_error("placed_at is required to mark an offspring placed"));
            }
        }
        // A buyer holds a living offspring even against an explicit UNASSIGNED.
        // A retained placed_at is left for validation to reject.
        Some(PlacementState::Unassigned) => {
            if d.candidate.placed_at.is_none()
                && d.candidate.has_buyer()
                && !d.is_or_becomes_deceased()
            {
                d.derive_placement(PlacementState::Reserved);
            }
        }
        Some(PlacementState::Reserved) => {}
        None => {
            let state = d.candidate.placement_state;
            if d.candidate.placed_at.is_some()
                && matches!(state, PlacementState::Unassigned | PlacementState::Reserved)
            {
                d.derive_placement(PlacementState::Placed);
            } else if state == PlacementState::Unassigned
                && d.candidate.has_buyer()
                && !d.is_or_becomes_deceased()
            {
                d.derive_placement(PlacementState::Reserved);
            }
        }
    }
    Ok(())
}

fn placement_clearing_guard(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    if d.candidate.placement_state == PlacementState::Placed && d.patch.placed_at.is_null() {
        return Err(d.placement_error("placed_at cannot be cleared while the offspring is placed"));
    }
    // An explicit return already restored the stored date in the placement pass.
    if d.candidate.placement_state == PlacementState::Returned
        && d.candidate.placed_at != d.base.placed_at
    {
        return Err(d.placement_error(
            "placed_at of a returned offspring is kept as provenance; place it again explicitly",
        ));
    }
    Ok(())
}

fn life_state(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    match d.patch.life_state {
        Some(LifeState::Alive) => {
            if d.patch.died_at.value().is_some() {
                return Err(d.life_error("died_at cannot be set on a living offspring"));
            }
            // Reviving corrects a mistaken death record.
            d.derive_died_at(None);
        }
        Some(LifeState::Deceased) => {}
        None => {
            if d.candidate.died_at.is_some() {
                d.derive_life(LifeState::Deceased);
            }
        }
    }

    if d.candidate.life_state == LifeState::Deceased {
        if d.candidate.died_at.is_none() {
            let now = d.now.clone();
            d.derive_died_at(Some(now));
        }
        if d.candidate.placed_at.is_some() && d.candidate.placed_at != d.base.placed_at {
            return Err(d.life_error("a deceased offspring cannot be placed"));
        }
        if d.candidate.placement_state.progress() > d.base.placement_state.progress() {
            return Err(d.life_error("a deceased offspring cannot progress toward placement"));
        }
    }
    Ok(())
}

fn keeper_intent(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    if d.patch.promoted_animal_id.value().is_some() {
        d.derive_keeper(KeeperIntent::Keep);
    } else if d.candidate.promoted_animal_id.is_some()
        && d.candidate.keeper_intent != KeeperIntent::Keep
    {
        return Err(TransitionError::IllegalKeeperIntentTransition {
            from: d.base.keeper_intent,
            to: d.candidate.keeper_intent,
            reason: "a promoted offspring is kept by the breeder",
        });
    }
    Ok(())
}

fn financial(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    let paid = d.candidate.paid_in_full_at.is_some();
    let deposit_ready = d.candidate.has_buyer() && d.candidate.deposit_cents.is_some();

    let target = match d.patch.financial_state {
        // buyer and deposit on record outrank an explicit NONE
        Some(FinancialState::None) if deposit_ready => FinancialState::DepositPending,
        Some(state) => state,
        None if paid => FinancialState::PaidInFull,
        None => match d.candidate.financial_state {
            // paid_in_full_at was cleared out from under PAID_IN_FULL
            FinancialState::PaidInFull | FinancialState::None if deposit_ready => {
                FinancialState::DepositPending
            }
            FinancialState::PaidInFull => FinancialState::None,
            state => state,
        },
    };

    if target != FinancialState::PaidInFull && d.patch.paid_in_full_at.value().is_some() {
        return Err(d.financial_error(target, "paid_in_full_at implies PAID_IN_FULL"));
    }
    if d.base.financial_state == FinancialState::PaidInFull && target != FinancialState::PaidInFull
    {
        match d.policy {
            TerminalRegressionPolicy::Reject => {
                return Err(d.financial_error(target, "payment is already complete"));
            }
            TerminalRegressionPolicy::Allow => d.derive_paid_in_full_at(None),
        }
    }
    d.derive_financial(target);
    Ok(())
}

fn paperwork(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    let signed = d.candidate.contract_signed_at.is_some();
    let has_contract = d.candidate.contract_id.is_some();

    let target = match d.patch.paperwork_state {
        Some(PaperworkState::None) if has_contract => PaperworkState::Sent,
        Some(state) => state,
        None if signed => PaperworkState::Signed,
        None => match d.candidate.paperwork_state {
            // contract_signed_at was cleared out from under SIGNED
            PaperworkState::Signed | PaperworkState::None if has_contract => PaperworkState::Sent,
            PaperworkState::Signed => PaperworkState::None,
            state => state,
        },
    };

    if target != PaperworkState::Signed && d.patch.contract_signed_at.value().is_some() {
        return Err(d.paperwork_error(target, "contract_signed_at implies SIGNED"));
    }
    if d.base.paperwork_state == PaperworkState::Signed && target != PaperworkState::Signed {
        match d.policy {
            TerminalRegressionPolicy::Reject => {
                return Err(d.paperwork_error(target, "the contract is already signed"));
            }
            TerminalRegressionPolicy::Allow => d.derive_contract_signed_at(None),
        }
    }
    d.derive_paperwork(target);
    Ok(())
}

/// Final check of every cross-field invariant on the finished candidate.
fn validate(d: &mut Derivation<'_>) -> Result<(), TransitionError> {
    let s = &d.candidate;

    if s.placement_state == PlacementState::Placed && s.placed_at.is_none() {
        return Err(d.placement_error("a placed offspring needs placed_at"));
    }
    if s.placed_at.is_some()
        && !matches!(
            s.placement_state,
            PlacementState::Placed | PlacementState::Returned
        )
    {
        return Err(d.placement_error("placed_at must be cleared when leaving placement"));
    }

    match (s.life_state, s.died_at.is_some()) {
        (LifeState::Deceased, false) => return Err(d.life_error("a deceased offspring needs died_at")),
        (LifeState::Alive, true) => return Err(d.life_error("a living offspring cannot have died_at")),
        _ => {}
    }

    if s.promoted_animal_id.is_some() && s.keeper_intent != KeeperIntent::Keep {
        return Err(TransitionError::IllegalKeeperIntentTransition {
            from: d.base.keeper_intent,
            to: s.keeper_intent,
            reason: "a promoted offspring is kept by the breeder",
        });
    }

    let paid = s.paid_in_full_at.is_some();
    match s.financial_state {
        FinancialState::DepositPending if !(s.has_buyer() && s.deposit_cents.is_some()) => {
            return Err(d.financial_error(
                s.financial_state,
                "a pending deposit needs a buyer and a deposit amount",
            ));
        }
        FinancialState::PaidInFull if !paid => {
            return Err(d.financial_error(s.financial_state, "PAID_IN_FULL needs paid_in_full_at"));
        }
        state if state != FinancialState::PaidInFull && paid => {
            return Err(d.financial_error(state, "paid_in_full_at implies PAID_IN_FULL"));
        }
        _ => {}
    }

    let signed = s.contract_signed_at.is_some();
    match s.paperwork_state {
        PaperworkState::Sent if s.contract_id.is_none() => {
            return Err(d.paperwork_error(s.paperwork_state, "SENT needs a contract reference"));
        }
        PaperworkState::Signed if !signed => {
            return Err(d.paperwork_error(s.paperwork_state, "SIGNED needs contract_signed_at"));
        }
        state if state != PaperworkState::Signed && signed => {
            return Err(d.paperwork_error(state, "contract_signed_at implies SIGNED"));
        }
        _ => {}
    }
    Ok(())
}
