//! Offspring record, its five status axes and the patch/derived shapes
use super::clock::TimeStamp;
use super::field::Field;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeState {
    #[n(0)]
    #[default]
    Alive,
    #[n(1)]
    Deceased,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementState {
    #[n(0)]
    #[default]
    Unassigned,
    #[n(1)]
    Reserved,
    #[n(2)]
    Placed,
    #[n(3)]
    Returned,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialState {
    #[n(0)]
    #[default]
    None,
    #[n(1)]
    DepositPending,
    #[n(2)]
    PaidInFull,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperworkState {
    #[n(0)]
    #[default]
    None,
    #[n(1)]
    Sent,
    #[n(2)]
    Signed,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeeperIntent {
    #[n(0)]
    #[default]
    Available,
    #[n(1)]
    Keep,
    #[n(2)]
    Withheld,
}

impl PlacementState {
    /// How far along the pipeline toward a buyer. A return is not progress.
    pub fn progress(self) -> u8 {
        match self {
            PlacementState::Unassigned | PlacementState::Returned => 0,
            PlacementState::Reserved => 1,
            PlacementState::Placed => 2,
        }
    }
}

/// A fully populated offspring record. `Default` is the state a freshly
/// recorded litter member starts in.
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OffspringState {
    #[n(0)]
    pub life_state: LifeState,
    #[n(1)]
    pub placement_state: PlacementState,
    #[n(2)]
    pub financial_state: FinancialState,
    #[n(3)]
    pub paperwork_state: PaperworkState,
    #[n(4)]
    pub keeper_intent: KeeperIntent,
    #[n(5)]
    pub died_at: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub placed_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub paid_in_full_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub contract_signed_at: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub buyer_contact_id: Option<u64>,
    #[n(10)]
    pub buyer_organization_id: Option<u64>,
    #[n(11)]
    pub deposit_cents: Option<u64>,
    #[n(12)]
    pub contract_id: Option<String>,
    #[n(13)]
    pub promoted_animal_id: Option<u64>,
}

/// Sparse update to an offspring. Axes are `None` when untouched; nullable
/// fields use [`Field`] so a clear is distinguishable from an omission.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OffspringPatch {
    pub life_state: Option<LifeState>,
    pub placement_state: Option<PlacementState>,
    pub financial_state: Option<FinancialState>,
    pub paperwork_state: Option<PaperworkState>,
    pub keeper_intent: Option<KeeperIntent>,
    pub died_at: Field<TimeStamp<Utc>>,
    pub placed_at: Field<TimeStamp<Utc>>,
    pub paid_in_full_at: Field<TimeStamp<Utc>>,
    pub contract_signed_at: Field<TimeStamp<Utc>>,
    pub buyer_contact_id: Field<u64>,
    pub buyer_organization_id: Field<u64>,
    pub deposit_cents: Field<u64>,
    pub contract_id: Field<String>,
    pub promoted_animal_id: Field<u64>,
}

/// The fields the normalizer computes or overrides. Merged last, so these
/// win over both the stored record and the patch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DerivedFields {
    pub life_state: Option<LifeState>,
    pub placement_state: Option<PlacementState>,
    pub financial_state: Option<FinancialState>,
    pub paperwork_state: Option<PaperworkState>,
    pub keeper_intent: Option<KeeperIntent>,
    pub died_at: Field<TimeStamp<Utc>>,
    pub placed_at: Field<TimeStamp<Utc>>,
    pub paid_in_full_at: Field<TimeStamp<Utc>>,
    pub contract_signed_at: Field<TimeStamp<Utc>>,
}

impl OffspringState {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn has_buyer(&self) -> bool {
        self.buyer_contact_id.is_some() || self.buyer_organization_id.is_some()
    }
    /// `self ⊕ patch`, with no derivation applied.
    pub fn merge_patch(&self, patch: &OffspringPatch) -> OffspringState {
        OffspringState {
            life_state: patch.life_state.unwrap_or(self.life_state),
            placement_state: patch.placement_state.unwrap_or(self.placement_state),
            financial_state: patch.financial_state.unwrap_or(self.financial_state),
            paperwork_state: patch.paperwork_state.unwrap_or(self.paperwork_state),
            keeper_intent: patch.keeper_intent.unwrap_or(self.keeper_intent),
            died_at: patch.died_at.merge_into(&self.died_at),
            placed_at: patch.placed_at.merge_into(&self.placed_at),
            paid_in_full_at: patch.paid_in_full_at.merge_into(&self.paid_in_full_at),
            contract_signed_at: patch.contract_signed_at.merge_into(&self.contract_signed_at),
            buyer_contact_id: patch.buyer_contact_id.merge_into(&self.buyer_contact_id),
            buyer_organization_id: patch
                .buyer_organization_id
                .merge_into(&self.buyer_organization_id),
            deposit_cents: patch.deposit_cents.merge_into(&self.deposit_cents),
            contract_id: patch.contract_id.merge_into(&self.contract_id),
            promoted_animal_id: patch.promoted_animal_id.merge_into(&self.promoted_animal_id),
        }
    }
    /// Overlay derived fields on an already patched record.
    pub fn merge_derived(mut self, derived: &DerivedFields) -> OffspringState {
        if let Some(s) = derived.life_state {
            self.life_state = s;
        }
        if let Some(s) = derived.placement_state {
            self.placement_state = s;
        }
        if let Some(s) = derived.financial_state {
            self.financial_state = s;
        }
        if let Some(s) = derived.paperwork_state {
            self.paperwork_state = s;
        }
        if let Some(s) = derived.keeper_intent {
            self.keeper_intent = s;
        }
        self.died_at = derived.died_at.merge_into(&self.died_at);
        self.placed_at = derived.placed_at.merge_into(&self.placed_at);
        self.paid_in_full_at = derived.paid_in_full_at.merge_into(&self.paid_in_full_at);
        self.contract_signed_at = derived
            .contract_signed_at
            .merge_into(&self.contract_signed_at);
        self
    }
}

/// `current ⊕ patch ⊕ derived`, the record a caller persists.
pub fn merge(
    current: Option<&OffspringState>,
    patch: &OffspringPatch,
    derived: &DerivedFields,
) -> OffspringState {
    let base = current.cloned().unwrap_or_default();
    base.merge_patch(patch).merge_derived(derived)
}

impl OffspringPatch {
    /// Construct an empty patch, then chain the setters below.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
    pub fn set_life_state(mut self, state: LifeState) -> Self {
        self.life_state = Some(state);
        self
    }
    pub fn set_placement_state(mut self, state: PlacementState) -> Self {
        self.placement_state = Some(state);
        self
    }
    pub fn set_financial_state(mut self, state: FinancialState) -> Self {
        self.financial_state = Some(state);
        self
    }
    pub fn set_paperwork_state(mut self, state: PaperworkState) -> Self {
        self.paperwork_state = Some(state);
        self
    }
    pub fn set_keeper_intent(mut self, intent: KeeperIntent) -> Self {
        self.keeper_intent = Some(intent);
        self
    }
    pub fn set_died_at(mut self, at: TimeStamp<Utc>) -> Self {
        self.died_at = Field::Value(at);
        self
    }
    pub fn clear_died_at(mut self) -> Self {
        self.died_at = Field::Null;
        self
    }
    pub fn set_placed_at(mut self, at: TimeStamp<Utc>) -> Self {
        self.placed_at = Field::Value(at);
        self
    }
    pub fn clear_placed_at(mut self) -> Self {
        self.placed_at = Field::Null;
        self
    }
    pub fn set_paid_in_full_at(mut self, at: TimeStamp<Utc>) -> Self {
        self.paid_in_full_at = Field::Value(at);
        self
    }
    pub fn clear_paid_in_full_at(mut self) -> Self {
        self.paid_in_full_at = Field::Null;
        self
    }
    pub fn set_contract_signed_at(mut self, at: TimeStamp<Utc>) -> Self {
        self.contract_signed_at = Field::Value(at);
        self
    }
    pub fn clear_contract_signed_at(mut self) -> Self {
        self.contract_signed_at = Field::Null;
        self
    }
    pub fn set_buyer_contact_id(mut self, id: u64) -> Self {
        self.buyer_contact_id = Field::Value(id);
        self
    }
    pub fn clear_buyer_contact_id(mut self) -> Self {
        self.buyer_contact_id = Field::Null;
        self
    }
    pub fn set_buyer_organization_id(mut self, id: u64) -> Self {
        self.buyer_organization_id = Field::Value(id);
        self
    }
    pub fn clear_buyer_organization_id(mut self) -> Self {
        self.buyer_organization_id = Field::Null;
        self
    }
    pub fn set_deposit_cents(mut self, cents: u64) -> Self {
        self.deposit_cents = Field::Value(cents);
        self
    }
    pub fn clear_deposit_cents(mut self) -> Self {
        self.deposit_cents = Field::Null;
        self
    }
    pub fn set_contract_id(mut self, id: impl Into<String>) -> Self {
        self.contract_id = Field::Value(id.into());
        self
    }
    pub fn clear_contract_id(mut self) -> Self {
        self.contract_id = Field::Null;
        self
    }
    pub fn set_promoted_animal_id(mut self, id: u64) -> Self {
        self.promoted_animal_id = Field::Value(id);
        self
    }
    pub fn clear_promoted_animal_id(mut self) -> Self {
        self.promoted_animal_id = Field::Null;
        self
    }
}

impl DerivedFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
