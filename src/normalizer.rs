//! Public entry point: run a patch through the derivation pipeline
use super::clock::{Clock, SystemClock};
use super::config::{NormalizerConfig, TerminalRegressionPolicy};
use super::error::TransitionError;
use super::offspring::{DerivedFields, OffspringPatch, OffspringState, merge};
use super::passes::{Derivation, PIPELINE};

/// Keeps the five status axes of an offspring consistent across patches.
///
/// Stateless between calls. The clock is read once per call and only feeds
/// auto-populated timestamps, so the same `(current, patch)` under a fixed
/// clock always yields the same [`DerivedFields`].
#[derive(Debug, Clone, Default)]
pub struct Normalizer<C: Clock = SystemClock> {
    clock: C,
    policy: TerminalRegressionPolicy,
}

impl Normalizer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> Normalizer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            policy: TerminalRegressionPolicy::default(),
        }
    }
    pub fn from_config(config: &NormalizerConfig, clock: C) -> Self {
        Self::with_clock(clock).with_policy(config.terminal_regression)
    }
    pub fn with_policy(mut self, policy: TerminalRegressionPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn policy(&self) -> TerminalRegressionPolicy {
        self.policy
    }

    /// Compute the fields that must override `current ⊕ patch`.
    ///
    /// `current = None` stands for a freshly recorded offspring. On error
    /// nothing has been derived and the patch must not be written.
    pub fn normalize(
        &self,
        current: Option<&OffspringState>,
        patch: &OffspringPatch,
    ) -> Result<DerivedFields, TransitionError> {
        let initial = OffspringState::default();
        let base = current.unwrap_or(&initial);
        let mut derivation = Derivation::new(base, patch, self.clock.now(), self.policy);

        for pass in PIPELINE.iter() {
            let _span = tracing::trace_span!("pass", name = pass.name).entered();
            if let Err(err) = (pass.run)(&mut derivation) {
                tracing::warn!(pass = pass.name, error = %err, "rejected offspring patch");
                return Err(err);
            }
        }

        Ok(derivation.derived)
    }

    /// Normalize and merge in one step, returning the record to persist.
    pub fn apply(
        &self,
        current: Option<&OffspringState>,
        patch: &OffspringPatch,
    ) -> Result<OffspringState, TransitionError> {
        let derived = self.normalize(current, patch)?;
        Ok(merge(current, patch, &derived))
    }
}
