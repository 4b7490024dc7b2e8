//! Offspring lifecycle and placement normalizer.
//!
//! An offspring record carries five status axes (life, placement,
//! financial, paperwork and keeper intent). Every mutation goes through
//! [`Normalizer::normalize`], which derives the fields that keep the axes
//! consistent or rejects the patch outright. [`store::OffspringStore`] is a
//! sled-backed example of the caller side.

pub mod clock;
pub mod config;
pub mod error;
pub mod field;
pub mod normalizer;
pub mod offspring;
mod passes;
pub mod store;
pub mod utils;

pub use clock::{Clock, FixedClock, SystemClock, TimeStamp};
pub use config::{Config, TerminalRegressionPolicy};
pub use error::{StoreError, TransitionError};
pub use field::Field;
pub use normalizer::Normalizer;
pub use offspring::{
    DerivedFields, FinancialState, KeeperIntent, LifeState, OffspringPatch, OffspringState,
    PaperworkState, PlacementState, merge,
};
