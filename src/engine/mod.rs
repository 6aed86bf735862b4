pub mod accumulator;
pub mod bootstrap;
pub mod mastery;
pub mod predictor;
pub mod tier;

pub use accumulator::{Ability, ProgressAccumulator};
pub use tier::{ScaffoldLevel, Tier, TierMove};
