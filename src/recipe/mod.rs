//! Blend recipes: validation, scoring, repair, pricing and profiles.
//!
//! Everything in this module is pure and synchronous. It operates on an
//! immutable [`Catalog`](crate::catalog::Catalog) snapshot and never touches
//! the network or the job store.

pub mod objective;
pub mod pricing;
pub mod profile;
pub mod repair;
pub mod scorer;
pub mod types;
pub mod validator;

pub use objective::{preference_level, Objective, Preferences};
pub use pricing::{PricingPolicy, PricingResult};
pub use profile::{blend_profile, target_profile, SensoryProfile};
pub use repair::repair;
pub use scorer::score;
pub use types::{
    Candidate, ProposedComponent, Recipe, RecipeComponent, ScoredCandidate, MAX_COMPONENTS,
    MIN_COMPONENTS, MIN_QUANTITY,
};
pub use validator::validate;
