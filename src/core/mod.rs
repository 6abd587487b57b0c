mod engine;
mod error;
mod types;

pub use engine::project;
pub use error::ProjectionError;
pub use types::{
    Account, ContributionPhase, Liability, LiabilityMode, ProjectionInput, ProjectionResult,
    Series,
};
