//! Requirement domain module.

mod model;
mod status;

pub use model::{Requirement, RequirementAnalysis, RequirementSource};
pub(crate) use model::preview;
pub use status::RequirementStatus;
