mod prompts;
mod proposal;
pub mod refiner;

pub use prompts::MentorPrompts;
pub use proposal::{PromptProposal, ProposalParseError};
pub use refiner::{Mentor, RefinementError, RefinementInput};
