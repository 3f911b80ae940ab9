//! Conversational agent: persona lifecycle, user profile and onboarding

mod conversational;
pub mod extract;
mod job;
mod processor;
mod user_data;

pub use conversational::{AGENT_TOOLS, ConversationalAgent};
pub use job::{JobConfig, apply_attribute_changes};
pub use processor::UserTurnProcessor;
pub use user_data::{SharedUserData, UserData};
