//! External capability contracts.
//!
//! The bot core never speaks a chat, streaming, or LLM wire protocol
//! itself. Everything external arrives through these traits, injected at
//! construction time. Optional frontend features are separate traits held
//! as `Option<Arc<dyn _>>` so feature detection is a field check, never a
//! runtime type test.

pub mod frontend;
pub mod links;
pub mod llm;
pub mod streaming;

pub use frontend::{
    AdminApproval, CancelAdminApproval, ChatFrontend, CommunityApproval, Frontend,
};
pub use links::{LinkResolver, ResolvedSong};
pub use llm::LlmAssist;
pub use streaming::StreamingBackend;
