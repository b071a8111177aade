//! Shindig - a collaborative DJ core.
//!
//! Chat participants throw song links and free-form requests at a group;
//! this crate resolves each one to a streaming track, runs it through
//! dedup and approval, appends it to a shared playlist, and keeps the
//! streaming account's short-horizon queue topped up so the room is never
//! silent.
//!
//! The chat transport, streaming backend, language model and link
//! resolver are injected through the traits in [`capability`]; this crate
//! owns only the orchestration between them.
//!
//! # Wiring it up
//!
//! ```rust,ignore
//! use shindig::{Dispatcher, Frontend, Services};
//! use std::sync::Arc;
//!
//! let config = shinconf::ShindigConfig::load()?;
//! let frontend = Frontend::new(my_chat_client).with_admin_approval(my_buttons);
//! let (services, wake_rx) =
//!     Services::new(config, frontend, my_streaming, my_llm, my_resolver);
//! let dispatcher = Arc::new(Dispatcher::new(Arc::new(services)));
//! dispatcher.run(wake_rx).await?;
//! ```

pub mod approval;
pub mod capability;
pub mod dedup;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod flows;
pub mod lexicon;
pub mod monitors;
pub mod pipeline;
pub mod priority;
pub mod queue_manager;
pub mod services;
pub mod shadow;
pub mod wake;
pub mod warnings;

pub use capability::{
    AdminApproval, CancelAdminApproval, ChatFrontend, CommunityApproval, Frontend, LinkResolver,
    LlmAssist, ResolvedSong, StreamingBackend,
};
pub use dispatcher::Dispatcher;
pub use domain::{
    BotIdentity, MemberStatus, MessageOrigin, PlaybackCompliance, QueueDecision, RecommendedTrack,
    RepeatMode, Track, TrackId,
};
pub use error::{BotError, Result};
pub use lexicon::Lexicon;
pub use pipeline::MessagePipeline;
pub use queue_manager::QueueManager;
pub use services::Services;
