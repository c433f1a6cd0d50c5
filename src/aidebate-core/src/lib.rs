//! AIDebate Core Library
//!
//! Provides the policy-debate session engine: flow definitions, the
//! turn-by-turn state machine, model gateway abstraction, output
//! sanitization, and citation extraction.

pub mod citation;
pub mod config;
pub mod error;
pub mod export;
pub mod flow;
pub mod gateway;
pub mod manager;
pub mod sanitize;
pub mod session;
pub mod store;

pub use citation::{Citation, extract_citations};
pub use config::{BackendFamily, Config};
pub use error::{DebateError, GatewayError};
pub use flow::{FlowDefinition, Side, SpeechSlot, SpeechType};
pub use gateway::{
    ChatMessage, ChatRole, Completion, GenerationParams, ModelGateway, ModelInfo, ModelRegistry,
};
pub use manager::{DebateManager, DebateSummary, HistoryView, TurnOutcome, UsageReport};
pub use sanitize::sanitize;
pub use session::{DebateSession, Message, ModelUsage, ParticipantBinding, SessionStatus};
pub use store::{MemoryStore, SessionStore};
