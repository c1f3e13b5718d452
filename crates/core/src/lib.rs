//! # Addis-Sync Core
//!
//! Domain types, traits, and error definitions for the Addis-Sync agent
//! orchestration runtime. Every other crate in the workspace depends inward
//! on this one.
//!
//! ## Design Philosophy
//!
//! The seams of the runtime are defined here as traits:
//! - [`Tool`] for named capabilities dispatched through the [`ToolRegistry`]
//! - [`ProviderAdapter`] for completion backends with their own wire formats
//!
//! Implementations live in their respective crates, which keeps the
//! orchestrator testable with stub providers and fake registries.

pub mod capability;
pub mod error;
pub mod event;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use capability::CapabilityNode;
pub use error::{AdapterError, OrchestrationError, ToolError};
pub use event::{DomainEvent, EventBus, TurnOutcome};
pub use provider::{
    CallArguments, Exchange, ProviderAdapter, ProviderStep, RequestedCall, ToolReply, ToolRound,
};
pub use session::{Session, SessionState, Turn, TurnRole};
pub use tool::{
    ParamSpec, ParamType, ParameterSchema, Tool, ToolContext, ToolDefinition, ToolRegistry,
};
