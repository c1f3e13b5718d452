//! The Addis-Sync turn engine.
//!
//! A turn follows an **Assemble → Ask → Dispatch** cycle:
//!
//! 1. **Assemble** the system instruction from the capability tree and the
//!    session state snapshot
//! 2. **Ask** the provider chain for the next model step
//! 3. **If tool calls**: dispatch them in order, record the round, go to 2
//! 4. **If text**: append the exchange to history and return it
//!
//! The loop stops at the configured turn cap, and provider exhaustion
//! degrades to a fixed apology instead of an error.

pub mod context;
pub mod orchestrator;
pub mod roster;
pub mod runtime;

pub use context::{AssembledContext, ContextAssembler, render_state};
pub use orchestrator::{
    DEFAULT_MAX_TURNS, EMPTY_REPLY, MAX_TURNS_REPLY, PROVIDERS_EXHAUSTED_REPLY, TurnOrchestrator,
};
pub use roster::{ROOT_ROLE, addis_capability_tree};
pub use runtime::Runtime;
