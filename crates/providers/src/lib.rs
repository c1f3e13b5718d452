//! Completion provider adapters for Addis-Sync.
//!
//! All adapters implement the `addis_core::ProviderAdapter` trait.
//! The fallback chain tries them in configured order.

pub mod fallback;
pub mod gemini;
mod http;
pub mod openai_compat;
pub mod router;

pub use fallback::{CandidateStatus, ChainExhausted, FallbackChain};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_chain_from_config;
