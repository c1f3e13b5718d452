//! Session storage for Addis-Sync.
//!
//! Sessions live in process memory and are created lazily on first
//! reference. A background sweeper evicts sessions that have been idle for
//! longer than the configured timeout.

pub mod store;
pub mod sweeper;

pub use store::{SessionGuard, SessionHandle, SessionMetadata, SessionStore};
pub use sweeper::spawn_sweeper;
