//! Three-tier cognitive memory plus a Hebbian association graph.
//!
//! [`WorkingMemory`] is the hot, bounded, in-process tier. [`SessionMemory`]
//! adds file-per-session persistence on top of the same shape. [`LongTermMemory`]
//! is durable (backed by an embedded KV store) and adds semantic search and
//! GC. [`HebbianGraph`] shares that same KV store under a separate key
//! prefix and tracks pairwise association strength between entry ids.
//!
//! Tiers never call each other directly — promotion across tiers is a
//! policy the caller (the review engine, or a coordinating memory facade)
//! implements by reading from one tier and writing to another.

mod entry;
mod errors;
mod hebbian;
mod longterm;
mod session;
mod shared;
mod working;

pub use entry::{MatchCriteria, MemoryEntry};
pub use errors::{MemoryError, MemoryResult};
pub use hebbian::{Association, HebbianGraph, HebbianParams};
pub use longterm::{GcHandle, LongTermMemory, LongTermStats};
pub use session::SessionMemory;
pub use shared::open_db;
pub use working::{WorkingMemory, WorkingMemoryStats};
