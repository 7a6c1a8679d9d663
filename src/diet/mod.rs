//! Diet persistence
//!
//! The storage contract, the per-user editing context and the reconciler that
//! saves and loads sessions. Unit tests run against an in-memory store with
//! fault injection.

pub mod context;
#[cfg(test)]
pub(crate) mod memory;
pub mod reconciler;
pub mod store;

pub use context::EditingContext;
#[cfg(test)]
pub(crate) use memory::{MemoryStore, StoreOp};
pub use reconciler::DietReconciler;
pub use store::{DietStore, StoreError, StoreResult};
