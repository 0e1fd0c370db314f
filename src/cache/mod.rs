//! Optimistic cache of the task collection in front of a [`TaskGateway`].
//!
//! [`TaskGateway`]: crate::gateway::TaskGateway

pub mod error;
pub mod inflight;
pub mod mutation;
pub mod store;

pub use error::CacheError;
pub use inflight::OperationClass;
pub use mutation::{Mutation, MutationKind};
pub use store::{PendingMutation, RefreshOutcome, Snapshot, StoreEvent, TaskCacheStore};
