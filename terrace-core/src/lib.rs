//! Terrace Core
//!
//! Provider SDK for an infrastructure management tool: attribute values,
//! schemas, the `Provider` contract, and the shared helpers every resource
//! implementation leans on (composite IDs, tag diffs, state waiters).

pub mod differ;
pub mod id;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod tags;
pub mod waiter;
