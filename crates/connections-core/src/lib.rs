//! Sparse synaptic connectivity store for HTM-style cortical algorithms.
//!
//! [`Connections`] maintains a three-level graph — cells, their segments, and
//! each segment's synapses — under a workload dominated by continuous
//! creation/destruction of segments and synapses, in-place permanence
//! updates, and a hot activity-computation step ([`Connections::compute_activity`])
//! that tallies per-segment overlap against a sparse input activation.
//!
//! This crate implements only that store. The spatial-pooler and
//! temporal-memory learning policies that drive it, any CLI harness, and
//! configuration loading beyond the small [`ConnectionsConfig`] the store
//! itself owns are out of scope.

#![deny(missing_docs)]
#![warn(clippy::all)]

mod activity;
mod error;
mod events;
mod ids;
#[cfg(feature = "serialize")]
mod snapshot;
mod store;

pub use error::{ConnectionsError, Result};
pub use events::{ConnectionsEventHandler, SubscriptionToken};
pub use ids::{SegmentId, SynapseId};
pub use store::{Connections, ConnectionsConfig, SynapseData};

#[cfg(feature = "serialize")]
pub use snapshot::{FORMAT_VERSION, MAGIC};
