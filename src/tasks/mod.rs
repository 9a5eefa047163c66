//! Background Tasks Module
//!
//! Contains background tasks that run periodically during node operation.
//!
//! # Tasks
//! - Lease keep-alive: keeps this node's discovery registration fresh
//! - Lease reaper: prunes registrations of nodes that stopped refreshing

mod keepalive;

pub use keepalive::{spawn_keepalive_task, spawn_lease_reaper};
