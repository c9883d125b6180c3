//! Domain types and the capability ports the orchestrator depends on.

pub mod invoice;
pub mod payment;
pub mod ports;
pub mod workflow;
