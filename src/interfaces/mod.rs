//! Operator-facing inputs and outputs: CSV decision batches, CSV reports and JSON fixtures.

pub mod csv;
pub mod fixture;
