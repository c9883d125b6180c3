//! Application layer coordinating the approval workflow.
//!
//! This module defines the `ApprovalOrchestrator`, the only component that
//! mutates payments. It chains the payment store, invoice generator and
//! notification dispatcher as one resumable unit of work.

pub mod orchestrator;
