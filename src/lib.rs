//! CRM Triage — escalation pipeline with human-in-the-loop approval.

pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod supervisor;
