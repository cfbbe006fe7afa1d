//! Meal Benefit Engine
//!
//! This crate computes a monthly meal/food benefit payout. HR exports are
//! consolidated into one canonical record per employee, ineligible employees
//! are filtered out (deterministic rules first, then an external
//! classification oracle), payable days are prorated against a per-location
//! holiday calendar, and the result is assembled into a validated vendor
//! file and reconciled by an audit pass.
//!
//! The stages are run by [`pipeline::run_pipeline`]; each one publishes an
//! immutable snapshot so any stage can be re-run on its own.

#![warn(missing_docs)]

pub mod api;
pub mod audit;
pub mod calculation;
pub mod config;
pub mod consolidation;
pub mod eligibility;
pub mod error;
pub mod logging;
pub mod models;
pub mod oracle;
pub mod output;
pub mod pipeline;
