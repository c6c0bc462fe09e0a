//! Cloud resource counter
//!
//! Enumerates resources through list-style service APIs, counts and groups
//! them according to declarative rules, and publishes the counts as metrics.
//!
//! # Module Structure
//!
//! - [`config`] - Services document loading/validation and runtime settings
//! - [`aws`] - Service client contract, JSON protocol transport, test stub
//! - [`resource`] - Resource definitions, path walking and fetch strategies
//! - [`metrics`] - Counting rules, batching and metric publishing
//! - [`runner`] - Sequences fetch, aggregate, batch and publish for one run

pub mod aws;
pub mod config;
pub mod metrics;
pub mod resource;
pub mod runner;

pub use runner::Orchestrator;
