//! Choreboard Core - Shared domain types.
//!
//! This crate provides the types used across all Choreboard components:
//! - `server` - HTTP surface, trigger reactor and scheduled jobs
//! - `cli` - Command-line tools for migrations, provisioning and job runs
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Anything that decides *whether* something should
//! happen (completion edges, due-soon windows, id windowing for bounded
//! membership filters) lives here so it can be tested without a store.
//!
//! # Modules
//!
//! - [`types`] - Ids, tokens, statuses, entity records and document paths
//! - [`batch`] - Fixed-size windowing for "is one of N values" filters

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod batch;
pub mod types;

pub use batch::{IN_FILTER_LIMIT, id_windows};
pub use types::*;
