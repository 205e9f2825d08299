//! Raw2Ready turns a raw business idea into a pitch.
//!
//! The crate has two halves:
//!
//! - [`server`]: the HTTP backend. Each request runs a small graph-flow
//!   pipeline ([`tasks`]) that builds a prompt, queries the selected model
//!   through [`tools::llm`] and normalizes the answer.
//! - [`workflow`]: the user-facing stages (form, results, deck/video) wired
//!   by a linear router and persisted in a key-value store.

pub mod config;
pub mod countries;
pub mod error;
pub mod models;
pub mod prompts;
pub mod server;
pub mod tasks;
pub mod tools;
pub mod workflow;
